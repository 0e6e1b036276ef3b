use crate::server::response::ApiError;
use crate::types::{Actor, Rating, Store};

/// Admins may manage any store; store owners only their own.
pub fn require_store_access(actor: &Actor, store: &Store) -> Result<(), ApiError> {
    if actor.can_manage(store.owner_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only manage your own stores"))
    }
}

pub fn require_rating_access(actor: &Actor, rating: &Rating) -> Result<(), ApiError> {
    if actor.is_admin() || actor.id == rating.user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only delete your own ratings"))
    }
}

/// A user record is visible to the user themselves and to admins.
pub fn require_self_or_admin(actor: &Actor, user_id: i64) -> Result<(), ApiError> {
    if actor.is_admin() || actor.id == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You do not have permission to access this resource",
        ))
    }
}
