use chrono::Utc;

use super::{SecretHasher, parse_token, token_from_cookie_header};
use crate::store::Store;
use crate::types::{Actor, Session, User};

#[derive(Debug)]
pub enum SessionValidationError {
    InvalidScheme,
    InvalidToken,
    SessionExpired,
    InternalError,
}

pub struct ValidatedSession {
    pub session: Session,
    pub user: User,
}

impl ValidatedSession {
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user.id,
            role: self.user.role,
        }
    }
}

/// Extracts the session token from the Authorization header, falling back
/// to the session cookie. Returns None if neither is present.
/// Returns Err if the Authorization scheme is unsupported.
pub fn extract_session_token(
    auth_header: Option<&str>,
    cookie_header: Option<&str>,
) -> Result<Option<String>, SessionValidationError> {
    match auth_header {
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) => Ok(Some(token.trim().to_string())),
            None => Err(SessionValidationError::InvalidScheme),
        },
        None => Ok(cookie_header.and_then(token_from_cookie_header)),
    }
}

/// Validates a raw session token against the store.
/// Returns the session and the user it belongs to.
pub fn validate_session(
    store: &dyn Store,
    hasher: &SecretHasher,
    raw_token: &str,
) -> Result<ValidatedSession, SessionValidationError> {
    let (lookup, _secret) =
        parse_token(raw_token).map_err(|_| SessionValidationError::InvalidToken)?;

    let session = store
        .get_session_by_lookup(&lookup)
        .map_err(|_| SessionValidationError::InternalError)?
        .ok_or(SessionValidationError::InvalidToken)?;

    if !hasher
        .verify(raw_token, &session.token_hash)
        .map_err(|_| SessionValidationError::InternalError)?
    {
        return Err(SessionValidationError::InvalidToken);
    }

    if session.expires_at < Utc::now() {
        if let Err(e) = store.delete_session(&session.id) {
            tracing::warn!("Failed to delete expired session: {e}");
        }
        return Err(SessionValidationError::SessionExpired);
    }

    let user = store
        .get_user(session.user_id)
        .map_err(|_| SessionValidationError::InternalError)?
        .ok_or(SessionValidationError::InvalidToken)?;

    Ok(ValidatedSession { session, user })
}
