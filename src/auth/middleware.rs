use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderName, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{
    SessionValidationError, ValidatedSession, extract_session_token, validate_session,
};
use crate::server::AppState;
use crate::types::{Actor, RoleSet, Session, User};

/// Extractor that requires any authenticated session.
pub struct RequireAuth {
    pub actor: Actor,
    pub user: User,
    pub session: Session,
}

/// Extractor that requires the admin role.
pub struct RequireAdmin(pub Actor);

/// Extractor that requires a role allowed to create and manage stores.
pub struct RequireStoreManager(pub Actor);

/// Extractor that requires the store owner role.
pub struct RequireStoreOwner(pub Actor);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidSession,
    SessionExpired,
    Forbidden,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "You must be logged in"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidSession => (StatusCode::UNAUTHORIZED, "Invalid session"),
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "Session expired"),
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have permission to access this resource",
            ),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"storerate\""),
            );
        }

        response
    }
}

impl From<SessionValidationError> for AuthError {
    fn from(e: SessionValidationError) -> Self {
        match e {
            SessionValidationError::InvalidScheme => AuthError::InvalidScheme,
            SessionValidationError::InvalidToken => AuthError::InvalidSession,
            SessionValidationError::SessionExpired => AuthError::SessionExpired,
            SessionValidationError::InternalError => AuthError::InternalError,
        }
    }
}

/// Fails with forbidden unless the actor's role is in `allowed`.
pub fn require_role(actor: &Actor, allowed: RoleSet) -> Result<(), AuthError> {
    if allowed.contains(actor.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = extract_and_validate_session(parts, state)?;
        Ok(RequireAuth {
            actor: validated.actor(),
            user: validated.user,
            session: validated.session,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let actor = extract_actor_with_role(parts, state, RoleSet::ADMIN)?;
        Ok(RequireAdmin(actor))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireStoreManager {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let actor = extract_actor_with_role(parts, state, RoleSet::STORE_MANAGERS)?;
        Ok(RequireStoreManager(actor))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireStoreOwner {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let actor = extract_actor_with_role(parts, state, RoleSet::STORE_OWNER)?;
        Ok(RequireStoreOwner(actor))
    }
}

fn extract_actor_with_role(
    parts: &Parts,
    state: &Arc<AppState>,
    allowed: RoleSet,
) -> Result<Actor, AuthError> {
    let actor = extract_and_validate_session(parts, state)?.actor();
    require_role(&actor, allowed)?;
    Ok(actor)
}

fn extract_and_validate_session(
    parts: &Parts,
    state: &Arc<AppState>,
) -> Result<ValidatedSession, AuthError> {
    let header = |name: HeaderName| parts.headers.get(name).and_then(|h| h.to_str().ok());

    let raw_token =
        extract_session_token(header(AUTHORIZATION), header(COOKIE))?.ok_or(AuthError::MissingAuth)?;

    let validated = validate_session(state.store.as_ref(), &state.hasher, &raw_token)?;
    Ok(validated)
}
