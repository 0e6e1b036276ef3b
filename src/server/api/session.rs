use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireAuth, clear_session_cookie, generate_token, session_cookie};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{LoginRequest, SessionResponse, UserRequest};
use crate::server::extract::ApiJson;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{validate_login, validate_user_request};
use crate::types::{Role, Session};

use super::users::create_account;

const MAX_SESSION_RETRIES: usize = 3;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Creates a session for the user and returns the raw token.
fn issue_session(state: &AppState, user_id: i64) -> Result<String, ApiError> {
    let now = Utc::now();
    let ttl = state.config.session_ttl().api_err("Invalid session lifetime")?;
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| ApiError::internal("Invalid session lifetime"))?;

    for _ in 0..MAX_SESSION_RETRIES {
        let token = generate_token(&state.hasher).api_err("Failed to generate session")?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            token_hash: token.hash,
            token_lookup: token.lookup,
            user_id,
            created_at: now,
            expires_at,
        };

        match state.store.create_session(&session) {
            Ok(()) => return Ok(token.raw),
            Err(Error::SessionLookupCollision) => continue,
            Err(e) => {
                tracing::error!("Failed to create session: {e}");
                return Err(ApiError::internal("Failed to create session"));
            }
        }
    }

    tracing::error!("Session lookup collided {MAX_SESSION_RETRIES} times");
    Err(ApiError::internal("Failed to create session"))
}

fn cookie_for(state: &AppState, raw_token: &str) -> Result<String, ApiError> {
    let max_age = state
        .config
        .session_ttl_seconds()
        .api_err("Invalid session lifetime")?;
    Ok(session_cookie(raw_token, max_age, state.config.cookie_secure))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UserRequest>,
) -> impl IntoResponse {
    let role = req.role.unwrap_or(Role::User);
    if role == Role::Admin {
        return Err(ApiError::forbidden("The admin role cannot be self-assigned"));
    }

    validate_user_request(&req)?;
    let user = create_account(&state, &req, role)?;
    let token = issue_session(&state, user.id)?;
    let cookie = cookie_for(&state, &token)?;

    tracing::info!("Registered user {} as {}", user.id, user.role);

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(ApiResponse::success(SessionResponse { token, user })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> impl IntoResponse {
    validate_login(&req)?;

    let user = state
        .store
        .get_user_by_email(&req.email)
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let valid = state
        .hasher
        .verify(&req.password, &user.password_hash)
        .api_err("Failed to verify password")?;
    if !valid {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    match state.store.delete_expired_sessions() {
        Ok(0) => {}
        Ok(n) => tracing::debug!("Removed {n} expired sessions"),
        Err(e) => tracing::warn!("Failed to remove expired sessions: {e}"),
    }

    let token = issue_session(&state, user.id)?;
    let cookie = cookie_for(&state, &token)?;

    Ok::<_, ApiError>((
        [(SET_COOKIE, cookie)],
        Json(ApiResponse::success(SessionResponse { token, user })),
    ))
}

pub async fn logout(auth: RequireAuth, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state
        .store
        .delete_session(&auth.session.id)
        .api_err("Failed to delete session")?;

    Ok::<_, ApiError>((StatusCode::NO_CONTENT, [(SET_COOKIE, clear_session_cookie())]))
}

pub async fn current_user(auth: RequireAuth) -> impl IntoResponse {
    Json(ApiResponse::success(auth.user))
}
