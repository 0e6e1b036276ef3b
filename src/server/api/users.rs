use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::{RequireAdmin, RequireAuth};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{ListUsersParams, UserRequest};
use crate::server::extract::{ApiJson, ApiPath};
use crate::server::response::{ApiError, ApiResponse, FieldError, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_user_request;
use crate::types::{NewUser, Role, User, UserFilter};

use super::access::require_self_or_admin;

/// Hashes the password and inserts the account. Expects a validated request.
pub(super) fn create_account(
    state: &AppState,
    req: &UserRequest,
    role: Role,
) -> Result<User, ApiError> {
    let password_hash = state
        .hasher
        .hash(&req.password)
        .api_err("Failed to hash password")?;

    let new_user = NewUser {
        name: req.name.clone(),
        email: req.email.clone(),
        password_hash,
        address: req.address.clone(),
        role,
    };

    match state.store.create_user(&new_user) {
        Ok(user) => Ok(user),
        Err(Error::AlreadyExists) => Err(ApiError::validation(vec![FieldError {
            field: "email",
            message: "Email is already registered".to_string(),
        }])),
        Err(e) => {
            tracing::error!("Failed to create user: {e}");
            Err(ApiError::internal("Failed to create user"))
        }
    }
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
) -> impl IntoResponse {
    let filter = UserFilter {
        search: params.search,
        role: params.role,
    };

    let users = state.store.list_users(&filter).api_err("Failed to list users")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UserRequest>,
) -> impl IntoResponse {
    validate_user_request(&req)?;
    let user = create_account(&state, &req, req.role.unwrap_or(Role::User))?;

    tracing::info!("Admin created user {} as {}", user.id, user.role);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn get_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> impl IntoResponse {
    require_self_or_admin(&auth.actor, id)?;

    let user = state
        .store
        .get_user(id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_user_cascade(id)
        .api_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("User {id} deleted by admin {}", admin.id);

    Ok(StatusCode::NO_CONTENT)
}
