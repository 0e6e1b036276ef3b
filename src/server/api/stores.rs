use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireStoreManager;
use crate::server::AppState;
use crate::server::dto::{ListStoresParams, StoreRequest};
use crate::server::extract::{ApiJson, ApiPath};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{ValidationErrors, validate_store};
use crate::types::{Actor, StoreFields, StoreFilter};

use super::access::require_store_access;

/// Picks the owner for a store write. Store owners always own what they
/// write; admins name an existing user, or keep `current` on update.
fn resolve_owner(
    state: &AppState,
    actor: &Actor,
    requested: Option<i64>,
    current: Option<i64>,
    errors: &mut ValidationErrors,
) -> Result<Option<i64>, ApiError> {
    if !actor.is_admin() {
        return Ok(Some(actor.id));
    }

    let Some(owner_id) = requested.or(current) else {
        errors.push("owner_id", "Owner is required");
        return Ok(None);
    };

    if Some(owner_id) != current
        && state
            .store
            .get_user(owner_id)
            .api_err("Failed to look up owner")?
            .is_none()
    {
        errors.push("owner_id", "Owner does not exist");
        return Ok(None);
    }

    Ok(Some(owner_id))
}

/// Validates the payload and resolves its owner into the stored fields.
fn store_fields(
    state: &AppState,
    actor: &Actor,
    req: StoreRequest,
    current_owner: Option<i64>,
) -> Result<StoreFields, ApiError> {
    let mut errors = validate_store(&req);
    let owner_id = resolve_owner(state, actor, req.owner_id, current_owner, &mut errors)?;
    errors.finish()?;

    Ok(StoreFields {
        name: req.name,
        email: req.email,
        address: req.address,
        owner_id: owner_id.unwrap_or(actor.id),
    })
}

pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListStoresParams>,
) -> impl IntoResponse {
    let filter = StoreFilter {
        search: params.search,
        sort: params.sort.unwrap_or_default(),
    };

    let stores = state
        .store
        .list_stores(&filter)
        .api_err("Failed to list stores")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(stores)))
}

pub async fn get_store(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> impl IntoResponse {
    let store = state
        .store
        .get_store_with_ratings(id)
        .api_err("Failed to get store")?
        .or_not_found("Store not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(store)))
}

pub async fn create_store(
    RequireStoreManager(actor): RequireStoreManager,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StoreRequest>,
) -> impl IntoResponse {
    let fields = store_fields(&state, &actor, req, None)?;

    let store = state
        .store
        .create_store(&fields)
        .api_err("Failed to create store")?;

    tracing::info!("Store {} created for owner {}", store.id, store.owner_id);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(store))))
}

pub async fn update_store(
    RequireStoreManager(actor): RequireStoreManager,
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StoreRequest>,
) -> impl IntoResponse {
    let existing = state
        .store
        .get_store(id)
        .api_err("Failed to get store")?
        .or_not_found("Store not found")?;

    require_store_access(&actor, &existing)?;

    let fields = store_fields(&state, &actor, req, Some(existing.owner_id))?;

    let store = state
        .store
        .update_store(id, &fields)
        .api_err("Failed to update store")?
        .or_not_found("Store not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(store)))
}

pub async fn delete_store(
    RequireStoreManager(actor): RequireStoreManager,
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> impl IntoResponse {
    let existing = state
        .store
        .get_store(id)
        .api_err("Failed to get store")?
        .or_not_found("Store not found")?;

    require_store_access(&actor, &existing)?;

    state
        .store
        .delete_store_cascade(id)
        .api_err("Failed to delete store")?;

    tracing::info!("Store {id} deleted by user {}", actor.id);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
