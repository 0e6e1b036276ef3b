use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::RatingRequest;
use crate::server::extract::{ApiJson, ApiPath};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_rating;
use crate::store::Upserted;
use crate::types::RatingFields;

use super::access::{require_rating_access, require_self_or_admin};

pub async fn list_ratings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ratings = state.store.list_ratings().api_err("Failed to list ratings")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ratings)))
}

pub async fn list_user_ratings(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<i64>,
) -> impl IntoResponse {
    require_self_or_admin(&auth.actor, user_id)?;

    let ratings = state
        .store
        .list_ratings_by_user(user_id)
        .api_err("Failed to list ratings")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ratings)))
}

pub async fn list_store_ratings(
    State(state): State<Arc<AppState>>,
    ApiPath(store_id): ApiPath<i64>,
) -> impl IntoResponse {
    let ratings = state
        .store
        .list_ratings_by_store(store_id)
        .api_err("Failed to list ratings")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ratings)))
}

/// Creates the actor's rating for a store, or replaces the one they already
/// left there. Responds 201 for a new rating and 200 for a replacement.
pub async fn submit_rating(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RatingRequest>,
) -> impl IntoResponse {
    let (store_id, value) = validate_rating(&req)?;

    state
        .store
        .get_store(store_id)
        .api_err("Failed to get store")?
        .or_not_found("Store not found")?;

    let fields = RatingFields {
        store_id,
        user_id: auth.actor.id,
        rating: value,
        review: req.review,
    };

    let (rating, outcome) = state
        .store
        .upsert_rating(&fields)
        .api_err("Failed to save rating")?;

    let status = match outcome {
        Upserted::Created => StatusCode::CREATED,
        Upserted::Updated => StatusCode::OK,
    };

    Ok::<_, ApiError>((status, Json(ApiResponse::success(rating))))
}

pub async fn delete_rating(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> impl IntoResponse {
    let rating = state
        .store
        .get_rating(id)
        .api_err("Failed to get rating")?
        .or_not_found("Rating not found")?;

    require_rating_access(&auth.actor, &rating)?;

    state
        .store
        .delete_rating(id)
        .api_err("Failed to delete rating")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
