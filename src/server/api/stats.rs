use std::collections::HashMap;
use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::{RequireAdmin, RequireStoreOwner};
use crate::server::AppState;
use crate::server::dto::{AdminStatsResponse, OwnerStatsResponse, StorePerformance};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::stats::{
    ACTIVITY_PAGE_SIZE, ACTIVITY_RATING_SOURCE, ACTIVITY_STORE_SOURCE, OWNER_RECENT_RATINGS,
    average_rating, merge_recent_activity, rating_distribution,
};

pub async fn admin_stats(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let user_count = state.store.count_users().api_err("Failed to count users")?;
    let store_count = state.store.count_stores().api_err("Failed to count stores")?;
    let rating_count = state
        .store
        .count_ratings()
        .api_err("Failed to count ratings")?;

    let recent_ratings = state
        .store
        .list_recent_ratings(ACTIVITY_RATING_SOURCE)
        .api_err("Failed to load recent ratings")?;
    let recent_stores = state
        .store
        .list_recent_stores(ACTIVITY_STORE_SOURCE)
        .api_err("Failed to load recent stores")?;

    let stats = AdminStatsResponse {
        user_count,
        store_count,
        rating_count,
        recent_activity: merge_recent_activity(recent_ratings, recent_stores, ACTIVITY_PAGE_SIZE),
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(stats)))
}

pub async fn store_owner_stats(
    RequireStoreOwner(actor): RequireStoreOwner,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let stores = state
        .store
        .list_stores_by_owner(actor.id)
        .api_err("Failed to list stores")?;
    let store_ids: Vec<i64> = stores.iter().map(|s| s.id).collect();

    let ratings = state
        .store
        .list_ratings_by_stores(&store_ids)
        .api_err("Failed to list ratings")?;

    let mut by_store: HashMap<i64, Vec<i64>> = HashMap::new();
    for rating in &ratings {
        by_store.entry(rating.store_id).or_default().push(rating.rating);
    }
    let all_values: Vec<i64> = ratings.iter().map(|r| r.rating).collect();

    let store_performance = stores
        .into_iter()
        .map(|store| {
            let values = by_store.remove(&store.id).unwrap_or_default();
            StorePerformance {
                id: store.id,
                name: store.name,
                total_ratings: values.len() as i64,
                average_rating: average_rating(&values),
                rating_distribution: rating_distribution(&values),
            }
        })
        .collect::<Vec<_>>();

    let recent_ratings = state
        .store
        .list_recent_ratings_by_stores(&store_ids, OWNER_RECENT_RATINGS)
        .api_err("Failed to load recent ratings")?;

    let stats = OwnerStatsResponse {
        store_count: store_ids.len() as i64,
        total_ratings: all_values.len() as i64,
        average_rating: average_rating(&all_values),
        store_performance,
        recent_ratings,
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(stats)))
}
