use serde::{Deserialize, Serialize};

use crate::stats::{ActivityItem, DistributionBucket};
use crate::types::{RatingWithDetails, Role, StoreSort, User};

/// Payload for self-registration and admin user creation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword", alias = "confirm_password")]
    pub confirm_password: String,
    pub address: String,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// Payload for store create and full-replace update.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreRequest {
    pub name: String,
    pub email: String,
    pub address: String,
    pub owner_id: Option<i64>,
}

/// Payload for rating submission. `rating` is read as a number so that
/// fractional or missing values surface as field errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RatingRequest {
    pub store_id: Option<i64>,
    pub rating: Option<f64>,
    pub review: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListStoresParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<StoreSort>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsResponse {
    pub user_count: i64,
    pub store_count: i64,
    pub rating_count: i64,
    pub recent_activity: Vec<ActivityItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorePerformance {
    pub id: i64,
    pub name: String,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub rating_distribution: Vec<DistributionBucket>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStatsResponse {
    pub store_count: i64,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub store_performance: Vec<StorePerformance>,
    pub recent_ratings: Vec<RatingWithDetails>,
}
