use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub address: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated user ready for insertion. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub address: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub address: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable store columns, used for both create and full-replace update.
#[derive(Debug, Clone)]
pub struct StoreFields {
    pub name: String,
    pub email: String,
    pub address: String,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub store_id: i64,
    pub user_id: i64,
    pub rating: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable rating columns. `user_id` is always the acting user.
#[derive(Debug, Clone)]
pub struct RatingFields {
    pub store_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A store as listed, with its rating aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    #[serde(flatten)]
    pub store: Store,
    pub average_rating: f64,
    pub total_ratings: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreWithRatings {
    #[serde(flatten)]
    pub store: Store,
    pub ratings: Vec<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
    pub average_rating: f64,
    pub total_ratings: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingWithDetails {
    #[serde(flatten)]
    pub rating: Rating,
    pub user: User,
    pub store: Store,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreWithOwner {
    #[serde(flatten)]
    pub store: Store,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
}

/// Filters for the admin user listing.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSort {
    #[default]
    Name,
    Rating,
    Newest,
}

#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub search: Option<String>,
    pub sort: StoreSort,
}
