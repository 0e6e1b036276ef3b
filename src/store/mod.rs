mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::Store as StoreRecord;
use crate::types::*;

/// Whether an upsert inserted a new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>>;
    fn count_users(&self) -> Result<i64>;
    fn has_admin(&self) -> Result<bool>;
    /// Deletes the user, their ratings, their stores and the ratings on
    /// those stores in one transaction. Returns false if the user did not exist.
    fn delete_user_cascade(&self, id: i64) -> Result<bool>;

    // Store operations
    fn create_store(&self, fields: &StoreFields) -> Result<StoreRecord>;
    fn get_store(&self, id: i64) -> Result<Option<StoreRecord>>;
    fn get_store_with_ratings(&self, id: i64) -> Result<Option<StoreWithRatings>>;
    /// Replaces every writable column. Returns None if the store did not exist.
    fn update_store(&self, id: i64, fields: &StoreFields) -> Result<Option<StoreRecord>>;
    fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<StoreSummary>>;
    fn list_stores_by_owner(&self, owner_id: i64) -> Result<Vec<StoreRecord>>;
    fn list_recent_stores(&self, limit: i64) -> Result<Vec<StoreWithOwner>>;
    fn count_stores(&self) -> Result<i64>;
    /// Deletes the store and its ratings in one transaction.
    fn delete_store_cascade(&self, id: i64) -> Result<bool>;

    // Rating operations
    fn get_rating(&self, id: i64) -> Result<Option<Rating>>;
    fn get_rating_by_user_and_store(&self, user_id: i64, store_id: i64)
    -> Result<Option<Rating>>;
    /// Creates the rating, or replaces the existing one for the same
    /// (user, store) pair. Lookup and write share one write transaction.
    fn upsert_rating(&self, fields: &RatingFields) -> Result<(Rating, Upserted)>;
    fn list_ratings(&self) -> Result<Vec<Rating>>;
    fn list_ratings_by_user(&self, user_id: i64) -> Result<Vec<Rating>>;
    fn list_ratings_by_store(&self, store_id: i64) -> Result<Vec<Rating>>;
    fn list_ratings_by_stores(&self, store_ids: &[i64]) -> Result<Vec<Rating>>;
    fn list_recent_ratings(&self, limit: i64) -> Result<Vec<RatingWithDetails>>;
    fn list_recent_ratings_by_stores(
        &self,
        store_ids: &[i64],
        limit: i64,
    ) -> Result<Vec<RatingWithDetails>>;
    fn count_ratings(&self) -> Result<i64>;
    fn delete_rating(&self, id: i64) -> Result<bool>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn delete_expired_sessions(&self) -> Result<usize>;
}
