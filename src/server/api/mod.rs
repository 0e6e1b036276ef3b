mod access;
mod ratings;
mod session;
mod stats;
mod stores;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Session routes
        .route("/register", post(session::register))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/user", get(session::current_user))
        // User routes
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        // Store routes
        .route("/stores", get(stores::list_stores).post(stores::create_store))
        .route(
            "/stores/{id}",
            get(stores::get_store)
                .put(stores::update_store)
                .delete(stores::delete_store),
        )
        // Rating routes
        .route("/ratings", get(ratings::list_ratings).post(ratings::submit_rating))
        .route("/ratings/{id}", delete(ratings::delete_rating))
        .route("/ratings/user/{user_id}", get(ratings::list_user_ratings))
        .route("/ratings/store/{store_id}", get(ratings::list_store_ratings))
        // Dashboards
        .route("/stats/admin", get(stats::admin_stats))
        .route("/stats/store-owner", get(stats::store_owner_stats))
}
