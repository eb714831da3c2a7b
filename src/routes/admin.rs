use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Routes exclusively for users whose stored role is `admin`. `create_router` wraps
/// this router in the token gate and then the admin gate.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /users
        // Every user, for role management.
        .route("/users", get(handlers::list_users))
        // PUT /users/update/{email}
        // Assigns roles and other user fields.
        .route("/users/update/{email}", put(handlers::update_user))
        // GET /admin-stat
        // Dashboard counts of users, pets and adoption records.
        .route("/admin-stat", get(handlers::admin_stat))
}
