use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any caller holding a valid session token. The token gate is applied
/// by `create_router`; handlers here never look at the role.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /pets
        // Lists a new pet. The body is stored as posted.
        .route("/pets", post(handlers::create_pet))
        // GET /pet/{id}
        .route("/pet/{id}", get(handlers::get_pet))
        // GET /user/{email}
        // The front end reads the caller's role from this document.
        .route("/user/{email}", get(handlers::get_user))
        // --- Adoption Requests ---
        // POST /adoption
        .route("/adoption", post(handlers::create_adoption))
        // GET /adoptions?email=
        // Requests submitted by a user; empty without an email.
        .route("/adoptions", get(handlers::list_adoptions))
        // GET /donations/{email}
        .route("/donations/{email}", get(handlers::list_donations))
        // GET /adopter/{email}
        // Requests addressed to an adopter.
        .route("/adopter/{email}", get(handlers::list_adopter_requests))
}
