use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Adopter Router Module
///
/// Routes for users whose stored role is `adopter`: managing their listed pets and
/// the adoption requests addressed to them.
pub fn adopter_routes() -> Router<AppState> {
    Router::new()
        // GET /pets/{email} lists the adopter's pets, DELETE /pets/{id} removes one.
        // Both share one path template, so the segment has a neutral name.
        .route(
            "/pets/{key}",
            get(handlers::list_adopter_pets).delete(handlers::delete_pet),
        )
        // PUT /pets/update/{id}
        // Marks an adoption request as verified.
        .route("/pets/update/{id}", put(handlers::verify_adoption))
        // GET /adopted/pets/{email}
        .route("/adopted/pets/{email}", get(handlers::list_adopted_pets))
}
