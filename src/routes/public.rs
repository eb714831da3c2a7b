use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Public Router Module
///
/// Endpoints reachable without a session: liveness, session issue/clear, the user
/// upsert performed at sign-in, and the pet catalogue.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Liveness string for monitoring and load balancers.
        .route("/", get(handlers::root))
        // POST /jwt
        // Signs a session token and sets the `token` cookie.
        .route("/jwt", post(handlers::issue_session))
        // GET /logout
        // Clears the `token` cookie. Issued tokens stay valid until expiry.
        .route("/logout", get(handlers::logout))
        // PUT /users/{email}
        // Save-on-sign-in and "become an adopter" requests.
        .route("/users/{email}", put(handlers::upsert_user))
        // GET /pets?limit=&page=
        // Paginated pet catalogue (default 4 per page).
        .route("/pets", get(handlers::list_pets))
        // DELETE /pet/cancel/{id}
        // Cancels an adoption request. Ungated: confirm before exposing further.
        .route("/pet/cancel/{id}", delete(handlers::cancel_adoption))
}
