use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod token;

// Routers grouped by the gates in front of them (public, authenticated, admin, adopter).
pub mod routes;
use routes::{admin, adopter, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use errors::AppError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenCodec;

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers, served at
/// `/api-docs/openapi.json` with Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::issue_session, handlers::logout, handlers::upsert_user,
        handlers::get_user, handlers::list_users, handlers::update_user, handlers::admin_stat,
        handlers::list_pets, handlers::create_pet, handlers::get_pet,
        handlers::list_adopter_pets, handlers::delete_pet, handlers::create_adoption,
        handlers::list_adoptions, handlers::list_donations, handlers::list_adopter_requests,
        handlers::list_adopted_pets, handlers::verify_adoption, handlers::cancel_adoption
    ),
    components(
        schemas(
            models::Role, models::InsertOneResult, models::UpdateResult, models::DeleteResult,
            models::AdminStat, models::SessionIssued, models::SessionCleared,
        )
    ),
    tags(
        (name = "petpals", description = "PetPals Hub adoption API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request may need: the document
/// store handle, the configuration, and the session token codec built from it.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer shared by every handler and role gate.
    pub repo: RepositoryState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Signs and verifies session tokens with `config.token_secret`.
    pub tokens: TokenCodec,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let tokens = TokenCodec::new(&config.token_secret);
        Self {
            repo,
            config,
            tokens,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let gates and handlers pull single components out of the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.tokens.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, layers the gates onto each route group, and
/// wraps everything in the observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // `route_layer` wraps outside-in: the layer added last runs first, so the token
    // gate always precedes the role gates.
    let token_gate = middleware::from_fn_with_state(state.clone(), auth::require_token);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes().route_layer(token_gate.clone()))
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::require_admin,
                ))
                .route_layer(token_gate.clone()),
        )
        .merge(
            adopter::adopter_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::require_adopter,
                ))
                .route_layer(token_gate),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Generates a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                // Wraps the request/response lifecycle in a span carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Returns the x-request-id header to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// cors_layer
///
/// The session cookie travels cross-site, so origins are listed explicitly and
/// credentials are allowed (a wildcard origin cannot carry credentials).
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// trace_span_logger
///
/// Builds the per-request span: HTTP method, URI and the `x-request-id` header, so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
