use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware,
    routing::get,
};
use chrono::{Duration, Utc};
use petpals_api::{
    AppError, AppState, MemoryRepository, create_router,
    auth::{self, SESSION_COOKIE, session_cookie, session_cookie_header},
    config::{AppConfig, Env},
    models::{DeleteResult, Document, InsertOneResult, Page, UpdateResult},
    repository::{Collection, Filter, RepoError, Repository, RepositoryState},
    token::{Identity, TokenCodec},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

// --- Failing Repository for the 500 path ---

struct FailingRepo;

fn closed() -> RepoError {
    RepoError::Database(sqlx::Error::PoolClosed)
}

#[async_trait]
impl Repository for FailingRepo {
    async fn find(
        &self,
        _collection: Collection,
        _filter: &Filter,
        _page: Option<Page>,
    ) -> Result<Vec<Document>, RepoError> {
        Err(closed())
    }
    async fn find_one(
        &self,
        _collection: Collection,
        _filter: &Filter,
    ) -> Result<Option<Document>, RepoError> {
        Err(closed())
    }
    async fn insert_one(
        &self,
        _collection: Collection,
        _doc: Document,
    ) -> Result<InsertOneResult, RepoError> {
        Err(closed())
    }
    async fn update_one(
        &self,
        _collection: Collection,
        _filter: &Filter,
        _set: Document,
        _upsert: bool,
    ) -> Result<UpdateResult, RepoError> {
        Err(closed())
    }
    async fn delete_one(
        &self,
        _collection: Collection,
        _filter: &Filter,
    ) -> Result<DeleteResult, RepoError> {
        Err(closed())
    }
    async fn count(&self, _collection: Collection) -> Result<u64, RepoError> {
        Err(closed())
    }
    async fn ping(&self) -> Result<(), RepoError> {
        Err(closed())
    }
}

// --- Helper Functions ---

const TEST_SECRET: &str = "test-secret-value-1234567890";

fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("test document must be an object")
}

fn identity(email: &str) -> Identity {
    Identity {
        email: email.to_string(),
        extra: Document::new(),
    }
}

fn create_app_state(env: Env, repo: RepositoryState) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.token_secret = TEST_SECRET.to_string();
    AppState::new(repo, config)
}

async fn seed_user(repo: &RepositoryState, email: &str, role: Option<&str>) {
    let mut user = doc(json!({ "email": email }));
    if let Some(role) = role {
        user.insert("role".to_string(), Value::from(role));
    }
    repo.insert_one(Collection::Users, user).await.unwrap();
}

fn cookie_for(state: &AppState, email: &str) -> String {
    let token = state.tokens.issue(identity(email)).unwrap();
    format!("{SESSION_COOKIE}={token}")
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// --- Token Codec ---

#[test]
fn test_issued_token_verifies_and_keeps_extra_claims() {
    let codec = TokenCodec::new(TEST_SECRET);
    let identity = Identity {
        email: "alice@example.com".to_string(),
        extra: doc(json!({ "name": "Alice", "exp": 1, "iat": 1 })),
    };

    let claims = codec.verify(&codec.issue(identity).unwrap()).unwrap();

    assert_eq!(claims.email, "alice@example.com");
    assert_eq!(claims.extra.get("name"), Some(&json!("Alice")));
    // Client-supplied exp/iat never override the codec's own.
    assert_eq!(claims.exp - claims.iat, Duration::days(365).num_seconds());
    assert!(claims.iat > 1);
}

#[test]
fn test_token_valid_until_365_days() {
    let codec = TokenCodec::new(TEST_SECRET);
    let issued_at = (Utc::now() - Duration::days(364)).timestamp();

    let token = codec.issue_at(identity("old@example.com"), issued_at).unwrap();

    assert!(codec.verify(&token).is_ok());
}

#[test]
fn test_token_rejected_after_expiry() {
    let codec = TokenCodec::new(TEST_SECRET);
    let issued_at = (Utc::now() - Duration::days(366)).timestamp();

    let token = codec.issue_at(identity("old@example.com"), issued_at).unwrap();

    assert!(codec.verify(&token).is_err());
}

#[test]
fn test_token_rejected_seconds_after_expiry() {
    let codec = TokenCodec::new(TEST_SECRET);
    let issued_at =
        (Utc::now() - Duration::days(365) - Duration::seconds(30)).timestamp();

    let token = codec.issue_at(identity("old@example.com"), issued_at).unwrap();

    assert!(codec.verify(&token).is_err());
}

#[test]
fn test_token_rejected_with_other_secret() {
    let token = TokenCodec::new("another-secret")
        .issue(identity("mallory@example.com"))
        .unwrap();

    assert!(TokenCodec::new(TEST_SECRET).verify(&token).is_err());
    assert!(TokenCodec::new(TEST_SECRET).verify("not.a.jwt").is_err());
}

#[test]
fn test_session_cookie_is_found_among_others() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        header::COOKIE,
        "theme=dark; token=abc.def.ghi; lang=en".parse().unwrap(),
    );
    assert_eq!(session_cookie(&headers).as_deref(), Some("abc.def.ghi"));

    headers.insert(header::COOKIE, "token=".parse().unwrap());
    assert_eq!(session_cookie(&headers), None);
}

// --- Token Gate ---

#[tokio::test]
async fn test_token_gate_rejects_missing_cookie() {
    let state = create_app_state(Env::Local, Arc::new(MemoryRepository::new()));

    let (status, body) = send(create_router(state), get_request("/user/a@b.com", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "unauthorized access" }));
}

#[tokio::test]
async fn test_token_gate_rejects_invalid_token() {
    let state = create_app_state(Env::Local, Arc::new(MemoryRepository::new()));

    let (status, _) = send(
        create_router(state),
        get_request("/user/a@b.com", Some("token=garbage")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_gate_rejects_expired_token() {
    let state = create_app_state(Env::Local, Arc::new(MemoryRepository::new()));
    let issued_at = (Utc::now() - Duration::days(400)).timestamp();
    let token = state
        .tokens
        .issue_at(identity("a@b.com"), issued_at)
        .unwrap();

    let (status, _) = send(
        create_router(state),
        get_request("/user/a@b.com", Some(&format!("token={token}"))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_gate_passes_valid_token() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    seed_user(&repo, "a@b.com", None).await;
    let state = create_app_state(Env::Local, repo);
    let cookie = cookie_for(&state, "a@b.com");

    let (status, body) = send(
        create_router(state),
        get_request("/user/a@b.com", Some(&cookie)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@b.com");
}

// --- Role Gates ---

#[tokio::test]
async fn test_admin_gate_accepts_admin() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    seed_user(&repo, "admin@b.com", Some("admin")).await;
    let state = create_app_state(Env::Local, repo);
    let cookie = cookie_for(&state, "admin@b.com");

    let (status, body) = send(create_router(state), get_request("/users", Some(&cookie))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_admin_gate_rejects_other_roles() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    seed_user(&repo, "adopter@b.com", Some("adopter")).await;
    seed_user(&repo, "plain@b.com", None).await;
    seed_user(&repo, "typo@b.com", Some("Admin")).await;
    let state = create_app_state(Env::Local, repo);

    for email in ["adopter@b.com", "plain@b.com", "typo@b.com", "ghost@b.com"] {
        let cookie = cookie_for(&state, email);
        let (status, body) = send(
            create_router(state.clone()),
            get_request("/admin-stat", Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{email} must not pass");
        assert_eq!(body["message"], "unauthorized access");
    }
}

#[tokio::test]
async fn test_adopter_gate_rejects_admin() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    seed_user(&repo, "admin@b.com", Some("admin")).await;
    seed_user(&repo, "adopter@b.com", Some("adopter")).await;
    let state = create_app_state(Env::Local, repo);

    let admin = cookie_for(&state, "admin@b.com");
    let (status, _) = send(
        create_router(state.clone()),
        get_request("/pets/admin@b.com", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let adopter = cookie_for(&state, "adopter@b.com");
    let (status, _) = send(
        create_router(state),
        get_request("/pets/adopter@b.com", Some(&adopter)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_gate_store_fault_is_internal_error() {
    let state = create_app_state(Env::Local, Arc::new(FailingRepo));
    let cookie = cookie_for(&state, "admin@b.com");

    let (status, body) = send(create_router(state), get_request("/users", Some(&cookie))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "Internal Server Error" }));
}

#[tokio::test]
async fn test_role_gate_without_token_gate_fails_closed() {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    seed_user(&repo, "admin@b.com", Some("admin")).await;
    let state = create_app_state(Env::Local, repo);
    let cookie = cookie_for(&state, "admin@b.com");

    // Mis-wired on purpose: role gate only.
    let app = Router::new()
        .route("/guarded", get(|| async { "ok" }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
        .with_state(state);

    let (status, _) = send(app, get_request("/guarded", Some(&cookie))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// --- Session Cookie ---

#[tokio::test]
async fn test_jwt_sets_http_only_cookie_locally() {
    let state = create_app_state(Env::Local, Arc::new(MemoryRepository::new()));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/jwt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "a@b.com" }).to_string()))
        .unwrap();

    let response = create_router(state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(!cookie.contains("Secure"));

    let token = cookie
        .trim_start_matches("token=")
        .split(';')
        .next()
        .unwrap();
    assert_eq!(state.tokens.verify(token).unwrap().email, "a@b.com");
}

#[tokio::test]
async fn test_jwt_cookie_is_cross_site_in_production() {
    let state = create_app_state(Env::Production, Arc::new(MemoryRepository::new()));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/jwt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "a@b.com" }).to_string()))
        .unwrap();

    let response = create_router(state).oneshot(request).await.unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();

    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=None"));
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let state = create_app_state(Env::Local, Arc::new(MemoryRepository::new()));

    let response = create_router(state)
        .oneshot(get_request("/logout", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[test]
fn test_unencodable_cookie_is_an_internal_error() {
    let config = AppConfig::default();

    let cookie = session_cookie_header("abc.def.ghi", &config).unwrap();
    assert!(cookie.to_str().unwrap().starts_with("token=abc.def.ghi;"));

    let err = session_cookie_header("broken\nvalue", &config).unwrap_err();
    let err = AppError::from(err);
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
