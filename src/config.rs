use std::env;

/// Origins the front end is served from. Used when `CORS_ORIGINS` is not set.
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "https://petpalshub.vercel.app",
    "http://localhost:5173",
    "https://petpals-hub.vercel.app",
    "http://localhost:5174",
    "https://api.imgbb.com",
];

const LOCAL_TOKEN_SECRET: &str = "petpals-local-development-secret";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only through `AppState` (pulled into handlers via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string, or `memory` for the in-process document store.
    pub db_url: String,
    // Secret used to sign and verify session tokens (HS256).
    pub token_secret: String,
    // TCP port the HTTP server listens on.
    pub port: u16,
    // Origins allowed to call the API with credentials.
    pub cors_origins: Vec<String>,
    // Runtime environment marker. Controls the session cookie attributes.
    pub env: Env,
}

/// Env
///
/// Deployment environment. Production serves the session cookie cross-site
/// (`Secure; SameSite=None`), local development keeps it `SameSite=Strict`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            db_url: "memory".to_string(),
            token_secret: LOCAL_TOKEN_SECRET.to_string(),
            port: 5000,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` is missing, if `ACCESS_TOKEN_SECRET` is missing in
    /// production, or if `PORT` is not a valid port number.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let token_secret = match env {
            Env::Production => env::var("ACCESS_TOKEN_SECRET")
                .expect("FATAL: ACCESS_TOKEN_SECRET must be set in production."),
            Env::Local => env::var("ACCESS_TOKEN_SECRET")
                .unwrap_or_else(|_| LOCAL_TOKEN_SECRET.to_string()),
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().expect("FATAL: PORT must be a valid port number."),
            Err(_) => 5000,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect());

        Self {
            db_url: env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set."),
            token_secret,
            port,
            cors_origins,
            env,
        }
    }

    /// True when the session cookie must be sent cross-site.
    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
