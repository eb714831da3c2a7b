use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, header::InvalidHeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Duration;

use crate::{
    config::AppConfig,
    errors::AppError,
    models::Role,
    repository::{Collection, Filter, RepositoryState},
    token::{Claims, TOKEN_VALIDITY_DAYS, TokenCodec},
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Session
///
/// The verified claims of the current request. Only the token gate creates them; the
/// extractor reads them back from the request extensions.
///
/// Rejection: 401 when no token gate ran before it, so a route wired with a role gate
/// but without the token gate fails closed.
#[derive(Debug, Clone)]
pub struct Session(pub Claims);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(Session)
            .ok_or_else(|| {
                tracing::warn!(uri = %parts.uri, "role gate reached without a verified session");
                AppError::Unauthorized
            })
    }
}

// --- Gates ---

/// require_token
///
/// Token gate. Reads the `token` cookie, verifies it and stores the decoded [`Claims`]
/// in the request extensions for the gates and handlers behind it.
pub async fn require_token(
    State(tokens): State<TokenCodec>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = session_cookie(request.headers()) else {
        tracing::debug!(uri = %request.uri(), "session token not available");
        return Err(AppError::Unauthorized);
    };

    let claims = tokens.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "session token rejected");
        AppError::Unauthorized
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Admin gate. Must sit behind [`require_token`].
pub async fn require_admin(
    State(repo): State<RepositoryState>,
    Session(claims): Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&repo, &claims.email, Role::Admin).await?;
    Ok(next.run(request).await)
}

/// Adopter gate. Must sit behind [`require_token`].
pub async fn require_adopter(
    State(repo): State<RepositoryState>,
    Session(claims): Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&repo, &claims.email, Role::Adopter).await?;
    Ok(next.run(request).await)
}

/// authorize
///
/// Looks up the user behind `email` and checks their stored role against `required`.
/// Unknown user or mismatching role is `Unauthorized`; a store fault is `Repository`
/// (HTTP 500).
pub async fn authorize(
    repo: &RepositoryState,
    email: &str,
    required: Role,
) -> Result<(), AppError> {
    let user = repo
        .find_one(Collection::Users, &Filter::field("email", email))
        .await?;

    let Some(user) = user else {
        tracing::debug!(%email, "no user found with the given email");
        return Err(AppError::Unauthorized);
    };

    match Role::of_user(&user) {
        Some(role) if role.grants(required) => {
            tracing::debug!(%email, role = role.as_str(), "role gate passed");
            Ok(())
        }
        role => {
            tracing::debug!(
                %email,
                role = ?role,
                required = required.as_str(),
                "role gate rejected"
            );
            Err(AppError::Unauthorized)
        }
    }
}

// --- Cookie helpers ---

/// Finds the session token among the request's `Cookie` headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value delivering a freshly issued token.
pub fn session_cookie_header(
    token: &str,
    config: &AppConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = Duration::days(TOKEN_VALIDITY_DAYS).num_seconds();
    cookie_header(token, max_age, config)
}

/// `Set-Cookie` value instructing the client to discard its token.
pub fn clear_session_cookie_header(config: &AppConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie_header("", 0, config)
}

fn cookie_header(
    value: &str,
    max_age: i64,
    config: &AppConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    // Production front ends live on another site, so the cookie must be sent cross-site.
    let site_attrs = if config.is_production() {
        "Secure; SameSite=None"
    } else {
        "SameSite=Strict"
    };

    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={value}; HttpOnly; Path=/; Max-Age={max_age}; {site_attrs}"
    ))
}
