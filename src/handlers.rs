use crate::{
    AppState,
    auth::{clear_session_cookie_header, session_cookie_header},
    errors::AppError,
    models::{
        AdminStat, DeleteResult, Document, InsertOneResult, Page, Role, SessionCleared,
        SessionIssued, UpdateResult, strip_server_fields,
    },
    repository::{Collection, Filter},
    token::Identity,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status a user sends to request the adopter role.
pub const REQUESTED_STATUS: &str = "Requested";
/// Status an adopter assigns to an adoption record they accept.
pub const VERIFIED_STATUS: &str = "verified";

// Field paths the listing endpoints filter on.
const EMAIL: &str = "email";
const USER_EMAIL: &str = "user.email";
const ADOPTER_EMAIL: &str = "adopter.email";

// --- Query Structs ---

/// PageParams
///
/// `limit`/`page` are taken as raw strings so that malformed values fall back to the
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageParams {
    /// Page size, default 4.
    pub limit: Option<String>,
    /// 1-based page number, default 1.
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct AdoptionQuery {
    /// Email of the user who submitted the adoption requests.
    pub email: Option<String>,
}

/// UserUpsert
///
/// `PUT /users/{email}` returns either the write acknowledgement or, when nothing had
/// to change, the stored user document itself.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserUpsert {
    Written(UpdateResult),
    Unchanged(Document),
}

fn now_millis() -> Value {
    Value::from(chrono::Utc::now().timestamp_millis())
}

// --- Session ---

/// root
///
/// [Public Route] Liveness string.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Server is running", body = String)))]
pub async fn root() -> &'static str {
    "Server Is Running......"
}

/// issue_session
///
/// [Public Route] Signs a session token for the posted identity and delivers it as the
/// HTTP-only `token` cookie. The body only confirms success.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body(content = Object, description = "Caller identity: `email` plus extra claims"),
    responses((status = 200, description = "Token issued, cookie set", body = SessionIssued))
)]
pub async fn issue_session(
    State(state): State<AppState>,
    Json(identity): Json<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let email = identity.email.clone();
    let token = state.tokens.issue(identity)?;
    tracing::info!(%email, "session token issued");

    Ok((
        [(header::SET_COOKIE, session_cookie_header(&token, &state.config)?)],
        Json(SessionIssued { success: true }),
    ))
}

/// logout
///
/// [Public Route] Tells the client to drop its cookie. The token itself stays valid
/// until it expires.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 200, description = "Cookie cleared", body = SessionCleared))
)]
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cookie = clear_session_cookie_header(&state.config)?;
    tracing::info!("session cookie cleared");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SessionCleared { message: true }),
    ))
}

// --- Users ---

/// upsert_user
///
/// [Public Route] Saves a user on first sign-in, or records an adopter request.
///
/// - unknown email: stores the body with `email` and a server `timestamp`;
/// - known email with `status: "Requested"`: sets the status;
/// - known email otherwise: returns the stored document untouched.
///
/// A client-supplied `role` is ignored here; roles are assigned by admins only.
#[utoipa::path(
    put,
    path = "/users/{email}",
    params(("email" = String, Path, description = "User email")),
    request_body(content = Object, description = "User document"),
    responses((status = 200, description = "Update acknowledgement or the existing user"))
)]
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(mut user): Json<Document>,
) -> Result<Json<UserUpsert>, AppError> {
    strip_server_fields(&mut user);
    user.remove("role");

    let filter = Filter::field(EMAIL, email.clone());

    if let Some(existing) = state.repo.find_one(Collection::Users, &filter).await? {
        if user.get("status").and_then(Value::as_str) != Some(REQUESTED_STATUS) {
            return Ok(Json(UserUpsert::Unchanged(existing)));
        }

        let mut set = Document::new();
        set.insert("status".to_string(), Value::from(REQUESTED_STATUS));
        let result = state
            .repo
            .update_one(Collection::Users, &filter, set, true)
            .await?;
        tracing::info!(%email, "adopter role requested");
        return Ok(Json(UserUpsert::Written(result)));
    }

    user.insert(EMAIL.to_string(), Value::from(email.clone()));
    user.insert("timestamp".to_string(), now_millis());
    let result = state
        .repo
        .update_one(Collection::Users, &filter, user, true)
        .await?;
    tracing::info!(%email, "user saved");

    Ok(Json(UserUpsert::Written(result)))
}

/// get_user
///
/// [Authenticated Route] One user by email, `null` when absent. The front end reads
/// the role from it.
#[utoipa::path(
    get,
    path = "/user/{email}",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "User document or null"), (status = 401, description = "Unauthorized"))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Option<Document>>, AppError> {
    let user = state
        .repo
        .find_one(Collection::Users, &Filter::field(EMAIL, email))
        .await?;
    Ok(Json(user))
}

/// list_users
///
/// [Admin Route] Every user document.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users"), (status = 401, description = "Unauthorized"))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    let users = state
        .repo
        .find(Collection::Users, &Filter::All, None)
        .await?;
    Ok(Json(users))
}

/// update_user
///
/// [Admin Route] Upserts arbitrary user fields and the role, stamping `timestamp`.
/// `role` must be `"adopter"`, `"admin"` or `null` (clears it); when absent the stored
/// role is left as is.
#[utoipa::path(
    put,
    path = "/users/update/{email}",
    params(("email" = String, Path, description = "User email")),
    request_body(content = Object, description = "User fields, optionally `role`"),
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateResult),
        (status = 400, description = "Unknown role"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(mut user): Json<Document>,
) -> Result<Json<UpdateResult>, AppError> {
    strip_server_fields(&mut user);

    match user.get("role") {
        None | Some(Value::Null) => {}
        Some(Value::String(role)) if Role::parse(role).is_some() => {}
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown role: {other}")));
        }
    }

    user.insert(EMAIL.to_string(), Value::from(email.clone()));
    user.insert("timestamp".to_string(), now_millis());

    let result = state
        .repo
        .update_one(Collection::Users, &Filter::field(EMAIL, email.clone()), user, true)
        .await?;
    tracing::info!(%email, "user updated by admin");

    Ok(Json(result))
}

/// admin_stat
///
/// [Admin Route] Document counts of the three collections.
#[utoipa::path(
    get,
    path = "/admin-stat",
    responses((status = 200, description = "Counts", body = AdminStat), (status = 401, description = "Unauthorized"))
)]
pub async fn admin_stat(State(state): State<AppState>) -> Result<Json<AdminStat>, AppError> {
    Ok(Json(AdminStat {
        user_count: state.repo.count(Collection::Users).await?,
        pet_count: state.repo.count(Collection::Pets).await?,
        total_adopt: state.repo.count(Collection::Adopt).await?,
    }))
}

// --- Pets ---

/// list_pets
///
/// [Public Route] One page of pets in insertion order, `skip = (page - 1) * limit`.
#[utoipa::path(
    get,
    path = "/pets",
    params(PageParams),
    responses((status = 200, description = "Page of pet documents"))
)]
pub async fn list_pets(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Document>>, AppError> {
    let page = Page::from_query(params.limit.as_deref(), params.page.as_deref());
    let pets = state
        .repo
        .find(Collection::Pets, &Filter::All, Some(page))
        .await?;
    Ok(Json(pets))
}

/// create_pet
///
/// [Authenticated Route] Stores the posted pet document as is.
#[utoipa::path(
    post,
    path = "/pets",
    request_body(content = Object, description = "Pet document"),
    responses((status = 200, description = "Inserted", body = InsertOneResult), (status = 401, description = "Unauthorized"))
)]
pub async fn create_pet(
    State(state): State<AppState>,
    Json(mut pet): Json<Document>,
) -> Result<Json<InsertOneResult>, AppError> {
    strip_server_fields(&mut pet);
    let result = state.repo.insert_one(Collection::Pets, pet).await?;
    tracing::info!(id = %result.inserted_id, "pet saved");
    Ok(Json(result))
}

/// get_pet
///
/// [Authenticated Route] One pet by id, `null` when absent.
#[utoipa::path(
    get,
    path = "/pet/{id}",
    params(("id" = Uuid, Path, description = "Pet ID")),
    responses((status = 200, description = "Pet document or null"), (status = 401, description = "Unauthorized"))
)]
pub async fn get_pet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Document>>, AppError> {
    let pet = state.repo.find_one(Collection::Pets, &Filter::Id(id)).await?;
    Ok(Json(pet))
}

/// list_adopter_pets
///
/// [Adopter Route] Pets listed by the adopter with this email.
#[utoipa::path(
    get,
    path = "/pets/{email}",
    params(("email" = String, Path, description = "Adopter email")),
    responses((status = 200, description = "Pet documents"), (status = 401, description = "Unauthorized"))
)]
pub async fn list_adopter_pets(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    let pets = state
        .repo
        .find(Collection::Pets, &Filter::field(ADOPTER_EMAIL, email), None)
        .await?;
    Ok(Json(pets))
}

/// delete_pet
///
/// [Adopter Route] Removes one pet by id.
#[utoipa::path(
    delete,
    path = "/pets/{id}",
    params(("id" = Uuid, Path, description = "Pet ID")),
    responses((status = 200, description = "Deleted", body = DeleteResult), (status = 401, description = "Unauthorized"))
)]
pub async fn delete_pet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResult>, AppError> {
    let result = state.repo.delete_one(Collection::Pets, &Filter::Id(id)).await?;
    tracing::info!(%id, deleted = result.deleted_count, "pet deleted");
    Ok(Json(result))
}

// --- Adoptions ---

/// create_adoption
///
/// [Authenticated Route] Stores an adoption request (`user`, `adopter`, pet reference,
/// `status`) as posted.
#[utoipa::path(
    post,
    path = "/adoption",
    request_body(content = Object, description = "Adoption request document"),
    responses((status = 200, description = "Inserted", body = InsertOneResult), (status = 401, description = "Unauthorized"))
)]
pub async fn create_adoption(
    State(state): State<AppState>,
    Json(mut adoption): Json<Document>,
) -> Result<Json<InsertOneResult>, AppError> {
    strip_server_fields(&mut adoption);
    let result = state.repo.insert_one(Collection::Adopt, adoption).await?;
    tracing::info!(id = %result.inserted_id, "adoption request saved");
    Ok(Json(result))
}

/// list_adoptions
///
/// [Authenticated Route] Adoption records submitted by `?email=`. Without an email the
/// answer is an empty list.
#[utoipa::path(
    get,
    path = "/adoptions",
    params(AdoptionQuery),
    responses((status = 200, description = "Adoption records"), (status = 401, description = "Unauthorized"))
)]
pub async fn list_adoptions(
    State(state): State<AppState>,
    Query(query): Query<AdoptionQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let Some(email) = query.email.filter(|email| !email.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    let adoptions = state
        .repo
        .find(Collection::Adopt, &Filter::field(USER_EMAIL, email), None)
        .await?;
    Ok(Json(adoptions))
}

/// list_donations
///
/// [Authenticated Route] Adoption records submitted by the user with this email.
#[utoipa::path(
    get,
    path = "/donations/{email}",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "Adoption records"), (status = 401, description = "Unauthorized"))
)]
pub async fn list_donations(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    let adoptions = state
        .repo
        .find(Collection::Adopt, &Filter::field(USER_EMAIL, email), None)
        .await?;
    Ok(Json(adoptions))
}

/// list_adopter_requests
///
/// [Authenticated Route] Adoption records addressed to the adopter with this email.
#[utoipa::path(
    get,
    path = "/adopter/{email}",
    params(("email" = String, Path, description = "Adopter email")),
    responses((status = 200, description = "Adoption records"), (status = 401, description = "Unauthorized"))
)]
pub async fn list_adopter_requests(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    let adoptions = state
        .repo
        .find(Collection::Adopt, &Filter::field(ADOPTER_EMAIL, email), None)
        .await?;
    Ok(Json(adoptions))
}

/// list_adopted_pets
///
/// [Adopter Route] Adoption records addressed to the adopter with this email. Uses the
/// same `adopter.email` shape as every other adoption query.
#[utoipa::path(
    get,
    path = "/adopted/pets/{email}",
    params(("email" = String, Path, description = "Adopter email")),
    responses((status = 200, description = "Adoption records"), (status = 401, description = "Unauthorized"))
)]
pub async fn list_adopted_pets(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    let adoptions = state
        .repo
        .find(Collection::Adopt, &Filter::field(ADOPTER_EMAIL, email), None)
        .await?;
    Ok(Json(adoptions))
}

/// verify_adoption
///
/// [Adopter Route] Merges the body into the adoption record and marks it `verified`,
/// creating the record under this id if it does not exist.
#[utoipa::path(
    put,
    path = "/pets/update/{id}",
    params(("id" = Uuid, Path, description = "Adoption record ID")),
    request_body(content = Object, description = "Fields merged into the adoption record"),
    responses((status = 200, description = "Update acknowledgement", body = UpdateResult), (status = 401, description = "Unauthorized"))
)]
pub async fn verify_adoption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut adoption): Json<Document>,
) -> Result<Json<UpdateResult>, AppError> {
    strip_server_fields(&mut adoption);
    adoption.insert("status".to_string(), Value::from(VERIFIED_STATUS));

    let result = state
        .repo
        .update_one(Collection::Adopt, &Filter::Id(id), adoption, true)
        .await?;
    tracing::info!(%id, "adoption verified");
    Ok(Json(result))
}

/// cancel_adoption
///
/// [Public Route] Removes one adoption record by id. Deliberately ungated, see
/// DESIGN.md.
#[utoipa::path(
    delete,
    path = "/pet/cancel/{id}",
    params(("id" = Uuid, Path, description = "Adoption record ID")),
    responses((status = 200, description = "Deleted", body = DeleteResult))
)]
pub async fn cancel_adoption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResult>, AppError> {
    let result = state.repo.delete_one(Collection::Adopt, &Filter::Id(id)).await?;
    tracing::info!(%id, deleted = result.deleted_count, "adoption request cancelled");
    Ok(Json(result))
}
