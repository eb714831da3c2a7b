use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// A flat JSON document as stored in any collection.
pub type Document = Map<String, Value>;

/// Field holding the server-generated id of every stored document.
pub const ID_FIELD: &str = "_id";

// --- Roles ---

/// Role
///
/// The only authorization dimension. Stored as the lowercase string in the user
/// document's `role` field; anything else (including a missing field) parses to `None`
/// and passes no role gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Adopter,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Adopter => "adopter",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "adopter" => Some(Role::Adopter),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Reads the role of a user document.
    pub fn of_user(user: &Document) -> Option<Role> {
        user.get("role").and_then(Value::as_str).and_then(Role::parse)
    }

    /// A gate requiring `required` passes only for that exact role.
    pub fn grants(self, required: Role) -> bool {
        self == required
    }
}

// --- Store acknowledgements (Output Schemas) ---

/// InsertOneResult
///
/// Returned verbatim by `POST /pets` and `POST /adoption`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

/// UpdateResult
///
/// Returned by every upsert. `upserted_id` is set only when the write created a new
/// document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Uuid>,
}

impl UpdateResult {
    pub fn matched(modified: bool) -> Self {
        Self {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(modified),
            ..Self::default()
        }
    }

    pub fn upserted(id: Uuid) -> Self {
        Self {
            acknowledged: true,
            upserted_count: 1,
            upserted_id: Some(id),
            ..Self::default()
        }
    }

    pub fn unmatched() -> Self {
        Self {
            acknowledged: true,
            ..Self::default()
        }
    }
}

/// DeleteResult
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

// --- Dashboard & Session Schemas ---

/// AdminStat
///
/// Output of `GET /admin-stat`: document counts at call time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminStat {
    pub user_count: u64,
    pub pet_count: u64,
    pub total_adopt: u64,
}

/// Body of `POST /jwt`. The token itself travels in the `token` cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionIssued {
    pub success: bool,
}

/// Body of `GET /logout`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionCleared {
    pub message: bool,
}

// --- Query Parameters ---

/// Default page size of paginated listings.
pub const DEFAULT_PAGE_SIZE: u64 = 4;

/// Page
///
/// A skip/limit window. `from_query` mirrors the listing contract: a missing,
/// non-numeric or non-positive value falls back to the default, and there is no
/// upper bound on `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Page {
    pub fn from_query(limit: Option<&str>, page: Option<&str>) -> Self {
        let limit = positive(limit).unwrap_or(DEFAULT_PAGE_SIZE);
        let page = positive(page).unwrap_or(1);

        Self {
            skip: (page - 1).saturating_mul(limit),
            limit,
        }
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

/// Removes fields a client must never control on any write.
pub fn strip_server_fields(doc: &mut Document) {
    doc.remove(ID_FIELD);
}
