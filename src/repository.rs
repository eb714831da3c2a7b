use crate::models::{
    DeleteResult, Document, ID_FIELD, InsertOneResult, Page, UpdateResult,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    PgPool, Postgres,
    postgres::PgPoolOptions,
    query_builder::QueryBuilder,
    types::Json,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Collection
///
/// The three document collections of the platform. For the Postgres store each one
/// is a table of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Pets,
    Adopt,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Pets => "pets",
            Collection::Adopt => "adopt",
        }
    }
}

/// Filter
///
/// The query shapes the API needs: everything, one document by id, or string
/// equality on a (possibly nested, dot-separated) field path such as `user.email`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(Uuid),
    Field { path: &'static str, value: String },
}

impl Filter {
    pub fn field(path: &'static str, value: impl Into<String>) -> Self {
        Filter::Field {
            path,
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => {
                doc.get(ID_FIELD).and_then(Value::as_str) == Some(id.to_string().as_str())
            }
            Filter::Field { path, value } => {
                lookup(doc, path).and_then(Value::as_str) == Some(value.as_str())
            }
        }
    }

    /// The fields an upsert copies from the filter into a newly created document.
    pub fn seed(&self) -> Document {
        let mut doc = Document::new();
        if let Filter::Field { path, value } = self {
            let mut segments: Vec<&str> = path.split('.').collect();
            let mut nested = Value::String(value.clone());
            while segments.len() > 1 {
                if let Some(segment) = segments.pop() {
                    let mut wrapper = Document::new();
                    wrapper.insert(segment.to_string(), nested);
                    nested = Value::Object(wrapper);
                }
            }
            doc.insert(segments[0].to_string(), nested);
        }
        doc
    }

    fn segments(path: &str) -> Vec<String> {
        path.split('.').map(str::to_string).collect()
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Repository Trait
///
/// The persistence service: per-collection find/insert/update/delete/count over flat
/// JSON documents. Handlers build a [`Filter`] and call exactly one of these.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All matching documents in insertion order, optionally windowed by `page`.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>, RepoError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, RepoError>;

    /// Stores `doc` under a freshly generated `_id`.
    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> Result<InsertOneResult, RepoError>;

    /// Shallow-merges `set` into the first matching document. With `upsert`, a miss
    /// creates a document from the filter's seed fields plus `set`.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<UpdateResult, RepoError>;

    /// Removes at most one matching document.
    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, RepoError>;

    async fn count(&self, collection: Collection) -> Result<u64, RepoError>;

    /// Round trip to the store; used once at startup.
    async fn ping(&self) -> Result<(), RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Builds the document an upsert inserts when nothing matched.
fn upsert_document(filter: &Filter, set: Document, id: Uuid) -> Document {
    let mut doc = filter.seed();
    doc.extend(set);
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    doc
}

fn upsert_id(filter: &Filter) -> Uuid {
    match filter {
        Filter::Id(id) => *id,
        _ => Uuid::new_v4(),
    }
}

// --- Postgres ---

/// PostgresRepository
///
/// Stores every collection as a table of JSONB documents. The schema lives in
/// `migrations/` and is applied by [`PostgresRepository::connect`].
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Merges `set` into the first document matching `filter`. `None` when nothing
    /// matched, otherwise whether the stored document changed.
    async fn merge_first(
        &self,
        collection: Collection,
        filter: &Filter,
        set: &Document,
    ) -> Result<Option<bool>, RepoError> {
        let table = collection.name();

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("WITH target AS (SELECT id, doc FROM {table}"));
        push_filter(&mut builder, filter);
        builder.push(format!(
            " ORDER BY created_at, id LIMIT 1 FOR UPDATE) UPDATE {table} SET doc = {table}.doc || "
        ));
        builder.push_bind(Json(set.clone()));
        builder.push(format!(
            " FROM target WHERE {table}.id = target.id RETURNING {table}.doc IS DISTINCT FROM target.doc"
        ));

        let modified = builder
            .build_query_scalar::<bool>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(modified)
    }

    /// Opens the pool and brings the schema up to date.
    pub async fn connect(db_url: &str) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::new(pool))
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {}
        Filter::Id(id) => {
            builder.push(" WHERE id = ");
            builder.push_bind(*id);
        }
        Filter::Field { path, value } => {
            builder.push(" WHERE doc #>> ");
            builder.push_bind(Filter::segments(path));
            builder.push(" = ");
            builder.push_bind(value.clone());
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT doc FROM {}", collection.name()));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at, id");

        if let Some(page) = page {
            builder.push(" OFFSET ");
            builder.push_bind(to_i64(page.skip));
            builder.push(" LIMIT ");
            builder.push_bind(to_i64(page.limit));
        }

        let docs = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_all(&self.pool)
            .await?;

        Ok(docs.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT doc FROM {}", collection.name()));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at, id LIMIT 1");

        let doc = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(doc.map(|Json(doc)| doc))
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertOneResult, RepoError> {
        let id = Uuid::new_v4();
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.name());
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await?;

        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    /// update_one
    ///
    /// Locks the first match, merges with JSONB `||` (top-level keys of `set` replace
    /// existing ones) and reports whether the stored document actually changed.
    ///
    /// On a miss with `upsert`, the insert can lose a race against a concurrent upsert
    /// of the same email or id. The unique violation then means the document now
    /// exists, so the merge is retried once against it.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        mut set: Document,
        upsert: bool,
    ) -> Result<UpdateResult, RepoError> {
        set.remove(ID_FIELD);

        if let Some(modified) = self.merge_first(collection, filter, &set).await? {
            return Ok(UpdateResult::matched(modified));
        }
        if !upsert {
            return Ok(UpdateResult::unmatched());
        }

        let id = upsert_id(filter);
        let doc = upsert_document(filter, set.clone(), id);
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.name());

        match sqlx::query(&sql)
            .bind(id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(UpdateResult::upserted(id)),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(
                    collection = collection.name(),
                    "upsert lost an insert race, merging into the stored document"
                );
                Ok(self
                    .merge_first(collection, filter, &set)
                    .await?
                    .map_or_else(UpdateResult::unmatched, UpdateResult::matched))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, RepoError> {
        let table = collection.name();
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "DELETE FROM {table} WHERE id IN (SELECT id FROM {table}"
        ));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at, id LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;

        Ok(DeleteResult {
            acknowledged: true,
            deleted_count: result.rows_affected(),
        })
    }

    async fn count(&self, collection: Collection) -> Result<u64, RepoError> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// --- In-memory ---

/// MemoryRepository
///
/// An in-process document store with the same semantics as [`PostgresRepository`].
/// Backs the test suite and lets the service run without a database
/// (`DATABASE_URL=memory`).
#[derive(Default)]
pub struct MemoryRepository {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>, RepoError> {
        let collections = self.collections.read().await;
        let matching = collections
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|doc| filter.matches(doc))
            .cloned();

        Ok(match page {
            Some(page) => matching
                .skip(usize::try_from(page.skip).unwrap_or(usize::MAX))
                .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
                .collect(),
            None => matching.collect(),
        })
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, RepoError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertOneResult, RepoError> {
        let id = Uuid::new_v4();
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc);

        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        mut set: Document,
        upsert: bool,
    ) -> Result<UpdateResult, RepoError> {
        set.remove(ID_FIELD);

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if let Some(doc) = docs.iter_mut().find(|doc| filter.matches(doc)) {
            let before = doc.clone();
            doc.extend(set);
            return Ok(UpdateResult::matched(*doc != before));
        }

        if !upsert {
            return Ok(UpdateResult::unmatched());
        }

        let id = upsert_id(filter);
        docs.push(upsert_document(filter, set, id));
        Ok(UpdateResult::upserted(id))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, RepoError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        let deleted_count = match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                docs.remove(index);
                1
            }
            None => 0,
        };

        Ok(DeleteResult {
            acknowledged: true,
            deleted_count,
        })
    }

    async fn count(&self, collection: Collection) -> Result<u64, RepoError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, |docs| docs.len() as u64))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
