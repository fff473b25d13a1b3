use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DashboardError, Result};
use crate::models::{Document, FieldValue};

/// Identity field some stores attach to every document.
pub const IDENTITY_FIELD: &str = "_id";

/// Collection-addressed document persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends `documents` to `collection` and returns how many were stored.
    /// A failure part-way reports the confirmed count through
    /// [`DashboardError::Persistence`].
    async fn insert_many(&self, collection: &str, documents: &[Document]) -> Result<usize>;

    /// Every document of `collection`, in insertion order, without the
    /// store identity field.
    async fn find(&self, collection: &str) -> Result<Vec<Document>>;
}

pub fn strip_identity(mut document: Document) -> Document {
    document.remove(IDENTITY_FIELD);
    document
}

fn classify(err: sqlx::Error) -> DashboardError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => DashboardError::Connectivity(err.to_string()),
        other => DashboardError::Database(other),
    }
}

/// Postgres-backed store keeping each document as a JSONB body.
pub struct PgDocumentStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str, timeout: Duration, batch_size: usize) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await
            .map_err(|e| {
                DashboardError::Connectivity(format!("failed to connect to Postgres: {e}"))
            })?;

        Ok(Self {
            pool,
            batch_size: batch_size.max(1),
        })
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_many(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        let mut confirmed = 0usize;

        for batch in documents.chunks(self.batch_size) {
            let ids: Vec<Uuid> = batch.iter().map(|_| Uuid::new_v4()).collect();
            let bodies = batch
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let result = sqlx::query(
                r#"
                INSERT INTO health_dashboard.documents (id, collection, body)
                SELECT id, $1, body
                FROM UNNEST($2::uuid[], $3::jsonb[]) AS incoming(id, body)
                "#,
            )
            .bind(collection)
            .bind(&ids)
            .bind(&bodies)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => {
                    confirmed += done.rows_affected() as usize;
                    debug!(collection, batch = batch.len(), confirmed, "batch stored");
                }
                Err(err) => {
                    return Err(DashboardError::Persistence {
                        collection: collection.to_string(),
                        attempted: documents.len(),
                        confirmed,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(confirmed)
    }

    async fn find(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT body FROM health_dashboard.documents WHERE collection = $1 ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(body): Json<Document> = row.try_get("body").map_err(classify)?;
            documents.push(strip_identity(body));
        }

        Ok(documents)
    }
}

/// Process-local store used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once `capacity` documents are held.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    fn held(collections: &HashMap<String, Vec<Document>>) -> usize {
        collections.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_many(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut confirmed = 0usize;
        for document in documents {
            if let Some(capacity) = self.capacity {
                if Self::held(&collections) >= capacity {
                    return Err(DashboardError::Persistence {
                        collection: collection.to_string(),
                        attempted: documents.len(),
                        confirmed,
                        reason: format!("store is full at {capacity} documents"),
                    });
                }
            }

            let mut stored = document.clone();
            stored.insert(
                IDENTITY_FIELD.to_string(),
                FieldValue::Text(Uuid::new_v4().to_string()),
            );
            collections
                .entry(collection.to_string())
                .or_default()
                .push(stored);
            confirmed += 1;
        }

        Ok(confirmed)
    }

    async fn find(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        Ok(collections
            .get(collection)
            .map(|documents| documents.iter().cloned().map(strip_identity).collect())
            .unwrap_or_default())
    }
}
