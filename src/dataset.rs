use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::config::{LoadPolicy, Settings};
use crate::error::{DashboardError, Result};
use crate::models::{
    ActivityRecord, Document, PhysiologyRecord, SleepDayRecord, SourceSleepRecord, WorkoutRecord,
};
use crate::schema::{HeaderMap, SourceRecord};
use crate::store::DocumentStore;

/// A loaded collection: typed rows plus the columns its documents carried.
#[derive(Debug, Clone)]
pub struct SourceTable<R> {
    pub columns: HeaderMap,
    pub headers: Vec<String>,
    pub rows: Vec<R>,
}

impl<R: SourceRecord> SourceTable<R> {
    pub fn from_documents(documents: &[Document]) -> Self {
        let headers: BTreeSet<&str> = documents
            .iter()
            .flat_map(|document| document.keys().map(String::as_str))
            .collect();
        let columns = HeaderMap::resolve(R::schema(), headers.iter().copied());
        let rows = documents
            .iter()
            .map(|document| R::from_document(&columns, document))
            .collect();

        Self {
            columns,
            headers: headers.into_iter().map(str::to_string).collect(),
            rows,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.columns.collection()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fails with `EmptyResult` when the collection holds no rows.
    pub fn require_rows(&self) -> Result<&[R]> {
        if self.rows.is_empty() {
            Err(DashboardError::EmptyResult(self.collection().to_string()))
        } else {
            Ok(&self.rows)
        }
    }
}

/// Rows attributed to one subject of a multi-subject source.
pub trait SubjectRecord {
    fn subject_id(&self) -> Option<i64>;
}

impl SubjectRecord for ActivityRecord {
    fn subject_id(&self) -> Option<i64> {
        self.subject_id
    }
}

impl SubjectRecord for SleepDayRecord {
    fn subject_id(&self) -> Option<i64> {
        self.subject_id
    }
}

/// Rows of `subject` in their stored order.
pub fn rows_for_subject<R: SubjectRecord + Clone>(rows: &[R], subject: i64) -> Vec<R> {
    rows.iter()
        .filter(|row| row.subject_id() == Some(subject))
        .cloned()
        .collect()
}

/// Distinct subject ids, ascending.
pub fn subject_ids<R: SubjectRecord>(rows: &[R]) -> Vec<i64> {
    rows.iter()
        .filter_map(SubjectRecord::subject_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every collection the dashboard reads, loaded once per session.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub activity: SourceTable<ActivityRecord>,
    pub sleep_day: SourceTable<SleepDayRecord>,
    pub physiology: SourceTable<PhysiologyRecord>,
    pub source_sleep: SourceTable<SourceSleepRecord>,
    pub workouts: SourceTable<WorkoutRecord>,
}

impl Dataset {
    pub async fn load(store: &dyn DocumentStore, policy: &LoadPolicy) -> Result<Self> {
        Ok(Self {
            activity: load_table(store, policy).await?,
            sleep_day: load_table(store, policy).await?,
            physiology: load_table(store, policy).await?,
            source_sleep: load_table(store, policy).await?,
            workouts: load_table(store, policy).await?,
        })
    }
}

async fn load_table<R: SourceRecord>(
    store: &dyn DocumentStore,
    policy: &LoadPolicy,
) -> Result<SourceTable<R>> {
    let collection = R::schema().collection;
    let documents = find_with_retry(store, collection, policy).await?;
    let table = SourceTable::<R>::from_documents(&documents);
    info!(collection, rows = table.len(), columns = table.headers.len(), "loaded collection");
    Ok(table)
}

/// `find` with a per-attempt timeout and linear backoff. Only connectivity
/// failures and timeouts are retried.
pub async fn find_with_retry(
    store: &dyn DocumentStore,
    collection: &str,
    policy: &LoadPolicy,
) -> Result<Vec<Document>> {
    let attempts = policy.attempts.max(1);
    let mut last_failure = String::new();

    for attempt in 1..=attempts {
        match timeout(policy.timeout, store.find(collection)).await {
            Ok(Ok(documents)) => return Ok(documents),
            Ok(Err(DashboardError::Connectivity(reason))) => {
                warn!(collection, attempt, "store unreachable: {reason}");
                last_failure = reason;
            }
            Ok(Err(other)) => return Err(other),
            Err(_) => {
                let timeout_ms = policy.timeout.as_millis() as u64;
                warn!(collection, attempt, timeout_ms, "load timed out");
                last_failure = format!("timed out after {:?}", policy.timeout);
            }
        }

        if attempt < attempts {
            sleep(policy.backoff * attempt).await;
        }
    }

    Err(DashboardError::Connectivity(format!(
        "loading `{collection}` failed after {attempts} attempts: {last_failure}"
    )))
}

/// Process-wide handles, built once in `main` and passed down.
pub struct AppContext {
    pub settings: Settings,
    pub store: Arc<dyn DocumentStore>,
}

impl AppContext {
    pub fn new(settings: Settings, store: Arc<dyn DocumentStore>) -> Self {
        Self { settings, store }
    }

    pub async fn load_dataset(&self) -> Result<Dataset> {
        Dataset::load(self.store.as_ref(), &self.settings.load).await
    }
}
