use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("could not parse {field}: {value:?}")]
    Parse { field: String, value: String },

    #[error("column `{column}` is missing from `{collection}`")]
    MissingColumn {
        collection: &'static str,
        column: &'static str,
    },

    #[error("document store unreachable: {0}")]
    Connectivity(String),

    #[error("no rows in {0}")]
    EmptyResult(String),

    #[error("persisted {confirmed} of {attempted} documents into `{collection}`: {reason}")]
    Persistence {
        collection: String,
        attempted: usize,
        confirmed: usize,
        reason: String,
    },

    #[error("failed to read source file {path}: {reason}")]
    SourceFile { path: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("series `{0}` must be sorted by date before alignment")]
    Unsorted(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
