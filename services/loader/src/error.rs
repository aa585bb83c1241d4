use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`crate::store::WarehouseStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("constraint violation on {table}: {detail}")]
    Constraint { table: &'static str, detail: String },

    #[error("injected failure at {0}")]
    Injected(String),

    #[error("no open transaction")]
    NoTransaction,

    #[error("store connection already closed")]
    Closed,
}

/// Fatal errors of a load run. Locally recoverable problems (bad timestamps,
/// unusable rows) never surface here.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("missing required columns in input: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to read input {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input header: {0}")]
    Header(#[from] csv::Error),

    #[error("DB_URL env var missing (use --dry-run to load without a database)")]
    MissingDatabaseUrl,

    #[error("failed to connect to warehouse: {0}")]
    Connectivity(#[source] StoreError),

    #[error("resolving {table} failed: {source}")]
    Dimension {
        table: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("fact load rolled back: {0}")]
    FactLoad(#[source] StoreError),

    #[error("time insert returned {returned} identifiers for {expected} rows")]
    LinkMismatch { expected: usize, returned: usize },
}

pub type Result<T> = std::result::Result<T, LoadError>;
