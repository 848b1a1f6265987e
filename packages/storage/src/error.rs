use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Column `{column}` holds a {kind} value, which tables cannot carry")]
    UnsupportedValue { column: String, kind: &'static str },
    #[error("Column `{column}` holds text that is not valid UTF-8")]
    InvalidUtf8 { column: String },
    #[error("Invalid table: {0}")]
    InvalidTable(String),
    #[error("Object store error: {0}")]
    Object(#[from] object_store::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
