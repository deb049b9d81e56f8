use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocRepoError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Document not found: {id}")]
    NotFound { id: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl DocRepoError {
    /// True for failures raised by the underlying document store, as opposed
    /// to schema or caller mistakes.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            DocRepoError::Store(_)
                | DocRepoError::Sqlite(_)
                | DocRepoError::Json(_)
                | DocRepoError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DocRepoError>;
