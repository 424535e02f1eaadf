use thiserror::Error;

/// Result type alias for dealfeed operations.
pub type Result<T> = std::result::Result<T, DealfeedError>;

/// Application-wide error taxonomy. The pipeline retries `TransientStorage`
/// with backoff; everything else is terminal for the item that raised it.
/// Only `Authorization` causes a request to be rejected outright.
#[derive(Error, Debug)]
pub enum DealfeedError {
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    #[error("Storage error: {0}")]
    PermanentStorage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl DealfeedError {
    /// Whether the pipeline should retry the operation that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, DealfeedError::TransientStorage(_))
    }
}

/// Classify database errors: contention and pool exhaustion are transient,
/// constraint violations and schema problems are not.
impl From<sqlx::Error> for DealfeedError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                DealfeedError::TransientStorage(err.to_string())
            }
            sqlx::Error::Database(db) => {
                let msg = db.message().to_lowercase();
                if msg.contains("deadlock")
                    || msg.contains("lock")
                    || msg.contains("busy")
                    || msg.contains("too many connections")
                {
                    DealfeedError::TransientStorage(err.to_string())
                } else {
                    DealfeedError::PermanentStorage(err.to_string())
                }
            }
            _ => DealfeedError::PermanentStorage(err.to_string()),
        }
    }
}
