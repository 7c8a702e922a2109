use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReputationError>;

#[derive(Error, Debug)]
pub enum ReputationError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Update conflict for agent {agent_id} after {attempts} attempts")]
    UpdateConflict { agent_id: String, attempts: u32 },
    #[error("Processing timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl ReputationError {
    /// Transient store failures are retried with backoff; everything else
    /// fails the unit of work immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReputationError::StoreError(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ReputationError {
    fn from(e: rocksdb::Error) -> Self {
        ReputationError::StoreError(e.to_string())
    }
}
