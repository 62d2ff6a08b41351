use thiserror::Error;

/// Failures talking to the karma ledger. The caller decides whether to retry.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid timestamp in ledger: {0:?}")]
    InvalidTimestamp(String),
}

impl LedgerError {
    /// Connectivity and filesystem problems may clear up; corrupt rows will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::Io(_))
    }
}
