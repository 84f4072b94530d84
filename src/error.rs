use thiserror::Error;

/// Failure reported by the storefront when asked to finish a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform rejected the request: {0}")]
    Rejected(String),
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The transaction cannot be admitted as given. Engine state is untouched.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    /// An input record could not be turned into a store update.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Failed to finish transaction {transaction_id} on platform")]
    PlatformFinish {
        transaction_id: String,
        #[source]
        source: PlatformError,
    },
    #[error("Transaction feed unavailable: {0}")]
    FeedUnavailable(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
