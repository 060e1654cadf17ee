//! Error types for the credit ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Credit ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// A debit would take the balance below zero
    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits {
        /// Credits the operation needed
        required: i64,
        /// Credits the account actually had
        available: i64,
    },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Ledger entry not found
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    /// A completed entry already exists for this payment reference
    #[error("Payment already processed: {0}")]
    DuplicatePayment(String),

    /// The payment gateway rejected the reference or was unreachable
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    /// Gateway-reported amount is below the tolerated threshold
    #[error("Payment amount mismatch: expected {expected_minor} minor units, gateway reported {paid_minor}")]
    AmountMismatch {
        /// Expected amount in the purchase currency's smallest unit
        expected_minor: i64,
        /// Gateway-reported amount in the settlement currency's smallest unit
        paid_minor: i64,
    },

    /// Amount is not supported (unlisted purchase tier, or a
    /// non-positive debit/credit)
    #[error("Unsupported amount: {0}")]
    InvalidAmount(i64),

    /// A chat turn was resolved twice
    #[error("Chat turn already resolved: {0}")]
    TurnAlreadyResolved(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl Error {
    /// True for expected business outcomes that the caller handles
    /// without retry, as opposed to infrastructure failures.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCredits { .. }
                | Error::DuplicatePayment(_)
                | Error::AmountMismatch { .. }
                | Error::InvalidAmount(_)
        )
    }
}
