//! Error types for the streak engine
//!
//! None of these are fatal to the process: store errors skip one key or one
//! subscriber for the current cycle, history errors skip the cycle, delivery
//! errors are logged.

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Serialization(serde_json::Error),
    /// A connection mutex was poisoned by a panicking holder
    LockPoisoned,
    /// A persisted code that no longer maps to a known enum variant
    InvalidValue(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::LockPoisoned => write!(f, "Database connection lock poisoned"),
            StoreError::InvalidValue(v) => write!(f, "Invalid stored value: {}", v),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, PartialEq, Eq)]
pub enum HistoryError {
    /// History was not ordered oldest → newest
    OutOfOrder { previous: String, next: String },
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::OutOfOrder { previous, next } => write!(
                f,
                "History out of order: {} followed by older {}",
                previous, next
            ),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Failure of one analysis cycle before any subscriber was processed
#[derive(Debug)]
pub enum CycleError {
    Store(StoreError),
    History(HistoryError),
}

impl From<StoreError> for CycleError {
    fn from(err: StoreError) -> Self {
        CycleError::Store(err)
    }
}

impl From<HistoryError> for CycleError {
    fn from(err: HistoryError) -> Self {
        CycleError::History(err)
    }
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Store(e) => write!(f, "{}", e),
            CycleError::History(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CycleError {}

#[derive(Debug)]
pub enum NotifyError {
    Http(reqwest::Error),
    /// The delivery endpoint answered with a non-success status
    Api(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err)
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "HTTP error: {}", e),
            NotifyError::Api(msg) => write!(f, "Notification API error: {}", msg),
        }
    }
}

impl std::error::Error for NotifyError {}
