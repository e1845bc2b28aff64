use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("invalid time range '{0}': expected '<start> - <end>' with both halves set")]
    InvalidRangeFormat(String),

    #[error("unknown time range label '{0}'")]
    UnknownRangeLabel(String),

    #[error("invalid timestamp '{0}': expected yyyy-MM-dd HH:mm:ss")]
    InvalidTimestamp(String),

    #[error("invalid time range table: {0}")]
    InvalidTimeRangeTable(String),

    #[error("cannot select at depth {depth}: only {expanded} level(s) expanded")]
    InvalidDepth { depth: usize, expanded: usize },

    #[error("no node at index {index} for depth {depth}")]
    NodeNotFound { depth: usize, index: usize },

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keychain error: {0}")]
    Keychain(String),
}

impl From<rusqlite::Error> for DashboardError {
    fn from(e: rusqlite::Error) -> Self {
        DashboardError::Database(e.to_string())
    }
}

impl From<keyring::Error> for DashboardError {
    fn from(e: keyring::Error) -> Self {
        DashboardError::Keychain(e.to_string())
    }
}

impl From<r2d2::Error> for DashboardError {
    fn from(e: r2d2::Error) -> Self {
        DashboardError::Database(e.to_string())
    }
}
