use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Database not initialized. Run 'jobmap init' first.")]
    NotInitialized,

    #[error("Job #{0} not found")]
    JobNotFound(i64),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid salary bucket '{0}'")]
    InvalidBucket(String),

    #[error("invalid radius {0} km (must be a positive number)")]
    InvalidRadius(f64),

    #[error("no search center set; locate yourself or pick a center first")]
    CenterUnset,

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("permission denied: {0}")]
    Forbidden(String),
}
