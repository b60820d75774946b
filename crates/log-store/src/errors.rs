use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LogStoreError {
    #[error("entry {index}: missing 'level'")]
    MissingLevel { index: usize },
    #[error("entry {index}: invalid level '{level}'")]
    InvalidLevel { index: usize, level: String },
    #[error("entry {index}: {size} bytes exceeds limit of {max}")]
    TooLarge { index: usize, size: usize, max: usize },
    #[error("write queue full, entry dropped")]
    Dropped,
    #[error("writer closed")]
    Closed,
    #[error("io error: {0}")]
    Io(String),
}

impl LogStoreError {
    /// Rejections caused by the caller's payload rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LogStoreError::MissingLevel { .. }
                | LogStoreError::InvalidLevel { .. }
                | LogStoreError::TooLarge { .. }
        )
    }
}

impl From<std::io::Error> for LogStoreError {
    fn from(err: std::io::Error) -> Self {
        LogStoreError::Io(err.to_string())
    }
}

pub type LogStoreResult<T> = Result<T, LogStoreError>;
