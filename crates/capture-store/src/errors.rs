use gasoline_log_store::LogStoreError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CaptureError {
    #[error(transparent)]
    LogStore(#[from] LogStoreError),
    #[error("override limit of {max} keys reached")]
    TooManyOverrides { max: usize },
    #[error("unknown security mode '{0}'")]
    UnknownSecurityMode(String),
    #[error("unknown buffer '{0}'")]
    UnknownBuffer(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
