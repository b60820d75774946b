use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CspError {
    #[error("unknown CSP mode '{0}'")]
    UnknownMode(String),
}

pub type CspResult<T> = Result<T, CspError>;
