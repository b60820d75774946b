use thiserror::Error;

use crate::jsonrpc::{
    RpcError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    pub fn code(&self) -> i64 {
        match self {
            AdapterError::Parse(_) => PARSE_ERROR,
            AdapterError::InvalidRequest(_) => INVALID_REQUEST,
            AdapterError::MethodNotFound(_) | AdapterError::UnknownTool(_) => METHOD_NOT_FOUND,
            AdapterError::InvalidParams(_) => INVALID_PARAMS,
            AdapterError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<AdapterError> for RpcError {
    fn from(err: AdapterError) -> Self {
        RpcError {
            code: err.code(),
            message: err.to_string(),
            data: None,
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
