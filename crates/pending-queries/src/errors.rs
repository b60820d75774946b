use gasoline_core_types::ToolError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query '{0}' not found")]
    NotFound(String),
    #[error("correlation id '{0}' already in use")]
    DuplicateId(String),
    #[error("{0}")]
    QueueFull(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl From<QueryError> for ToolError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound(id) => {
                ToolError::invalid_param("correlation_id", format!("query '{id}' not found"))
            }
            QueryError::DuplicateId(id) => ToolError::invalid_param(
                "correlation_id",
                format!("correlation id '{id}' already in use"),
            ),
            QueryError::QueueFull(message) => ToolError::queue_full(message),
        }
    }
}
