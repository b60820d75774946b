use gasoline_core_types::ToolError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NoiseError {
    #[error("{field} exceeds the maximum length of {max} characters")]
    PatternTooLong { field: &'static str, max: usize },
    #[error("{field} contains nested quantifiers")]
    NestedQuantifier { field: &'static str },
    #[error("{field} is not a valid regex: {message}")]
    InvalidRegex { field: &'static str, message: String },
    #[error("rule needs at least one of message_regex, source_regex, url_regex, method or status_min")]
    EmptyMatch,
    #[error("built-in rule '{0}' cannot be removed")]
    BuiltinRule(String),
    #[error("rule '{0}' not found")]
    NotFound(String),
    #[error("rule limit of {max} reached")]
    RuleLimit { max: usize },
}

pub type NoiseResult<T> = Result<T, NoiseError>;

impl From<NoiseError> for ToolError {
    fn from(err: NoiseError) -> Self {
        match &err {
            NoiseError::PatternTooLong { field, .. }
            | NoiseError::NestedQuantifier { field }
            | NoiseError::InvalidRegex { field, .. } => ToolError::invalid_param(field, err.to_string()),
            NoiseError::EmptyMatch => ToolError::invalid_param("rules", err.to_string()),
            NoiseError::BuiltinRule(_) | NoiseError::NotFound(_) => {
                ToolError::invalid_param("rule_id", err.to_string())
            }
            NoiseError::RuleLimit { .. } => ToolError::queue_full(err.to_string()),
        }
    }
}
