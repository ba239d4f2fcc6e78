use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid assumption `{name}`: {reason}")]
    InvalidAssumption { name: String, reason: String },

    #[error("cannot aggregate an empty month sequence")]
    EmptyInput,
}

impl ModelError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ModelError::InvalidAssumption {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
