use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayoffError {
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid solver configuration: {0}")]
    InvalidSolveConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PayoffError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PayoffError>;
