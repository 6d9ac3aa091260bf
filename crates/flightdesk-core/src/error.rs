use thiserror::Error;

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("{message}")]
    Invalid { message: String },

    /// Search parameters failed validation; every problem is listed.
    #[error("invalid search parameters: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Failed to parse JSON: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
