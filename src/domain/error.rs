use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("session is read-only, refusing to {0}")]
    ReadOnly(String),
    #[error("malformed part {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl FixError {
    pub fn code(&self) -> &'static str {
        match self {
            FixError::NotFound(_) => "NOT_FOUND",
            FixError::Precondition(_) => "PRECONDITION",
            FixError::ReadOnly(_) => "READ_ONLY",
            FixError::Malformed { .. } => "MALFORMED",
            FixError::InvalidInput(_) => "INVALID_INPUT",
            FixError::Api { .. } => "API_ERROR",
            FixError::Io(_) => "IO",
            FixError::Json(_) => "JSON",
            FixError::Http(_) => "HTTP",
        }
    }

    pub fn malformed(path: &str, reason: impl Into<String>) -> Self {
        FixError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

pub type FixResult<T> = std::result::Result<T, FixError>;
