use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Could not extract listings from {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    #[error("Persistence error for {path}: {message}")]
    Persistence { path: String, message: String },

    #[error("Email already subscribed: {email}")]
    DuplicateSubscriber { email: String },

    #[error("Invalid email format: {email}")]
    InvalidFormat { email: String },

    #[error("Monitor loop aborted: {message}")]
    FatalLoop { message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn fetch(url: impl Into<String>, message: impl ToString) -> Self {
        AppError::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn extraction(url: impl Into<String>, message: impl ToString) -> Self {
        AppError::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn delivery(recipient: impl Into<String>, message: impl ToString) -> Self {
        AppError::Delivery {
            recipient: recipient.into(),
            message: message.to_string(),
        }
    }

    pub fn persistence(path: &std::path::Path, message: impl ToString) -> Self {
        AppError::Persistence {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Errors that only cost the current cycle; the loop keeps running and
    /// the known-set stays as it was.
    pub fn is_recoverable_fetch(&self) -> bool {
        matches!(
            self,
            AppError::Fetch { .. } | AppError::Extraction { .. } | AppError::Http(_)
        )
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
