use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Spotify rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("Spotify API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task error: {0}")]
    Task(String),
}

impl AppError {
    /// Errors worth another attempt against the upstream service.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::RateLimited { .. } => true,
            AppError::Upstream { status, .. } => *status >= 500,
            AppError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
