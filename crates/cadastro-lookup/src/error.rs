use cadastro_core::LookupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: HTTP {1}: {2}")]
    ApiError(String, u16, String),

    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;

impl From<SourceError> for LookupError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Http(e) => LookupError::Transport(e.to_string()),
            SourceError::ApiError(_, status, body) => LookupError::Status(status, body),
            SourceError::InvalidUrl(url, reason) => {
                LookupError::Transport(format!("invalid URL {url}: {reason}"))
            }
            SourceError::Parse(msg) => LookupError::Parse(msg),
        }
    }
}
