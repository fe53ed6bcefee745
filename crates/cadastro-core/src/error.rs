use std::time::Duration;

use thiserror::Error;

use crate::form::FieldErrors;

/// All errors that can occur in cadastro-core.
#[derive(Debug, Error)]
pub enum CadastroError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Failure of a single person lookup.
///
/// Never surfaces past the search controller; it is reported to the
/// diagnostic sink and the session degrades to "no candidates".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, CadastroError>;
