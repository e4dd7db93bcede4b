//! Error types shared by every panel-core module

use std::path::Path;
use thiserror::Error;

/// Errors raised while loading images, laying out panels or exporting pages
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of range for {len} images")]
    OutOfRange { index: i64, len: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Record {row} is missing field '{field}'")]
    MissingField { row: usize, field: String },

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rendering error: {0}")]
    Render(String),
}

pub type PanelResult<T> = Result<T, PanelError>;

impl PanelError {
    pub fn missing_resource(path: &Path) -> Self {
        Self::NotFound(format!("file not found: {}", path.display()))
    }

    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format(message.into())
    }

    pub fn parse<F: Into<String>, S: Into<String>>(file: F, message: S) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render(message.into())
    }
}

impl From<serde_json::Error> for PanelError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse("json", err.to_string())
    }
}
