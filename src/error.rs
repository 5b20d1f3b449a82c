// Camwatch Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamwatchError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Camera not found: {0}")]
    CameraNotFound(i64),

    #[error("Invalid camera status: {0}")]
    InvalidStatus(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot create camera '{0}' from a partial update")]
    IncompleteUpsert(String),

    #[error("{failed} of {total} inventory writes failed (first: {first})")]
    PartialApply {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for CamwatchError {
    fn from(err: anyhow::Error) -> Self {
        CamwatchError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CamwatchError>;
