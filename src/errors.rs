use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to resolve required path: {0}")]
    Path(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("pdf extraction failed: {0}")]
    Pdf(String),
    #[error("listing integrity violated: {0}")]
    Integrity(String),
    #[error("invalid operator input: {0}")]
    OperatorInput(String),
    #[error("places service error: {0}")]
    Places(String),
    #[error("{0}")]
    Config(String),
}
