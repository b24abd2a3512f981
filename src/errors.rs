use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Http(reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
    #[error("required columns missing from input: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("places service returned {status}: {message}")]
    Places { status: String, message: String },
    #[error("content generation failed: {0}")]
    Generation(String),
    #[error("model `{0}` is not available")]
    ModelUnavailable(String),
}

impl AppError {
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::MissingColumns(_))
    }
}

// Request URLs carry the Places API key as a query parameter.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Http(err.without_url())
    }
}
