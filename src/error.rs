use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),

    #[error("PNG optimization error: {0}")]
    PngOptimization(String),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid maximum dimension: {0}. Must be greater than zero")]
    InvalidDimension(u32),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Backup directory already exists: {0}")]
    BackupExists(PathBuf),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client ID pool is empty")]
    EmptyClientPool,

    #[error("Invalid attempt count: {0}. Must be at least 1")]
    InvalidAttempts(u32),

    #[error("Invalid delay range: minimum {0:?} exceeds maximum {1:?}")]
    InvalidDelayRange(std::time::Duration, std::time::Duration),

    #[error("Rewrite needs either a preset or both --pattern and --replacement")]
    MissingRewriteRule,
}

pub type Result<T> = std::result::Result<T, HoistError>;
