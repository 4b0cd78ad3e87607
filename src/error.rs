use thiserror::Error;

/// Errors that can occur outside of settings decoding
///
/// Decoding a settings object never fails; these cover malformed JSON text,
/// cache storage and bad command line input.
#[derive(Error, Debug)]
pub enum ExperienceError {
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cache I/O failed: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ExperienceError>;
