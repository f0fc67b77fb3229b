use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Asset not found in run directory: {name}")]
    NotFound { name: String },

    #[error("Invalid asset name {name:?}: names must be plain file names")]
    InvalidAssetName { name: String },

    #[error("Fetch failed for {source_ref}: {reason}")]
    FetchFailed { source_ref: String, reason: String },

    #[error("Encoder {program} is not usable: {reason}")]
    EncoderUnavailable { program: PathBuf, reason: String },

    #[error("Encode job '{job}' failed: {reason}")]
    EncodeFailed { job: String, reason: String },

    #[error("Assembly cancelled")]
    Cancelled,

    #[error("Invalid segment manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AssemblyError {
    pub(crate) fn fetch(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        AssemblyError::FetchFailed {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(job: impl Into<String>, reason: impl Into<String>) -> Self {
        AssemblyError::EncodeFailed {
            job: job.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssemblyError>;
