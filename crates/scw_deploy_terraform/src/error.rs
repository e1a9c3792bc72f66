use std::path::PathBuf;

use scw_deploy_core::contract::ValidationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerateError>;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid terraform document '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported terraform document '{}': {source}", .path.display())]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("dependency materialization failed: {0}")]
    Dependencies(String),
}

impl GenerateError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
