use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for graph conversion
pub type Result<T> = std::result::Result<T, GexifyError>;

/// Errors that can abort a conversion
#[derive(Error, Debug)]
pub enum GexifyError {
    #[error("malformed input at {context}: {message}")]
    MalformedInput { context: String, message: String },

    #[error("invalid graph document: {0}")]
    Document(serde_json::Error),

    #[error("failed to read input stream: {0}")]
    InputStream(serde_json::Error),

    #[error("channel {channel_id} references undeclared node {pub_key}")]
    DanglingEndpoint { channel_id: String, pub_key: String },

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl GexifyError {
    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            context: context.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the content of the input rather than by I/O.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput { .. } | Self::Document(_) | Self::DanglingEndpoint { .. }
        )
    }
}

impl From<serde_json::Error> for GexifyError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::InputStream(err)
        } else {
            Self::Document(err)
        }
    }
}
