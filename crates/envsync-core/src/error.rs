//! Error types for envsync-core

/// Result type for envsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in envsync-core operations
///
/// Path lookups and writes never fail with an error; a miss is reported as
/// `None` or `false` by the path functions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse sync configuration: {message}")]
    ConfigParse { message: String },
}

impl Error {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }
}
