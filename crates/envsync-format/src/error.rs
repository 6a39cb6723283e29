//! Error types for envsync-format

use std::fmt;

/// Result type for envsync-format operations
pub type Result<T> = std::result::Result<T, FormatError>;

/// Tag distinguishing unreadable input from a failed formatting pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    FormatError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::FormatError => "FORMAT_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PARSE_HINTS: &[&str] = &[
    "Check that the file is valid YAML",
    "Exclude the file from outputFormat patterns to skip formatting it",
];

const FORMAT_HINTS: &[&str] = &[
    "Exclude the file from outputFormat patterns to skip formatting it",
    "Check the keyOrders, arraySort and quoteValues patterns and paths matching this file",
];

/// Errors raised while formatting a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("[{code}] Failed to parse {file_path}: {message}", code = ErrorCode::ParseError)]
    Parse { file_path: String, message: String },

    #[error("[{code}] Failed to format {file_path}: {message}", code = ErrorCode::FormatError)]
    Format { file_path: String, message: String },
}

impl FormatError {
    pub fn parse(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file_path: file_path.into(),
            message: message.into(),
        }
    }

    pub fn format(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            file_path: file_path.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::Format { .. } => ErrorCode::FormatError,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Self::Parse { file_path, .. } | Self::Format { file_path, .. } => file_path,
        }
    }

    /// Remediation steps to show alongside the error.
    pub fn hints(&self) -> &'static [&'static str] {
        match self.code() {
            ErrorCode::ParseError => PARSE_HINTS,
            ErrorCode::FormatError => FORMAT_HINTS,
        }
    }
}
