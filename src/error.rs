//! Error types for apkpack

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pack operations
pub type PackResult<T> = Result<T, PackError>;

/// Errors that can occur while converting packages
#[derive(Error, Debug)]
pub enum PackError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container could not be opened or read as a zip archive
    #[error("Bad archive {path}: {reason}")]
    BadArchive { path: String, reason: String },

    /// No package entry usable as an installable base
    #[error("No installable package found in {0}")]
    NoInstallablePackage(String),

    /// Input file extension is not a supported split-package format
    #[error("Unsupported package format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip writing error
    #[error("Compression error: {0}")]
    Compression(String),

    /// External tool failed to run or exited unsuccessfully
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// External tool exceeded its time budget
    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    /// zipalign failed
    #[error("Alignment failed: {0}")]
    Alignment(String),

    /// apksigner/jarsigner failed
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl PackError {
    /// Build a [`PackError::BadArchive`] from anything displayable
    pub fn bad_archive(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        PackError::BadArchive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`PackError::Tool`] error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        PackError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts the item it was raised for.
    ///
    /// Alignment and signing failures degrade the artifact instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PackError::Alignment(_) | PackError::Signing(_))
    }
}
