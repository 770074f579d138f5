//! Error Handling
//!
//! Error type definitions used in gh-commander

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gh-commander
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(#[from] octocrab::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::XlsxError),

    #[error("Spreadsheet write error: {0}")]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot write '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Label validation error: {0}")]
    LabelValidation(String),

    #[error("Invalid label color '{color}' for label '{name}' (expected 6 hex digits, with or without leading #)")]
    InvalidLabelColor { name: String, color: String },

    #[error("No usable GitHub credentials for '{0}'! Set GITHUB_TOKEN or add a ~/.netrc entry.")]
    Authentication(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Invalid repository '{0}' (expected 'owner/repo' or a bare repo name)")]
    InvalidRepositorySpec(String),

    #[error("Unknown dataset format '{0}'")]
    UnknownFormat(String),

    #[error("Cannot infer dataset format for '{0}'; pass an explicit --format")]
    UnresolvedFormat(String),

    #[error("Format '{0}' does not support decoding")]
    DecodeUnsupported(&'static str),

    #[error("Dataset error: {0}")]
    Dataset(String),
}

impl Error {
    /// Create a new usage error
    pub fn usage<S: Into<String>>(message: S) -> Self {
        Error::Usage(message.into())
    }

    /// Create a new label validation error
    pub fn label_validation<S: Into<String>>(message: S) -> Self {
        Error::LabelValidation(message.into())
    }

    /// Whether this error aborts the whole invocation
    ///
    /// Everything else is degraded to inline per-item reporting so a
    /// multi-repository batch makes maximum forward progress.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Usage(_)
                | Error::LabelValidation(_)
                | Error::InvalidLabelColor { .. }
                | Error::Authentication(_)
                | Error::UnknownFormat(_)
                | Error::UnresolvedFormat(_)
                | Error::Dataset(_)
                | Error::WriteFile { .. }
        )
    }
}
