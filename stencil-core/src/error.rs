//! Error types for stencil-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while reading or writing the context document.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context document did not exist at the expected path.
    #[error("context document not found at {path}")]
    NotFound { path: PathBuf },

    /// Malformed JSON, or JSON that is not a flat object.
    #[error("failed to parse context document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document exists but carries no `_template` source locator.
    #[error("context document at {path} has no string `_template` entry")]
    MissingTemplate { path: PathBuf },

    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("context serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A `key=value` override could not be parsed.
    #[error("invalid context override '{0}'; expected key=value")]
    InvalidOverride(String),
}

/// All errors that can arise while loading `.stencil.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, including file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ContextError {
    ContextError::Io {
        path: path.into(),
        source,
    }
}
