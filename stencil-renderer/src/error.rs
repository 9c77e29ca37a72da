//! Error types for stencil-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from a rendering collaborator.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building the tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while reading the template or writing output.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    /// Cloning or checking out the template repository failed.
    #[error("template git error: {0}")]
    Git(#[from] git2::Error),

    /// The requested branch, tag or commit does not exist in the template.
    #[error("revision '{revision}' not found in template '{locator}'")]
    RevisionNotFound { locator: String, revision: String },

    /// The template root has no `stencil.json`.
    #[error("template manifest not found at {path}")]
    MissingManifest { path: PathBuf },

    /// `stencil.json` exists but is not a JSON object.
    #[error("invalid template manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The template root does not hold exactly one templated directory.
    #[error("template at {root} must contain exactly one templated directory, found {found:?}")]
    Layout { root: PathBuf, found: Vec<String> },

    /// Interactive prompt was cancelled or could not read the terminal.
    #[error("prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    /// Free-form failure raised by an out-of-tree collaborator.
    #[error("rendering aborted: {0}")]
    Aborted(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}
