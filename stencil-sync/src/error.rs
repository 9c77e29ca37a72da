//! Error types for stencil-sync.

use std::path::PathBuf;

use git2::Oid;
use thiserror::Error;

use stencil_core::{ConfigError, ContextError};
use stencil_renderer::RenderError;

/// All errors that can arise from install / upgrade / merge.
#[derive(Debug, Error)]
pub enum SyncError {
    /// `install` on a repository that already has the template branch.
    #[error("template already installed (branch '{branch}' exists)")]
    TemplateConflict { branch: String },

    /// Nothing installed locally and no remote counterpart to fall back to.
    #[error("template could not be found (no branch '{branch}' locally or on the remote)")]
    TemplateNotFound { branch: String },

    /// A worktree of the same name is already registered.
    #[error(
        "worktree '{name}' already exists; if no other stencil run is active, \
         remove it with `git worktree prune` and `git branch -D {name}`"
    )]
    WorkspaceConflict { name: String },

    /// libgit2 refused to create the worktree.
    #[error("worktree '{name}' could not be initialized in path '{path}': {source}")]
    WorkspaceCreationFailed {
        name: String,
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// HEAD is unborn; there is no commit to root a worktree on.
    #[error("target repository is empty")]
    RepositoryEmpty,

    /// The repository is mid-merge, mid-rebase, etc.
    #[error("repository has an operation in progress ({state}); finish or abort it first")]
    OperationInProgress { state: String },

    /// Content conflicts between the template and the target branch. The
    /// repository is left in git's merge state for manual resolution.
    #[error(
        "cannot merge the template commit ({template}) into '{target}'; \
         resolve the conflicts manually and run `git commit` to finish the merge"
    )]
    MergeConflict {
        template: Oid,
        target: String,
        conflicts: Vec<PathBuf>,
    },

    /// The renderer did not produce exactly one top-level directory.
    #[error("unexpected file structure in temporary worktree {path}: {entries:?}")]
    UnexpectedRenderLayout { path: PathBuf, entries: Vec<String> },

    /// Path is not a usable (non-bare) git repository.
    #[error("{path} is not a valid repository path: {reason}")]
    InvalidRepository { path: PathBuf, reason: String },

    /// Merge analysis returned something the template branch can never produce.
    #[error("unsupported merge analysis result: {0}")]
    UnsupportedMergeAnalysis(String),

    /// Rendering collaborator failure, passed through untouched.
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("context error: {0}")]
    Context(#[from] ContextError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
