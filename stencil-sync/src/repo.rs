//! Opening, initializing and inspecting the consumer repository.

use std::path::Path;

use git2::{ErrorCode, Repository, RepositoryInitOptions, RepositoryState, Signature};

use stencil_core::Identity;

use crate::error::{io_err, SyncError};

/// Message of the empty commit created by [`open_or_init`].
pub const INIT_MESSAGE: &str = "Initialized repository";

/// Discover the repository containing `path`.
pub fn open(path: &Path) -> Result<Repository, SyncError> {
    let repo = Repository::discover(path).map_err(|e| SyncError::InvalidRepository {
        path: path.to_path_buf(),
        reason: e.message().to_string(),
    })?;
    ensure_workdir(&repo, path)?;
    Ok(repo)
}

/// Discover the repository containing `path`, or initialize one there.
///
/// A fresh repository gets an empty initial commit so a worktree can be
/// rooted on it. `initial_branch` names the first branch; git's default
/// applies otherwise.
pub fn open_or_init(
    path: &Path,
    initial_branch: Option<&str>,
    identity: &Identity,
) -> Result<Repository, SyncError> {
    if path.exists() {
        match Repository::discover(path) {
            Ok(repo) => {
                ensure_workdir(&repo, path)?;
                return Ok(repo);
            }
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => {
                return Err(SyncError::InvalidRepository {
                    path: path.to_path_buf(),
                    reason: e.message().to_string(),
                })
            }
        }
    }

    std::fs::create_dir_all(path).map_err(|e| io_err(path, e))?;
    let mut opts = RepositoryInitOptions::new();
    if let Some(branch) = initial_branch {
        opts.initial_head(branch);
    }
    let repo = Repository::init_opts(path, &opts)?;
    {
        let sig = signature(&repo, identity)?;
        let tree = repo.find_tree(repo.index()?.write_tree()?)?;
        repo.commit(Some("HEAD"), &sig, &sig, INIT_MESSAGE, &tree, &[])?;
    }
    tracing::info!(path = %path.display(), "initialized new repository");
    Ok(repo)
}

/// The repository's configured identity, or `identity` when git has none.
pub fn signature(repo: &Repository, identity: &Identity) -> Result<Signature<'static>, SyncError> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now(&identity.name, &identity.email)?),
    }
}

/// Fail unless no merge / rebase / cherry-pick is in progress.
pub fn ensure_clean_state(repo: &Repository) -> Result<(), SyncError> {
    match repo.state() {
        RepositoryState::Clean => Ok(()),
        other => Err(SyncError::OperationInProgress {
            state: format!("{other:?}"),
        }),
    }
}

fn ensure_workdir(repo: &Repository, path: &Path) -> Result<(), SyncError> {
    if repo.is_bare() {
        return Err(SyncError::InvalidRepository {
            path: path.to_path_buf(),
            reason: "bare repositories have no working tree".to_string(),
        });
    }
    Ok(())
}
