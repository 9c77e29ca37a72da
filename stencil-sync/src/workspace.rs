//! Scoped temporary worktree: [`ScopedWorkspace`].
//!
//! Each install / upgrade renders into a throwaway git worktree of the
//! consumer repository, created under a fresh temporary directory. The
//! worktree registration, its checkout and the branch libgit2 creates for it
//! (named after the worktree) are removed again when the workspace is
//! released, whether the run succeeded or not.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{BranchType, ErrorCode, IndexAddOption, Oid, Repository, WorktreePruneOptions};
use tempfile::TempDir;

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Cleanup guard
// ---------------------------------------------------------------------------

/// Owns everything that has to be torn down; lives from the moment the
/// worktree exists, so a failure anywhere after that still cleans up.
struct WorktreeGuard<'r> {
    upstream: &'r Repository,
    name: String,
    tmp: Option<TempDir>,
    // False when a branch called `name` predates the workspace.
    owns_branch: bool,
    released: bool,
}

impl WorktreeGuard<'_> {
    fn release(&mut self) -> Result<(), SyncError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let mut first_err: Option<SyncError> = None;

        if let Some(tmp) = self.tmp.take() {
            let path = tmp.path().to_path_buf();
            if let Err(e) = tmp.close() {
                first_err.get_or_insert(io_err(path, e));
            }
        }

        match self.upstream.find_worktree(&self.name) {
            Ok(worktree) => {
                let mut opts = WorktreePruneOptions::new();
                opts.valid(true);
                if let Err(e) = worktree.prune(Some(&mut opts)) {
                    first_err.get_or_insert(e.into());
                }
            }
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => {
                first_err.get_or_insert(e.into());
            }
        }

        match self.upstream.find_branch(&self.name, BranchType::Local) {
            Ok(_) if !self.owns_branch => {}
            Ok(mut branch) => {
                if let Err(e) = branch.delete() {
                    first_err.get_or_insert(e.into());
                }
            }
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => {
                first_err.get_or_insert(e.into());
            }
        }

        tracing::debug!(workspace = %self.name, "released scoped workspace");
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for WorktreeGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(
                workspace = %self.name,
                error = %err,
                "failed to clean up scoped workspace"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// ScopedWorkspace
// ---------------------------------------------------------------------------

/// A temporary worktree of the consumer repository.
///
/// Dropping the value cleans up; call [`ScopedWorkspace::release`] instead
/// to observe cleanup failures.
pub struct ScopedWorkspace<'r> {
    // Declared first so the handle is closed before the guard deletes files.
    repo: Repository,
    path: PathBuf,
    guard: WorktreeGuard<'r>,
}

impl<'r> ScopedWorkspace<'r> {
    /// Create worktree `name` rooted on the upstream HEAD.
    ///
    /// With `strip_contents` every top-level entry of HEAD's tree is removed
    /// from the checkout, leaving only the `.git` link file.
    pub fn acquire(
        upstream: &'r Repository,
        name: &str,
        strip_contents: bool,
    ) -> Result<Self, SyncError> {
        if worktree_exists(upstream, name)? {
            return Err(SyncError::WorkspaceConflict {
                name: name.to_string(),
            });
        }
        match upstream.head() {
            Ok(_) => {}
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                return Err(SyncError::RepositoryEmpty);
            }
            Err(e) => return Err(e.into()),
        }

        let tmp = tempfile::Builder::new()
            .prefix("stencil-")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        let path = tmp.path().join(name);
        let owns_branch = upstream.find_branch(name, BranchType::Local).is_err();

        let worktree = match upstream.worktree(name, &path, None) {
            Ok(worktree) => worktree,
            Err(source) => {
                // libgit2 may have left its own branch behind.
                drop(WorktreeGuard {
                    upstream,
                    name: name.to_string(),
                    tmp: Some(tmp),
                    owns_branch,
                    released: false,
                });
                return Err(SyncError::WorkspaceCreationFailed {
                    name: name.to_string(),
                    path,
                    source,
                });
            }
        };
        let guard = WorktreeGuard {
            upstream,
            name: name.to_string(),
            tmp: Some(tmp),
            owns_branch,
            released: false,
        };
        let repo = Repository::open_from_worktree(&worktree)?;
        tracing::debug!(workspace = name, path = %path.display(), "created scoped workspace");

        if strip_contents {
            strip(&repo, &path)?;
        }
        Ok(Self { repo, path, guard })
    }

    /// Root of the worktree checkout.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repository handle opened on the worktree.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Detach the worktree HEAD onto `commit` without touching the files.
    pub fn point_at(&self, commit: Oid) -> Result<(), SyncError> {
        self.repo.set_head_detached(commit)?;
        Ok(())
    }

    /// Stage the checkout exactly as it is on disk and write it as a tree.
    ///
    /// `base` seeds the index with that commit's tree first, so files the
    /// render no longer produces show up as deletions.
    pub fn snapshot(&self, base: Option<Oid>) -> Result<Oid, SyncError> {
        let mut index = self.repo.index()?;
        match base {
            Some(commit) => index.read_tree(&self.repo.find_commit(commit)?.tree()?)?,
            None => index.clear()?,
        }
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        Ok(index.write_tree()?)
    }

    /// Tear the workspace down, reporting the first cleanup failure.
    pub fn release(self) -> Result<(), SyncError> {
        let ScopedWorkspace {
            repo, mut guard, ..
        } = self;
        drop(repo);
        guard.release()
    }
}

fn worktree_exists(upstream: &Repository, name: &str) -> Result<bool, SyncError> {
    let names = upstream.worktrees()?;
    let exists = names.iter().flatten().any(|existing| existing == name);
    Ok(exists)
}

fn strip(repo: &Repository, root: &Path) -> Result<(), SyncError> {
    let tree = repo.head()?.peel_to_tree()?;
    for entry in tree.iter() {
        let Some(name) = entry.name() else { continue };
        let target = root.join(name);
        let meta = match fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(io_err(&target, e)),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        removed.map_err(|e| io_err(&target, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
