//! Template source resolution: local directories and git checkouts.

use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{ObjectType, Repository};
use tempfile::TempDir;

use crate::credentials::SshCredentials;
use crate::error::{io_err, RenderError};

/// A template tree on local disk, ready to be rendered.
///
/// Clones live in a temporary directory owned by this value and are removed
/// when it is dropped.
#[derive(Debug)]
pub struct TemplateSource {
    root: PathBuf,
    _clone: Option<TempDir>,
}

impl TemplateSource {
    /// Resolve `locator` at `checkout`.
    ///
    /// - Local directory, no checkout: used in place, uncommitted edits included.
    /// - Local repository with a checkout, or any non-local locator: cloned
    ///   into a temporary directory and the revision checked out detached.
    pub fn fetch(
        locator: &str,
        checkout: Option<&str>,
        credentials: &SshCredentials,
    ) -> Result<Self, RenderError> {
        let local = Path::new(locator);
        if local.is_dir() && checkout.is_none() {
            tracing::debug!(template = %locator, "using local template directory in place");
            return Ok(Self {
                root: local.to_path_buf(),
                _clone: None,
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("stencil-template-")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        tracing::debug!(template = %locator, dest = %dir.path().display(), "cloning template");

        let config = git2::Config::open_default().ok();
        let mut builder = RepoBuilder::new();
        builder.fetch_options(credentials.fetch_options(config));
        let repo = builder.clone(locator, dir.path())?;

        if let Some(revision) = checkout {
            checkout_revision(&repo, locator, revision)?;
        }

        Ok(Self {
            root: dir.path().to_path_buf(),
            _clone: Some(dir),
        })
    }

    /// Root directory of the template (where `stencil.json` lives).
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Check out `revision` (local branch, remote branch, tag or commit) detached.
fn checkout_revision(repo: &Repository, locator: &str, revision: &str) -> Result<(), RenderError> {
    let candidates = [revision.to_string(), format!("origin/{revision}")];
    let object = candidates
        .iter()
        .find_map(|spec| repo.revparse_single(spec).ok())
        .ok_or_else(|| RenderError::RevisionNotFound {
            locator: locator.to_string(),
            revision: revision.to_string(),
        })?;
    let commit = object.peel(ObjectType::Commit)?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(&commit, Some(&mut checkout))?;
    repo.set_head_detached(commit.id())?;
    tracing::debug!(revision, commit = %commit.id(), "checked out template revision");
    Ok(())
}
