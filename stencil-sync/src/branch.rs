//! The template branch: a linear history of pure template renders.

use git2::{BranchType, ErrorCode, Oid, Repository, Signature};

use stencil_renderer::SshCredentials;

use crate::error::SyncError;

pub const INSTALL_MESSAGE: &str = "Prepared template installation";
pub const UPGRADE_MESSAGE: &str = "Prepared template upgrade";

/// Handle on the template branch of one repository.
#[derive(Clone, Copy)]
pub struct TemplateBranch<'r> {
    repo: &'r Repository,
    name: &'r str,
}

impl<'r> TemplateBranch<'r> {
    pub fn new(repo: &'r Repository, name: &'r str) -> Self {
        Self { repo, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    fn refname(&self) -> String {
        format!("refs/heads/{}", self.name)
    }

    /// Whether the local branch exists.
    pub fn is_installed(&self) -> bool {
        self.repo.find_branch(self.name, BranchType::Local).is_ok()
    }

    /// Commit at the tip of the local branch.
    pub fn tip(&self) -> Result<Oid, SyncError> {
        match self.repo.find_branch(self.name, BranchType::Local) {
            Ok(branch) => Ok(branch.get().peel_to_commit()?.id()),
            Err(e) if e.code() == ErrorCode::NotFound => Err(SyncError::TemplateNotFound {
                branch: self.name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the branch at a parentless commit of `tree`.
    pub fn create_root(&self, tree: Oid, sig: &Signature<'_>) -> Result<Oid, SyncError> {
        if self.is_installed() {
            return Err(SyncError::TemplateConflict {
                branch: self.name.to_string(),
            });
        }
        let tree = self.repo.find_tree(tree)?;
        let oid = self.repo.commit(None, sig, sig, INSTALL_MESSAGE, &tree, &[])?;
        self.repo.branch(self.name, &self.repo.find_commit(oid)?, false)?;
        tracing::info!(branch = self.name, commit = %oid, "created template branch");
        Ok(oid)
    }

    /// Append a commit of `tree` on top of `parent` and move the branch there.
    ///
    /// The ref update only succeeds if the branch still points at `parent`.
    pub fn advance(&self, tree: Oid, parent: Oid, sig: &Signature<'_>) -> Result<Oid, SyncError> {
        let tree = self.repo.find_tree(tree)?;
        let parent_commit = self.repo.find_commit(parent)?;
        let oid = self
            .repo
            .commit(None, sig, sig, UPGRADE_MESSAGE, &tree, &[&parent_commit])?;
        self.repo.reference_matching(
            &self.refname(),
            oid,
            true,
            parent,
            &format!("commit: {UPGRADE_MESSAGE}"),
        )?;
        tracing::info!(
            branch = self.name,
            commit = %oid,
            parent = %parent,
            "advanced template branch"
        );
        Ok(oid)
    }

    /// Tip of the local branch, or of `<remote>/<branch>` after a fetch.
    ///
    /// When only the remote has the branch, a local branch is created at the
    /// remote tip. The fetch is best effort: an unreachable remote falls back
    /// to whatever tracking ref is already present.
    pub fn resolve_or_fetch(
        &self,
        remote: &str,
        credentials: &SshCredentials,
    ) -> Result<Oid, SyncError> {
        if self.is_installed() {
            return self.tip();
        }
        tracing::info!(
            branch = self.name,
            remote,
            "template branch not found locally, trying remote"
        );
        let tracking = format!("refs/remotes/{remote}/{}", self.name);
        self.fetch(remote, &tracking, credentials)?;

        let oid = match self.repo.refname_to_id(&tracking) {
            Ok(oid) => oid,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(SyncError::TemplateNotFound {
                    branch: self.name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let commit = self.repo.find_commit(oid)?;
        let mut local = self.repo.branch(self.name, &commit, false)?;
        let upstream = format!("{remote}/{}", self.name);
        if let Err(e) = local.set_upstream(Some(&upstream)) {
            tracing::debug!(error = %e, "could not set upstream of template branch");
        }
        tracing::info!(branch = self.name, commit = %oid, "created template branch from remote");
        Ok(oid)
    }

    /// Delete the local branch, leaving any remote-tracking ref alone.
    pub fn forget(&self) -> Result<(), SyncError> {
        match self.repo.find_branch(self.name, BranchType::Local) {
            Ok(mut branch) => {
                branch.delete()?;
                tracing::debug!(branch = self.name, "deleted local template branch");
                Ok(())
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch(
        &self,
        remote: &str,
        tracking: &str,
        credentials: &SshCredentials,
    ) -> Result<(), SyncError> {
        let mut handle = match self.repo.find_remote(remote) {
            Ok(handle) => handle,
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::debug!(remote, "no such remote; skipping fetch");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let refspec = format!("+refs/heads/{}:{tracking}", self.name);
        let mut options = credentials.fetch_options(self.repo.config().ok());
        if let Err(e) = handle.fetch(&[refspec.as_str()], Some(&mut options), None) {
            tracing::warn!(remote, error = %e, "fetch failed; using existing remote-tracking refs");
        }
        Ok(())
    }
}
