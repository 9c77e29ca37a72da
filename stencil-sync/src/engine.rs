//! The [`Stencil`] facade: install, upgrade, merge and inspect.
//!
//! # Install
//!
//! ```text
//! scoped worktree (stripped) → render → flatten → snapshot
//!   → parentless commit on the template branch → merge into target
//! ```
//!
//! # Upgrade
//!
//! ```text
//! resolve template branch (local, else remote) → load stored context
//!   → scoped worktree detached at the branch tip → render → flatten
//!   → snapshot → child commit on the template branch → merge into target
//! ```
//!
//! The template branch always advances before the merge is attempted, so a
//! failed merge can be retried with [`Stencil::merge`].

use std::path::{Path, PathBuf};

use git2::{Oid, Repository};

use stencil_core::{context, Context, SyncConfig};
use stencil_renderer::{RenderRequest, SshCredentials, TemplateRenderer};

use crate::branch::TemplateBranch;
use crate::error::SyncError;
use crate::layout;
use crate::merge::{self, MergeOutcome, MergeTarget};
use crate::repo;
use crate::workspace::ScopedWorkspace;

// ---------------------------------------------------------------------------
// Options / reports
// ---------------------------------------------------------------------------

/// Parameters for [`Stencil::install`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Template locator handed to the renderer.
    pub source: String,
    /// Template revision; the template's default branch when `None`.
    pub checkout: Option<String>,
    pub no_input: bool,
    /// Values that replace the template's defaults.
    pub overrides: Context,
}

/// Parameters for [`Stencil::upgrade`].
#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    /// Template revision; the template's default branch when `None`.
    pub checkout: Option<String>,
    /// Values that replace entries of the stored context.
    pub overrides: Context,
    /// Branch to merge into; HEAD when `None`.
    pub merge_target: Option<String>,
    /// Context document path relative to the repository root; the
    /// configured one when `None`.
    pub context_file: Option<PathBuf>,
    pub no_input: bool,
}

/// What an install or upgrade produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// New tip of the template branch.
    pub template_commit: Oid,
    pub merge: MergeOutcome,
}

/// Snapshot of the installed template, for display.
#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub branch: String,
    pub installed: bool,
    pub tip: Option<Oid>,
    pub source: Option<String>,
    pub checkout: Option<String>,
    pub context: Context,
}

// ---------------------------------------------------------------------------
// Stencil
// ---------------------------------------------------------------------------

/// Keeps a repository in sync with the template it was generated from.
pub struct Stencil {
    repo: Repository,
    renderer: Box<dyn TemplateRenderer>,
    config: SyncConfig,
    credentials: SshCredentials,
}

impl Stencil {
    pub fn new(repo: Repository, renderer: Box<dyn TemplateRenderer>, config: SyncConfig) -> Self {
        Self {
            repo,
            renderer,
            config,
            credentials: SshCredentials::default(),
        }
    }

    /// Credentials used when fetching the template branch from the remote.
    pub fn with_credentials(mut self, credentials: SshCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn template_branch(&self) -> TemplateBranch<'_> {
        TemplateBranch::new(&self.repo, &self.config.template_branch)
    }

    pub fn is_installed(&self) -> bool {
        self.template_branch().is_installed()
    }

    /// Render a template for the first time and merge it in.
    pub fn install(&self, options: &InstallOptions) -> Result<SyncReport, SyncError> {
        repo::ensure_clean_state(&self.repo)?;
        let branch = self.template_branch();
        if branch.is_installed() {
            return Err(SyncError::TemplateConflict {
                branch: branch.name().to_string(),
            });
        }
        tracing::info!(
            template = %options.source,
            checkout = ?options.checkout,
            "installing template"
        );

        let sig = repo::signature(&self.repo, &self.config.identity)?;
        let workspace = ScopedWorkspace::acquire(&self.repo, &self.config.workspace_name, true)?;
        let request = RenderRequest {
            source: &options.source,
            checkout: options.checkout.as_deref(),
            context: &options.overrides,
            no_input: options.no_input,
        };
        layout::render_into(&workspace, self.renderer.as_ref(), &request)?;
        let tree = workspace.snapshot(None)?;
        let template_commit = branch.create_root(tree, &sig)?;
        workspace.release()?;

        let message = format!("Installed template '{}'", options.source);
        let merge = merge::merge_branch_into(
            &self.repo,
            template_commit,
            &MergeTarget::Head,
            &message,
            &sig,
        )?;
        Ok(SyncReport {
            template_commit,
            merge,
        })
    }

    /// Re-render with the stored context and merge the difference in.
    pub fn upgrade(&self, options: &UpgradeOptions) -> Result<SyncReport, SyncError> {
        repo::ensure_clean_state(&self.repo)?;
        let branch = self.template_branch();
        let adopted = !branch.is_installed();
        let previous = branch.resolve_or_fetch(&self.config.remote, &self.credentials)?;

        let stored = match self.load_context(options.context_file.as_deref()) {
            Ok(stored) => stored,
            Err(err) => {
                // Leave no local branch behind for a consumer that was never set up.
                if adopted {
                    branch.forget()?;
                }
                return Err(err);
            }
        };
        let source = stored.template().unwrap_or_default().to_string();
        if !options.overrides.is_empty() {
            tracing::debug!(overrides = ?options.overrides, "applying context overrides");
        }
        let merged = Context::merge(&stored, &options.overrides);
        tracing::info!(
            template = %source,
            checkout = ?options.checkout,
            from = %previous,
            "upgrading template"
        );
        tracing::debug!(context = ?merged, "merged upgrade context");

        let sig = repo::signature(&self.repo, &self.config.identity)?;
        let workspace = ScopedWorkspace::acquire(&self.repo, &self.config.workspace_name, true)?;
        workspace.point_at(previous)?;
        let request = RenderRequest {
            source: &source,
            checkout: options.checkout.as_deref(),
            context: &merged,
            no_input: options.no_input,
        };
        layout::render_into(&workspace, self.renderer.as_ref(), &request)?;
        let tree = workspace.snapshot(Some(previous))?;
        let template_commit = branch.advance(tree, previous, &sig)?;
        workspace.release()?;

        let message = format!("Upgraded template '{source}'");
        let target = MergeTarget::from_option(options.merge_target.as_deref());
        let merge = merge::merge_branch_into(&self.repo, template_commit, &target, &message, &sig)?;
        Ok(SyncReport {
            template_commit,
            merge,
        })
    }

    /// Merge the current template branch tip without rendering.
    ///
    /// Recovers from a run that advanced the template branch but failed
    /// before or during the merge.
    pub fn merge(&self, target: &MergeTarget) -> Result<MergeOutcome, SyncError> {
        repo::ensure_clean_state(&self.repo)?;
        let branch = self.template_branch();
        let tip = branch.resolve_or_fetch(&self.config.remote, &self.credentials)?;
        let source = self
            .load_context(None)
            .ok()
            .and_then(|ctx| ctx.template().map(str::to_string))
            .unwrap_or_else(|| branch.name().to_string());
        let sig = repo::signature(&self.repo, &self.config.identity)?;
        let message = format!("Upgraded template '{source}'");
        merge::merge_branch_into(&self.repo, tip, target, &message, &sig)
    }

    /// Describe the installed template from the working tree's context
    /// document.
    pub fn show(&self, context_file: Option<&Path>) -> Result<TemplateInfo, SyncError> {
        let branch = self.template_branch();
        let context = self.load_context(context_file)?;
        Ok(TemplateInfo {
            branch: branch.name().to_string(),
            installed: branch.is_installed(),
            tip: branch.tip().ok(),
            source: context.template().map(str::to_string),
            checkout: context.checkout().map(str::to_string),
            context,
        })
    }

    fn workdir(&self) -> Result<&Path, SyncError> {
        self.repo.workdir().ok_or_else(|| SyncError::InvalidRepository {
            path: self.repo.path().to_path_buf(),
            reason: "repository has no working tree".to_string(),
        })
    }

    fn load_context(&self, context_file: Option<&Path>) -> Result<Context, SyncError> {
        let relative = context_file.unwrap_or(&self.config.context_file);
        Ok(context::load_installed_at(self.workdir()?, relative)?)
    }
}
