//! `stencil install`: render a template and merge it in for the first time.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use stencil_core::config;
use stencil_renderer::SshCredentials;
use stencil_sync::{repo, InstallOptions};

/// Arguments for `stencil install`.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Template locator: a local directory or a git URL.
    pub template: String,

    /// Template branch, tag or commit to render.
    #[arg(long)]
    pub checkout: Option<String>,

    /// First branch name when a new repository is initialized.
    #[arg(long)]
    pub initial_branch: Option<String>,

    /// Do not prompt for template variables.
    #[arg(long)]
    pub no_input: bool,

    /// Override a template variable (`key=value`, repeatable).
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,
}

impl InstallArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let identity = config::load_at(dir)
            .with_context(|| format!("failed to load config in {}", dir.display()))?
            .identity;
        let repo = repo::open_or_init(dir, self.initial_branch.as_deref(), &identity)
            .with_context(|| format!("cannot open or initialize repository at {}", dir.display()))?;
        let stencil = super::build(repo, SshCredentials::agent())?;

        let options = InstallOptions {
            source: self.template,
            checkout: self.checkout,
            no_input: self.no_input,
            overrides: super::overrides(&self.context)?,
        };
        let report = super::finish(&stencil, stencil.install(&options), "install")?;
        super::print_report("Installed", &options.source, &report);
        Ok(())
    }
}
