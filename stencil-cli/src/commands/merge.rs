//! `stencil merge`: merge the template branch as it stands, no rendering.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use stencil_renderer::SshCredentials;
use stencil_sync::MergeTarget;

/// Arguments for `stencil merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Merge into this branch instead of HEAD, creating it if needed.
    #[arg(long)]
    pub merge_target: Option<String>,
}

impl MergeArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let stencil = super::open_stencil(dir, SshCredentials::agent())?;
        let target = MergeTarget::from_option(self.merge_target.as_deref());
        let outcome = super::finish(&stencil, stencil.merge(&target), "merge")?;
        super::print_merge(&outcome);
        Ok(())
    }
}
