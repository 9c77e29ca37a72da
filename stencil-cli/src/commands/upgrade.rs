//! `stencil upgrade`: re-render the installed template and merge the result.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use stencil_renderer::SshCredentials;
use stencil_sync::UpgradeOptions;

/// Arguments for `stencil upgrade`.
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Template branch, tag or commit to render (default branch if omitted).
    #[arg(long)]
    pub checkout: Option<String>,

    /// Merge into this branch instead of HEAD, creating it if needed.
    #[arg(long)]
    pub merge_target: Option<String>,

    /// Context document, relative to the repository root.
    #[arg(long)]
    pub context_file: Option<PathBuf>,

    /// Do not prompt for template variables.
    #[arg(long)]
    pub no_input: bool,

    /// Override a stored template variable (`key=value`, repeatable).
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    #[command(flatten)]
    pub ssh: SshArgs,
}

/// SSH key material for fetching the template branch and cloning templates.
#[derive(Args, Debug, Default)]
pub struct SshArgs {
    /// Private key to authenticate with instead of the SSH agent.
    #[arg(long, env = "STENCIL_SSH_PRIVATE_KEY")]
    pub ssh_private_key: Option<PathBuf>,

    /// Public key matching --ssh-private-key.
    #[arg(long, env = "STENCIL_SSH_PUBLIC_KEY", requires = "ssh_private_key")]
    pub ssh_public_key: Option<PathBuf>,

    /// Passphrase of --ssh-private-key.
    #[arg(
        long,
        env = "STENCIL_SSH_PASSPHRASE",
        hide_env_values = true,
        requires = "ssh_private_key"
    )]
    pub ssh_passphrase: Option<String>,
}

impl SshArgs {
    pub fn credentials(self) -> SshCredentials {
        match self.ssh_private_key {
            Some(private) => SshCredentials::key_pair(
                private,
                self.ssh_public_key.as_deref(),
                self.ssh_passphrase,
            ),
            None => SshCredentials::agent(),
        }
    }
}

impl UpgradeArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let stencil = super::open_stencil(dir, self.ssh.credentials())?;
        let options = UpgradeOptions {
            checkout: self.checkout,
            overrides: super::overrides(&self.context)?,
            merge_target: self.merge_target,
            context_file: self.context_file,
            no_input: self.no_input,
        };
        let report = super::finish(&stencil, stencil.upgrade(&options), "upgrade")?;
        let source = stencil
            .show(options.context_file.as_deref())
            .ok()
            .and_then(|info| info.source)
            .unwrap_or_default();
        super::print_report("Upgraded", &source, &report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_private_key_means_agent() {
        assert_eq!(SshArgs::default().credentials(), SshCredentials::agent());
    }

    #[test]
    fn private_key_builds_key_pair() {
        let args = SshArgs {
            ssh_private_key: Some(PathBuf::from("/keys/id_ed25519")),
            ssh_public_key: Some(PathBuf::from("/keys/id_ed25519.pub")),
            ssh_passphrase: Some("secret".to_string()),
        };
        let creds = args.credentials();
        assert_eq!(creds.private_key, Some(PathBuf::from("/keys/id_ed25519")));
        assert_eq!(creds.public_key, Some(PathBuf::from("/keys/id_ed25519.pub")));
        assert_eq!(creds.passphrase.as_deref(), Some("secret"));
    }
}
