//! Stencil: keep a repository in sync with the template it came from.
//!
//! # Usage
//!
//! ```text
//! stencil [-C <dir>] [--verbose] install <template> [--checkout <rev>] [--initial-branch <name>]
//!                                        [--no-input] [--context key=value ...]
//! stencil [-C <dir>] upgrade [--checkout <rev>] [--merge-target <branch>] [--context-file <path>]
//!                            [--no-input] [--context key=value ...]
//!                            [--ssh-private-key <path>] [--ssh-public-key <path>]
//!                            [--ssh-passphrase <p>]
//! stencil [-C <dir>] merge [--merge-target <branch>]
//! stencil [-C <dir>] show [--context-file <path>] [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{install::InstallArgs, merge::MergeArgs, show::ShowArgs, upgrade::UpgradeArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stencil",
    version,
    about = "Install project templates and merge their upgrades through git",
    long_about = None,
)]
struct Cli {
    /// Run as if started in <dir>.
    #[arg(short = 'C', long = "directory", global = true, default_value = ".")]
    directory: PathBuf,

    /// Log debug output to stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template into a new or existing repository.
    Install(InstallArgs),

    /// Re-render the installed template and merge the changes.
    Upgrade(UpgradeArgs),

    /// Merge the current template branch without rendering.
    Merge(MergeArgs),

    /// Show the installed template and its context.
    Show(ShowArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let dir = cli.directory;
    match cli.command {
        Commands::Install(args) => args.run(&dir),
        Commands::Upgrade(args) => args.run(&dir),
        Commands::Merge(args) => args.run(&dir),
        Commands::Show(args) => args.run(&dir),
    }
}
