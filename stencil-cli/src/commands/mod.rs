pub mod install;
pub mod merge;
pub mod show;
pub mod upgrade;

use std::path::Path;
use std::process::Command;

use anyhow::{Context as _, Result};
use colored::Colorize;
use git2::{Repository, Status, StatusOptions};

use stencil_core::{config, context, Context, SyncConfig};
use stencil_renderer::{SshCredentials, TeraRenderer};
use stencil_sync::{repo, MergeOutcome, Stencil, SyncError, SyncReport};

pub const CONFLICT_MESSAGE: &str =
    "Cannot merge upgrade automatically, please manually resolve the conflicts";

/// Repository configuration from `.stencil.yaml` at the work tree root.
fn load_config(repo: &Repository) -> Result<SyncConfig> {
    let root = repo.workdir().context("repository has no working tree")?;
    config::load_at(root).with_context(|| format!("failed to load config in {}", root.display()))
}

/// Open the repository containing `dir` and wire a Tera-backed engine to it.
pub fn open_stencil(dir: &Path, credentials: SshCredentials) -> Result<Stencil> {
    let repo = repo::open(dir)
        .with_context(|| format!("cannot open repository at {}", dir.display()))?;
    build(repo, credentials)
}

pub fn build(repo: Repository, credentials: SshCredentials) -> Result<Stencil> {
    let config = load_config(&repo)?;
    let renderer = TeraRenderer::with_credentials(credentials.clone());
    Ok(Stencil::new(repo, Box::new(renderer), config).with_credentials(credentials))
}

/// `key=value` pairs from repeated `--context` flags.
pub fn overrides(raw: &[String]) -> Result<Context> {
    context::parse_overrides(raw).context("invalid --context value")
}

pub fn print_report(verb: &str, source: &str, report: &SyncReport) {
    println!(
        "{} {verb} template '{source}' (template commit {})",
        "✓".green(),
        short(report.template_commit)
    );
    print_merge(&report.merge);
}

pub fn print_merge(outcome: &MergeOutcome) {
    match outcome {
        MergeOutcome::Merged { commit } => {
            println!("  merged as {}", short(*commit).bold());
        }
        MergeOutcome::UpToDate => println!("  already up to date"),
    }
}

pub fn short(oid: git2::Oid) -> String {
    let mut hex = oid.to_string();
    hex.truncate(7);
    hex
}

/// Map a sync failure to the process result; a merge conflict prints the
/// repository status and exits with code 1.
pub fn finish<T>(stencil: &Stencil, result: Result<T, SyncError>, what: &str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(SyncError::MergeConflict { .. }) => {
            print_status(stencil.repo());
            eprintln!("{}", CONFLICT_MESSAGE.red());
            std::process::exit(1);
        }
        Err(err) => Err(err).context(format!("{what} failed")),
    }
}

fn print_status(repo: &Repository) {
    let Some(root) = repo.workdir() else { return };
    match Command::new("git").arg("status").current_dir(root).status() {
        Ok(status) if status.success() => {}
        _ => print_status_fallback(repo),
    }
}

fn print_status_fallback(repo: &Repository) {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true);
    let statuses = match repo.statuses(Some(&mut opts)) {
        Ok(statuses) => statuses,
        Err(err) => {
            eprintln!("could not read repository status: {err}");
            return;
        }
    };
    println!("You have unmerged paths.");
    for entry in statuses.iter() {
        let path = entry.path().unwrap_or("<non-utf8 path>");
        let label = status_label(entry.status());
        println!("\t{label:<16}{path}");
    }
}

fn status_label(status: Status) -> &'static str {
    if status.is_conflicted() {
        "both modified:"
    } else if status.is_index_new() {
        "new file:"
    } else if status.is_index_deleted() || status.is_wt_deleted() {
        "deleted:"
    } else if status.is_wt_new() {
        "untracked:"
    } else {
        "modified:"
    }
}
