//! `stencil show`: installed template, revision and context.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use stencil_renderer::SshCredentials;
use stencil_sync::TemplateInfo;

/// Arguments for `stencil show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Context document, relative to the repository root.
    #[arg(long)]
    pub context_file: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let stencil = super::open_stencil(dir, SshCredentials::agent())?;
        let info = stencil
            .show(self.context_file.as_deref())
            .context("failed to read installed template; run `stencil install` first")?;
        if self.json {
            return print_json(info);
        }
        print_table(info);
        Ok(())
    }
}

#[derive(Serialize)]
struct ShowJson {
    template: Option<String>,
    checkout: Option<String>,
    branch: String,
    installed: bool,
    tip: Option<String>,
    context: stencil_core::Context,
}

#[derive(Tabled)]
struct ContextRow {
    #[tabled(rename = "variable")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
}

fn print_json(info: TemplateInfo) -> Result<()> {
    let payload = ShowJson {
        template: info.source,
        checkout: info.checkout,
        branch: info.branch,
        installed: info.installed,
        tip: info.tip.map(|oid| oid.to_string()),
        context: info.context,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize template JSON")?
    );
    Ok(())
}

fn print_table(info: TemplateInfo) {
    println!("{} {}", "template:".bold(), info.source.as_deref().unwrap_or("-"));
    println!(
        "{} {}",
        "checkout:".bold(),
        info.checkout.as_deref().unwrap_or("(default branch)")
    );
    let branch_state = match info.tip {
        Some(tip) => super::short(tip).as_str().normal(),
        None if info.installed => "unreadable".yellow(),
        None => "missing".red(),
    };
    println!("{} {} @ {}", "branch:".bold(), info.branch, branch_state);

    let rows: Vec<ContextRow> = info
        .context
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| ContextRow {
            key: key.clone(),
            value: match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
        .collect();
    if rows.is_empty() {
        println!("No template variables recorded.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
