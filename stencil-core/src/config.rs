//! Repository-level configuration for the sync engine.
//!
//! Defaults cover every field; a `.stencil.yaml` at the repository root may
//! override any subset of them:
//!
//! ```yaml
//! template_branch: template
//! workspace_name: templating
//! context_file: .stencil.json
//! remote: origin
//! identity:
//!   name: stencil
//!   email: stencil@localhost
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the optional per-repository config.
pub const CONFIG_FILE: &str = ".stencil.yaml";

/// Names and identity used by the sync engine. Passed explicitly into the
/// facade so independent instances never share state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Branch holding only rendered template history.
    pub template_branch: String,
    /// Name of the scoped worktree and of the branch it owns.
    pub workspace_name: String,
    /// Context document path, relative to the repository root.
    pub context_file: PathBuf,
    /// Remote consulted when the template branch only exists upstream.
    pub remote: String,
    /// Committer used when git has no `user.name` / `user.email`.
    pub identity: Identity,
}

/// Fallback commit identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "stencil".to_string(),
            email: "stencil@localhost".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            template_branch: "template".to_string(),
            workspace_name: "templating".to_string(),
            context_file: PathBuf::from(".stencil.json"),
            remote: "origin".to_string(),
            identity: Identity::default(),
        }
    }
}

/// Load `<root>/.stencil.yaml`, falling back to defaults when it is absent.
pub fn load_at(root: &Path) -> Result<SyncConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}
