//! Context document: the flat key/value record of the template source and
//! the variables it was last rendered with.
//!
//! # Storage layout
//!
//! ```text
//! <repo root>/
//!   .stencil.json   { "_template": "<source locator>", "_checkout": "<rev>", ... }
//! ```
//!
//! The path is configurable and always relative to the repository root. The
//! document is produced by the template itself; the sync engine only reads it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, ContextError};

/// Key holding the template source locator.
pub const TEMPLATE_KEY: &str = "_template";

/// Key holding the revision the template was last rendered at.
pub const CHECKOUT_KEY: &str = "_checkout";

/// Flat key/value template context. Keys are kept sorted so serialized
/// documents are stable across renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow, override-priority union: every key in `overrides` replaces the
    /// stored value, keys absent from `overrides` keep theirs. Nested objects
    /// are replaced whole, never merged.
    pub fn merge(stored: &Context, overrides: &Context) -> Context {
        let mut merged = stored.clone();
        merged.extend(overrides.clone());
        merged
    }

    /// In-place variant of [`Context::merge`].
    pub fn extend(&mut self, overrides: Context) {
        self.0.extend(overrides.0);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The `_template` source locator, if present and a string.
    pub fn template(&self) -> Option<&str> {
        self.0.get(TEMPLATE_KEY).and_then(Value::as_str)
    }

    /// The `_checkout` revision, if present and a string.
    pub fn checkout(&self) -> Option<&str> {
        self.0.get(CHECKOUT_KEY).and_then(Value::as_str)
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Context {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the context document at `<root>/<relative>`.
///
/// Returns `ContextError::NotFound` if absent and `ContextError::Parse` (with
/// the path) if the file is not a JSON object.
pub fn load_at(root: &Path, relative: &Path) -> Result<Context, ContextError> {
    let path = root.join(relative);
    if !path.exists() {
        return Err(ContextError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|source| ContextError::Parse { path, source })
}

/// Like [`load_at`], but also requires a string `_template` entry.
pub fn load_installed_at(root: &Path, relative: &Path) -> Result<Context, ContextError> {
    let context = load_at(root, relative)?;
    if context.template().is_none() {
        return Err(ContextError::MissingTemplate {
            path: root.join(relative),
        });
    }
    Ok(context)
}

/// Atomically write the context document as pretty JSON.
///
/// Write flow: serialize → `<name>.tmp` sibling → `rename`.
pub fn save_at(root: &Path, relative: &Path, context: &Context) -> Result<(), ContextError> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut json = serde_json::to_string_pretty(context)?;
    json.push('\n');
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Parse a `key=value` override as passed on the command line.
///
/// The value is read as JSON when it parses (`count=3`, `flag=true`,
/// `tags=["a"]`) and as a plain string otherwise.
pub fn parse_override(raw: &str) -> Result<(String, Value), ContextError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(ContextError::InvalidOverride(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(ContextError::InvalidOverride(raw.to_string()));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Collect a list of `key=value` overrides into a [`Context`].
pub fn parse_overrides<S: AsRef<str>>(raw: &[S]) -> Result<Context, ContextError> {
    raw.iter().map(|r| parse_override(r.as_ref())).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
