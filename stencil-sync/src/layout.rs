//! Rendering into a workspace and flattening the result.
//!
//! A renderer produces `<workspace>/<project>/...`; the template branch
//! stores the contents of `<project>` at the root of its tree.

use std::fs;
use std::path::{Path, PathBuf};

use stencil_renderer::{RenderRequest, TemplateRenderer};

use crate::error::{io_err, SyncError};
use crate::workspace::ScopedWorkspace;

const GIT_LINK: &str = ".git";

/// Render `request` into the workspace and hoist the single produced
/// directory's contents to the workspace root.
pub fn render_into(
    workspace: &ScopedWorkspace<'_>,
    renderer: &dyn TemplateRenderer,
    request: &RenderRequest<'_>,
) -> Result<(), SyncError> {
    renderer.render(request, workspace.path())?;
    flatten(workspace.path())
}

/// Move the children of the only non-`.git` entry of `root` up into `root`.
///
/// Fails with [`SyncError::UnexpectedRenderLayout`] before touching anything
/// unless exactly one such entry exists and it is a directory.
pub fn flatten(root: &Path) -> Result<(), SyncError> {
    let entries = list(root)?;
    let rendered = match entries.as_slice() {
        [only] if root.join(only).is_dir() => root.join(only),
        _ => {
            return Err(SyncError::UnexpectedRenderLayout {
                path: root.to_path_buf(),
                entries,
            })
        }
    };

    let children = list_all(&rendered)?;
    let own_name = entries[0].as_str();
    // A child named like its parent would collide with the parent itself.
    let source_dir = if children.iter().any(|c| c == own_name) {
        let staging = staging_dir(root, &children);
        fs::rename(&rendered, &staging).map_err(|e| io_err(&rendered, e))?;
        staging
    } else {
        rendered
    };

    for child in &children {
        let from = source_dir.join(child);
        fs::rename(&from, root.join(child)).map_err(|e| io_err(&from, e))?;
    }
    fs::remove_dir(&source_dir).map_err(|e| io_err(&source_dir, e))?;
    tracing::debug!(root = %root.display(), moved = children.len(), "flattened rendered output");
    Ok(())
}

fn staging_dir(root: &Path, taken: &[String]) -> PathBuf {
    let mut n = 0usize;
    loop {
        let name = format!(".stencil-staging-{n}");
        let candidate = root.join(&name);
        if !candidate.exists() && !taken.contains(&name) {
            return candidate;
        }
        n += 1;
    }
}

fn list(root: &Path) -> Result<Vec<String>, SyncError> {
    let mut names = list_all(root)?;
    names.retain(|n| n != GIT_LINK);
    Ok(names)
}

fn list_all(dir: &Path) -> Result<Vec<String>, SyncError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn hoists_children_and_keeps_git_link() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join(".git"));
        touch(&root.path().join("demo/README.md"));
        touch(&root.path().join("demo/src/lib.rs"));

        flatten(root.path()).expect("flatten");

        assert!(root.path().join(".git").is_file());
        assert!(root.path().join("README.md").is_file());
        assert!(root.path().join("src/lib.rs").is_file());
        assert!(!root.path().join("demo").exists());
    }

    #[test]
    fn child_sharing_the_parent_name_survives() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("demo/demo/__init__.py"));
        touch(&root.path().join("demo/setup.py"));

        flatten(root.path()).expect("flatten");

        assert!(root.path().join("demo/__init__.py").is_file());
        assert!(root.path().join("setup.py").is_file());
        assert_eq!(list(root.path()).unwrap(), vec!["demo", "setup.py"]);
    }

    #[test]
    fn two_top_level_entries_are_rejected_untouched() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("a/file"));
        touch(&root.path().join("b/file"));

        let err = flatten(root.path()).unwrap_err();
        match err {
            SyncError::UnexpectedRenderLayout { entries, .. } => {
                assert_eq!(entries, vec!["a", "b"])
            }
            other => panic!("expected layout error, got {other:?}"),
        }
        assert!(root.path().join("a/file").exists());
    }

    #[test]
    fn single_file_is_rejected() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("README.md"));
        assert!(matches!(
            flatten(root.path()),
            Err(SyncError::UnexpectedRenderLayout { .. })
        ));
    }

    #[test]
    fn nothing_rendered_is_rejected() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join(".git"));
        assert!(matches!(
            flatten(root.path()),
            Err(SyncError::UnexpectedRenderLayout { .. })
        ));
    }
}
