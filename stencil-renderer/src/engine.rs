//! Tera rendering backend: [`TeraRenderer`].
//!
//! # Template layout
//!
//! ```text
//! <template root>/
//!   stencil.json                 defaults, e.g. {"project_slug": "demo"}
//!   {{ stencil.project_slug }}/  the one templated directory
//!     README.md                  contents rendered with Tera
//!     src/{{ stencil.module }}.rs
//!     .stencil.json              typically `{{ stencil | json_encode(pretty=true) | safe }}`
//! ```
//!
//! Every path component and every UTF-8 file is rendered; other files are
//! copied byte for byte. A path component that renders to an empty string
//! drops that entry (and its subtree) from the output.

use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{self, MANIFEST_FILE};
use crate::credentials::SshCredentials;
use crate::error::{io_err, RenderError};
use crate::render::{RenderRequest, TemplateRenderer};
use crate::source::TemplateSource;

// ---------------------------------------------------------------------------
// Template discovery
// ---------------------------------------------------------------------------

fn is_templated(name: &str) -> bool {
    name.contains("{{") || name.contains("{%")
}

/// Find the single templated directory at the template root.
fn find_template_dir(root: &Path) -> Result<PathBuf, RenderError> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(root).map_err(|e| io_err(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(root, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && is_templated(&name) {
            found.push(name);
        }
    }
    found.sort();
    match found.as_slice() {
        [only] => Ok(root.join(only)),
        _ => Err(RenderError::Layout {
            root: root.to_path_buf(),
            found,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tree rendering
// ---------------------------------------------------------------------------

fn render_name(name: &str, ctx: &tera::Context) -> Result<String, RenderError> {
    if is_templated(name) {
        Ok(Tera::one_off(name, ctx, false)?)
    } else {
        Ok(name.to_string())
    }
}

fn render_file(src: &Path, dest: &Path, ctx: &tera::Context) -> Result<(), RenderError> {
    let bytes = std::fs::read(src).map_err(|e| io_err(src, e))?;
    match String::from_utf8(bytes) {
        Ok(text) => {
            let rendered = Tera::one_off(&text, ctx, false)?;
            std::fs::write(dest, rendered).map_err(|e| io_err(dest, e))?;
        }
        Err(raw) => {
            std::fs::write(dest, raw.into_bytes()).map_err(|e| io_err(dest, e))?;
        }
    }
    let permissions = std::fs::metadata(src)
        .map_err(|e| io_err(src, e))?
        .permissions();
    std::fs::set_permissions(dest, permissions).map_err(|e| io_err(dest, e))?;
    Ok(())
}

fn render_tree(src: &Path, dest: &Path, ctx: &tera::Context) -> Result<(), RenderError> {
    std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    let mut entries: Vec<_> = std::fs::read_dir(src)
        .map_err(|e| io_err(src, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| io_err(src, e))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let raw_name = entry.file_name().to_string_lossy().into_owned();
        if raw_name == ".git" {
            continue;
        }
        let name = render_name(&raw_name, ctx)?;
        if name.trim().is_empty() {
            tracing::debug!(entry = %raw_name, "skipping entry whose name rendered empty");
            continue;
        }
        let src_path = entry.path();
        let dest_path = dest.join(&name);
        let file_type = entry.file_type().map_err(|e| io_err(&src_path, e))?;
        if file_type.is_dir() {
            render_tree(&src_path, &dest_path, ctx)?;
        } else {
            render_file(&src_path, &dest_path, ctx)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TeraRenderer
// ---------------------------------------------------------------------------

/// Renders directory templates with Tera.
///
/// Create once with [`TeraRenderer::new`] and reuse; each call fetches the
/// source afresh so revisions are always honoured.
#[derive(Debug, Clone, Default)]
pub struct TeraRenderer {
    credentials: SshCredentials,
}

impl TeraRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `credentials` when the template has to be cloned over SSH.
    pub fn with_credentials(credentials: SshCredentials) -> Self {
        Self { credentials }
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, request: &RenderRequest<'_>, output_dir: &Path) -> Result<(), RenderError> {
        let source = TemplateSource::fetch(request.source, request.checkout, &self.credentials)?;
        let defaults = context::load_manifest(source.root())?;
        let template_dir = find_template_dir(source.root())?;
        let resolved = context::resolve(&defaults, request)?;
        let tera_ctx = context::to_tera_context(&resolved)?;

        let top_name = template_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let top = render_name(&top_name, &tera_ctx)?;
        if top.trim().is_empty() {
            return Err(RenderError::Layout {
                root: source.root().to_path_buf(),
                found: vec![top_name],
            });
        }

        tracing::info!(
            template = %request.source,
            checkout = request.checkout.unwrap_or("<default>"),
            output = %output_dir.join(&top).display(),
            "rendering template"
        );
        render_tree(&template_dir, &output_dir.join(top), &tera_ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::Context;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn sample_template() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join(MANIFEST_FILE),
            r#"{"project_slug": "demo", "module": "core"}"#,
        );
        let top = dir.path().join("{{ stencil.project_slug }}");
        write(&top.join("README.md"), "# {{ stencil.project_slug }}\n");
        write(&top.join("src/{{ stencil.module }}.rs"), "// {{ stencil.module }}\n");
        dir
    }

    #[test]
    fn renders_names_and_contents() {
        let template = sample_template();
        let out = TempDir::new().unwrap();
        let locator = template.path().to_string_lossy().into_owned();
        let request = RenderRequest {
            source: &locator,
            checkout: None,
            context: &Context::new(),
            no_input: true,
        };
        TeraRenderer::new().render(&request, out.path()).expect("render");

        let readme = std::fs::read_to_string(out.path().join("demo/README.md")).unwrap();
        assert_eq!(readme, "# demo\n");
        assert!(out.path().join("demo/src/core.rs").exists());
    }

    #[test]
    fn missing_manifest_is_reported() {
        let template = TempDir::new().unwrap();
        std::fs::create_dir(template.path().join("{{ stencil.x }}")).unwrap();
        let out = TempDir::new().unwrap();
        let locator = template.path().to_string_lossy().into_owned();
        let request = RenderRequest {
            source: &locator,
            checkout: None,
            context: &Context::new(),
            no_input: true,
        };
        let err = TeraRenderer::new().render(&request, out.path()).unwrap_err();
        assert!(matches!(err, RenderError::MissingManifest { .. }), "got: {err}");
    }

    #[test]
    fn two_templated_directories_is_a_layout_error() {
        let template = sample_template();
        std::fs::create_dir(template.path().join("{{ stencil.module }}")).unwrap();
        let err = find_template_dir(template.path()).unwrap_err();
        match err {
            RenderError::Layout { found, .. } => assert_eq!(found.len(), 2),
            other => panic!("expected layout error, got {other:?}"),
        }
    }

    #[test]
    fn empty_rendered_name_is_skipped() {
        let template = sample_template();
        write(
            &template
                .path()
                .join("{{ stencil.project_slug }}/{% if stencil.docs %}docs{% endif %}/index.md"),
            "docs\n",
        );
        let out = TempDir::new().unwrap();
        let locator = template.path().to_string_lossy().into_owned();
        let mut overrides = Context::new();
        overrides.insert("docs", false);
        let request = RenderRequest {
            source: &locator,
            checkout: None,
            context: &overrides,
            no_input: true,
        };
        TeraRenderer::new().render(&request, out.path()).expect("render");
        assert!(!out.path().join("demo/docs").exists());
    }
}
