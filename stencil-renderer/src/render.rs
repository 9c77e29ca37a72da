//! The rendering collaborator seam.
//!
//! The sync engine only ever talks to a [`TemplateRenderer`]. Any templating
//! backend can be plugged in as long as it honours the output contract: the
//! rendered project lands in `output_dir` as exactly one top-level directory.

use std::path::Path;

use stencil_core::Context;

use crate::error::RenderError;

/// Everything a collaborator needs to materialize a template.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Source locator: a local directory or anything `git clone` accepts.
    pub source: &'a str,
    /// Branch, tag or commit to render. `None` renders the default branch
    /// (or the directory as-is for local sources).
    pub checkout: Option<&'a str>,
    /// Variables that take priority over the template's own defaults.
    pub context: &'a Context,
    /// Suppress interactive prompts and use defaults + `context` only.
    pub no_input: bool,
}

/// A templating backend.
pub trait TemplateRenderer {
    /// Render `request` into `output_dir`.
    ///
    /// On success `output_dir` gains exactly one new top-level directory
    /// holding the rendered project; existing entries (e.g. `.git`) are left
    /// alone.
    fn render(&self, request: &RenderRequest<'_>, output_dir: &Path) -> Result<(), RenderError>;
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for Box<T> {
    fn render(&self, request: &RenderRequest<'_>, output_dir: &Path) -> Result<(), RenderError> {
        (**self).render(request, output_dir)
    }
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for &T {
    fn render(&self, request: &RenderRequest<'_>, output_dir: &Path) -> Result<(), RenderError> {
        (**self).render(request, output_dir)
    }
}
