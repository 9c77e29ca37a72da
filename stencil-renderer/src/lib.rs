//! # stencil-renderer
//!
//! The rendering collaborator seam used by the sync engine, plus a Tera-based
//! implementation that renders directory templates from local paths or git
//! repositories.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stencil_core::Context;
//! use stencil_renderer::{RenderRequest, TemplateRenderer, TeraRenderer};
//!
//! fn render_once(out: &Path) {
//!     let request = RenderRequest {
//!         source: "https://example.com/templates/service.git",
//!         checkout: Some("v2"),
//!         context: &Context::new(),
//!         no_input: true,
//!     };
//!     if let Err(err) = TeraRenderer::new().render(&request, out) {
//!         eprintln!("render failed: {err}");
//!     }
//! }
//! ```

pub mod context;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod render;
pub mod source;

pub use credentials::SshCredentials;
pub use engine::TeraRenderer;
pub use error::RenderError;
pub use render::{RenderRequest, TemplateRenderer};
pub use source::TemplateSource;
