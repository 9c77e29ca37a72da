//! Stencil core library: context document, repository configuration, errors.
//!
//! Public API surface:
//! - [`context`]: the persisted template context and its store
//! - [`config`]: [`SyncConfig`], names and identity used by the sync engine
//! - [`error`]: [`ContextError`], [`ConfigError`]

pub mod config;
pub mod context;
pub mod error;

pub use config::{Identity, SyncConfig};
pub use context::{Context, CHECKOUT_KEY, TEMPLATE_KEY};
pub use error::{ConfigError, ContextError};
