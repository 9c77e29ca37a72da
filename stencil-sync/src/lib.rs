//! # stencil-sync
//!
//! Keeps a git repository synchronized with the template it was generated
//! from. The pure template renders live on a dedicated branch; each install
//! or upgrade appends a commit there and merges it into the working branch,
//! so git's three-way merge carries local changes across template upgrades.
//!
//! Start with [`Stencil`]: [`Stencil::install`], [`Stencil::upgrade`] and
//! [`Stencil::merge`].

pub mod branch;
pub mod engine;
pub mod error;
pub mod layout;
pub mod merge;
pub mod repo;
pub mod workspace;

pub use branch::TemplateBranch;
pub use engine::{InstallOptions, Stencil, SyncReport, TemplateInfo, UpgradeOptions};
pub use error::SyncError;
pub use merge::{MergeOutcome, MergeTarget};
pub use workspace::ScopedWorkspace;
