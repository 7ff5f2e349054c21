//! SSOT Store
//!
//! Reads the governed spec tree from disk and writes new artifacts back.
//!
//! # Architecture
//!
//! ```text
//! files ──► parsers (YAML / Markdown) ──► SchemaCatalog ──► ArtifactStore
//!                                                             │
//!                                  WriteSet ──► ArtifactWriter ◄┘ (pipelines)
//! ```
//!
//! Loading never stops at the first bad record: every structural problem is
//! collected as a [`ssot_model::Diagnostic`] on the store.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod layout;
pub mod parsers;
pub mod schema;
mod store;
mod writer;

pub use error::{ParseError, SchemaError, StoreError, WriteError};
pub use layout::Layout;
pub use parsers::{AnchorSite, MarkdownDocument, MarkdownParser, SourceParser, YamlParser};
pub use schema::{check_placement, SchemaCatalog, SchemaIssue, SchemaKind, ValidationResult};
pub use store::{ArtifactStore, Loaded};
pub use writer::{ArtifactWriter, WriteSet};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for loading a spec tree
    pub use crate::{ArtifactStore, Layout, SchemaCatalog, SchemaKind, StoreError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
