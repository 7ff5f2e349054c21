//! SSOT Model
//!
//! Typed records for the governed spec tree.
//!
//! # Core Concepts
//!
//! - [`ArtifactKind`]: node kinds and their identifier patterns
//! - [`Requirement`]: BV/CAP/BR/NFR records after schema validation
//! - [`TraceLink`] / [`EdgeKind`]: typed edges of the traceability graph
//! - [`Delta`]: change records and their `draft → proposed → applied` lifecycle
//! - [`TaskDraft`] / [`PlannedTask`]: task generation input and output
//! - [`Diagnostic`]: the four-kind error taxonomy every check reports through
//!
//! # Example
//!
//! ```rust
//! use ssot_model::{ArtifactKind, LinkType, TraceLink};
//!
//! let link = TraceLink::new("BV-0001", "CAP-0001", LinkType::Realizes);
//! assert_eq!(link.canonical(), Some(("CAP-0001", "BV-0001")));
//! assert_eq!(ArtifactKind::of("CAP-0001"), Some(ArtifactKind::Capability));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod delta;
mod diagnostic;
mod domain_spec;
mod id;
mod record;
mod registry;
mod task;
mod trace;

pub use delta::{
    allowed_transitions, validate_transition, ChangeType, Compatibility, Delta, DeltaBuilder,
    DeltaChange, DeltaError, DeltaStatus,
};
pub use diagnostic::{has_fatal, normalize, Diagnostic, ErrorCode, ErrorKind};
pub use domain_spec::{DomainSpec, PayloadField};
pub use id::{next_requirement_id, AnchorRef, ArtifactKind, DeltaId, IdError, TaskId};
pub use record::{
    BusinessRule, BusinessValue, Capability, CapabilityTrace, DomainTrace, Nfr, Requirement,
    Severity, Status,
};
pub use registry::{
    is_entrypoint_id, DomainIndex, DomainRecord, Entrypoints, ImplementationRef,
    MiddlewareCategory, MiddlewareEntry, MiddlewareMetadata, MiddlewareRegistry, QualityGateRef,
    RepoEntry, RepoIndex, WorkspaceRegistry, GATE_CATALOG, MIDDLEWARE_ENTRY_PREFIX,
};
pub use task::{Layer, PlannedTask, Priority, TaskDraft, TaskDrafts};
pub use trace::{EdgeKind, LinkType, TraceLink, TraceLinks};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with SSOT records
    pub use crate::{
        AnchorRef, ArtifactKind, Delta, DeltaStatus, Diagnostic, EdgeKind, ErrorCode, ErrorKind,
        Layer, Requirement, Status, TaskDraft, TraceLink,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
