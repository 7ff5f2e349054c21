//! SSOT Core
//!
//! Validation, lifecycle and planning over a loaded spec tree.
//!
//! # Architecture
//!
//! ```text
//! ArtifactStore ──► TraceGraph ──┬─► RegistryCrossLinker ─┐
//!                                ├─► DeltaLedger ─────────┼─► ValidationReport
//!                                │                        │
//!                                └─► ImpactResolver ──► ValidationGate ──► TaskPlanner
//!                                                        (collaborator)
//! ```
//!
//! Every component is a synchronous batch computation over structures
//! rebuilt from disk per invocation. Violations are reported as
//! [`ssot_model::Diagnostic`] values, never as panics.
//!
//! # Example
//!
//! ```rust,no_run
//! use ssot_core::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), CoreError> {
//! let root = Path::new(".");
//! let workspace = Workspace::open(root, SsotConfig::discover(root)?)?;
//! let validation = workspace.validate();
//! print!("{}", validation.report.render_text());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod gate;
pub mod impact;
pub mod ingest;
pub mod ledger;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod report;
pub mod taskgen;

pub use config::{SsotConfig, CONFIG_FILE, MAX_ATTEMPTS};
pub use error::{ConfigError, CoreError, DecomposeError, GateError, LedgerError, PlanError};
pub use gate::{
    Attempt, Decomposer, DecompositionContext, DecompositionRequest, GateOutcome, ReplayDecomposer,
    ValidationGate,
};
pub use impact::{ImpactReport, ImpactResolver, ImpactUnit, SkipReason, SkippedChange};
pub use ingest::{ArtifactDrafts, IngestOutcome, IngestPipeline};
pub use ledger::DeltaLedger;
pub use pipeline::{check_store, Validation, Workspace};
pub use planner::TaskPlanner;
pub use registry::RegistryCrossLinker;
pub use report::{ReportSummary, ValidationReport};
pub use taskgen::{TaskGenOutcome, TaskGenPipeline, TaskPlan, TaskPreview};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipelines
    pub use crate::{
        CoreError, Decomposer, ImpactReport, IngestPipeline, ReplayDecomposer, SsotConfig,
        TaskGenPipeline, TaskPlanner, ValidationGate, ValidationReport, Workspace,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
