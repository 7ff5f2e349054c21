//! SSOT Traceability Graph
//!
//! Builds the typed graph of requirements, commands, events, domains,
//! middleware and deltas, and answers the queries the validators and the
//! impact resolver need.
//!
//! # Edges
//!
//! | Edge | Direction | Source |
//! |---|---|---|
//! | `realizes` | CAP → BV | `trace-links.yaml` |
//! | `satisfies` | BR → CAP | `trace-links.yaml` |
//! | `constrains` | NFR → CAP | `trace-links.yaml` |
//! | `traces-command` / `traces-event` | CAP → CMD / EVT | `trace.domain` on the CAP |
//! | `targets` | Delta → BV/CAP/BR/NFR | `changes[]` on the delta |

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod builder;
pub mod checks;
mod error;
mod graph;

pub use builder::{BuiltGraph, GraphBuilder};
pub use error::GraphError;
pub use graph::{TraceEdge, TraceGraph, TraceNode};

use ssot_store::ArtifactStore;

/// Build the graph and run every graph-level check
#[must_use]
pub fn validate(store: &ArtifactStore) -> BuiltGraph {
    let mut built = GraphBuilder::from_store(store);
    let coverage = checks::coverage_diagnostics(&built.graph);
    built.diagnostics.extend(coverage);
    built.diagnostics.extend(checks::trace_list_diagnostics(store));
    built
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
