//! Graph construction errors
//!
//! The builder turns these into diagnostics; they surface as Rust errors only
//! when the graph is assembled by hand.

use ssot_model::EdgeKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node with this id is already in the graph
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// An edge endpoint is not a node of the graph
    #[error("dangling {kind} edge {from} -> {to}: {missing} is not a known node")]
    DanglingEdge {
        from: String,
        to: String,
        kind: EdgeKind,
        missing: String,
    },
}
