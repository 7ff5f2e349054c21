//! Graph-level invariants
//!
//! Coverage (`realizes` / `satisfies`) and the trace lists of implemented
//! capabilities. Both report Referential diagnostics.

use crate::graph::TraceGraph;
use ssot_model::{ArtifactKind, Capability, Diagnostic, ErrorCode};
use ssot_store::ArtifactStore;

/// One diagnostic per CAP without `realizes` and per BR without `satisfies`
#[must_use]
pub fn coverage_diagnostics(graph: &TraceGraph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for id in graph.coverage(ArtifactKind::Capability) {
        diagnostics.push(Diagnostic::new(
            ErrorCode::MissingRealizes,
            id.as_str(),
            format!("{id} has no realizes link to a business value"),
        ));
    }
    for id in graph.coverage(ArtifactKind::BusinessRule) {
        diagnostics.push(Diagnostic::new(
            ErrorCode::MissingSatisfies,
            id.as_str(),
            format!("{id} has no satisfies link to a capability"),
        ));
    }
    diagnostics
}

/// An implemented CAP must trace at least one command and one event
///
/// Resolution of the individual entries is checked while the graph is built.
#[must_use]
pub fn implemented_trace_diagnostics(cap: &Capability) -> Vec<Diagnostic> {
    if !cap.is_implemented() {
        return Vec::new();
    }
    [("commands", cap.commands()), ("events", cap.events())]
        .into_iter()
        .filter(|(_, entries)| entries.is_empty())
        .map(|(list, _)| {
            Diagnostic::new(
                ErrorCode::EmptyTraceList,
                cap.id.as_str(),
                format!("{} is implemented but trace.domain.{list} is empty", cap.id),
            )
            .at(format!("/trace/domain/{list}"))
        })
        .collect()
}

/// Trace-list checks over every capability in the store
#[must_use]
pub fn trace_list_diagnostics(store: &ArtifactStore) -> Vec<Diagnostic> {
    store
        .requirements()
        .iter()
        .filter_map(|l| l.record.as_capability())
        .flat_map(implemented_trace_diagnostics)
        .collect()
}
