//! Graph construction from an Artifact Store
//!
//! Single pass: nodes first, then edges. Every problem found along the way is
//! collected as a diagnostic rather than aborting, so one run reports the
//! whole error set.

use crate::error::GraphError;
use crate::graph::TraceGraph;
use ssot_model::{AnchorRef, ArtifactKind, Capability, Diagnostic, EdgeKind, ErrorCode};
use ssot_store::ArtifactStore;
use tracing::{debug, info};

/// Graph plus the diagnostics found while building it
#[derive(Debug, Clone, Default)]
pub struct BuiltGraph {
    pub graph: TraceGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds a [`TraceGraph`] from the loaded records
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: TraceGraph,
    diagnostics: Vec<Diagnostic>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for `store`
    #[must_use]
    pub fn from_store(store: &ArtifactStore) -> BuiltGraph {
        let mut builder = Self::new();
        builder.add_nodes(store);
        builder.add_edges(store);
        info!(
            nodes = builder.graph.node_count(),
            edges = builder.graph.edge_count(),
            diagnostics = builder.diagnostics.len(),
            "built traceability graph"
        );
        BuiltGraph {
            graph: builder.graph,
            diagnostics: builder.diagnostics,
        }
    }

    fn add_nodes(&mut self, store: &ArtifactStore) {
        for (path, doc) in store.documents() {
            for site in &doc.anchors {
                let Ok(reference) = AnchorRef::new(path.as_str(), site.id.as_str()) else {
                    continue;
                };
                self.graph.add_anchor(path.as_str(), site.id.as_str());
                self.node(reference.to_string(), reference.kind(), path);
            }
        }
        for loaded in store.requirements() {
            self.node(loaded.record.id().to_string(), loaded.record.kind(), &loaded.path);
        }
        for loaded in store.domains() {
            self.node(loaded.record.id.clone(), ArtifactKind::Domain, &loaded.path);
        }
        if let Some(registry) = store.middleware() {
            for entry in &registry.middleware {
                self.node(entry.id.clone(), ArtifactKind::Middleware, &store.layout().middleware_registry);
            }
        }
        for loaded in store.deltas() {
            self.node(loaded.record.id.clone(), ArtifactKind::Delta, &loaded.path);
        }
    }

    fn node(&mut self, id: String, kind: ArtifactKind, path: &str) {
        if let Err(GraphError::DuplicateNode(id)) = self.graph.add_node(id, kind) {
            debug!(id = %id, path = %path, "duplicate id");
            self.diagnostics.push(Diagnostic::new(
                ErrorCode::DuplicateId,
                id.as_str(),
                format!("{id} is declared more than once (again in {path})"),
            ));
        }
    }

    fn add_edges(&mut self, store: &ArtifactStore) {
        for (position, link) in store.trace_links().iter().enumerate() {
            let pointer = format!("/links/{position}");
            match link.canonical() {
                Some((source, target)) => {
                    let result = self.graph.add_edge(source, target, link.link_type.edge_kind());
                    self.edge_result(result, source, &pointer);
                }
                None => {
                    let (expected_source, expected_target) = link.link_type.endpoints();
                    self.diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::EdgeKindMismatch,
                            link.from.as_str(),
                            format!(
                                "{} link {} -> {} must connect {} and {}",
                                link.link_type.as_str(),
                                link.from,
                                link.to,
                                expected_source.prefix(),
                                expected_target.prefix()
                            ),
                        )
                        .at(pointer),
                    );
                }
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for cap in store.requirements().iter().filter_map(|l| l.record.as_capability()) {
            // Duplicates were reported as nodes; their traces belong to the first record
            if seen.insert(cap.id.as_str()) {
                self.add_capability_traces(cap);
            }
        }

        for loaded in store.deltas() {
            let delta = &loaded.record;
            for change in delta.governed_changes() {
                // Missing targets are a ledger concern
                if self.graph.contains(&change.target) {
                    let result = self.graph.add_edge(&delta.id, &change.target, EdgeKind::Targets);
                    self.edge_result(result, &delta.id, "");
                }
            }
        }
    }

    fn add_capability_traces(&mut self, cap: &Capability) {
        let lists = [
            ("commands", cap.commands(), ArtifactKind::Command, EdgeKind::TracesCommand),
            ("events", cap.events(), ArtifactKind::Event, EdgeKind::TracesEvent),
        ];
        for (list, entries, expected, edge) in lists {
            for (position, entry) in entries.iter().enumerate() {
                let pointer = format!("/trace/domain/{list}/{position}");
                // Malformed entries are reported by the schema
                let Ok(reference) = entry.parse::<AnchorRef>() else {
                    continue;
                };
                if reference.kind() != expected {
                    self.diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::EdgeKindMismatch,
                            cap.id.as_str(),
                            format!("{entry} is listed under trace.domain.{list} but is not a {}", expected.prefix()),
                        )
                        .at(pointer),
                    );
                    continue;
                }
                if !self.graph.resolves(&reference) {
                    self.diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::UnresolvedAnchor,
                            cap.id.as_str(),
                            format!("{entry} does not resolve to an anchor in {}", reference.file()),
                        )
                        .at(pointer),
                    );
                    continue;
                }
                let result = self.graph.add_edge(&cap.id, &reference.to_string(), edge);
                self.edge_result(result, &cap.id, &pointer);
            }
        }
    }

    fn edge_result(&mut self, result: Result<(), GraphError>, subject: &str, pointer: &str) {
        if let Err(e) = result {
            self.diagnostics
                .push(Diagnostic::new(ErrorCode::DanglingEdge, subject, e.to_string()).at(pointer));
        }
    }
}
