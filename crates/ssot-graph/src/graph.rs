//! The traceability graph
//!
//! A directed multigraph of typed nodes and typed edges. Node ids are the
//! artifact ids (`CAP-0001`, `specs/domain/commands.md#CMD-0001`); the index
//! is a `BTreeMap` so every iteration is lexicographic by id.

use crate::error::GraphError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use ssot_model::{AnchorRef, ArtifactKind, EdgeKind};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Node weight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceNode {
    pub id: String,
    pub kind: ArtifactKind,
}

/// One edge as reported: `(from, to, kind)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraceEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default)]
pub struct TraceGraph {
    graph: DiGraph<TraceNode, EdgeKind>,
    index: BTreeMap<String, NodeIndex>,
    /// Anchor ids declared per markdown file
    anchors: BTreeMap<String, BTreeSet<String>>,
}

impl TraceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node
    ///
    /// # Errors
    /// Returns error if a node with the same id exists
    pub fn add_node(&mut self, id: impl Into<String>, kind: ArtifactKind) -> Result<NodeIndex, GraphError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let idx = self.graph.add_node(TraceNode { id: id.clone(), kind });
        self.index.insert(id, idx);
        Ok(idx)
    }

    /// Insert an edge between two known nodes
    ///
    /// # Errors
    /// Returns error if either endpoint is unknown
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<(), GraphError> {
        let dangling = |missing: &str| GraphError::DanglingEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            missing: missing.to_string(),
        };
        let a = *self.index.get(from).ok_or_else(|| dangling(from))?;
        let b = *self.index.get(to).ok_or_else(|| dangling(to))?;
        self.graph.add_edge(a, b, kind);
        Ok(())
    }

    /// Record an anchor token found in a markdown file
    pub fn add_anchor(&mut self, file: impl Into<String>, anchor: impl Into<String>) {
        self.anchors.entry(file.into()).or_default().insert(anchor.into());
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&TraceNode> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node ids of `kind`, sorted
    pub fn ids_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &str> {
        self.index
            .iter()
            .filter(move |(_, idx)| self.graph[**idx].kind == kind)
            .map(|(id, _)| id.as_str())
    }

    /// All edges, sorted by `(from, to, kind)`
    #[must_use]
    pub fn edges(&self) -> Vec<TraceEdge> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| TraceEdge {
                from: self.graph[e.source()].id.clone(),
                to: self.graph[e.target()].id.clone(),
                kind: *e.weight(),
            })
            .collect();
        edges.sort();
        edges
    }

    /// Ids reached from `id` over one outgoing edge of `kind`
    #[must_use]
    pub fn successors(&self, id: &str, kind: EdgeKind) -> BTreeSet<String> {
        self.adjacent(id, kind, Direction::Outgoing)
    }

    /// Ids with an edge of `kind` into `id`
    #[must_use]
    pub fn predecessors(&self, id: &str, kind: EdgeKind) -> BTreeSet<String> {
        self.adjacent(id, kind, Direction::Incoming)
    }

    fn adjacent(&self, id: &str, kind: EdgeKind, direction: Direction) -> BTreeSet<String> {
        let Some(idx) = self.index.get(id) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(*idx, direction)
            .filter(|e| *e.weight() == kind)
            .map(|e| {
                let other = if direction == Direction::Outgoing { e.target() } else { e.source() };
                self.graph[other].id.clone()
            })
            .collect()
    }

    /// Ids that violate a coverage rule; empty when the rule holds
    ///
    /// Every CAP needs an outgoing `realizes`, every BR an outgoing
    /// `satisfies`. Other kinds carry no coverage rule.
    #[must_use]
    pub fn coverage(&self, kind: ArtifactKind) -> BTreeSet<String> {
        let required = match kind {
            ArtifactKind::Capability => EdgeKind::Realizes,
            ArtifactKind::BusinessRule => EdgeKind::Satisfies,
            _ => return BTreeSet::new(),
        };
        self.index
            .iter()
            .filter(|(_, idx)| self.graph[**idx].kind == kind)
            .filter(|(_, idx)| {
                !self
                    .graph
                    .edges_directed(**idx, Direction::Outgoing)
                    .any(|e| *e.weight() == required)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether `file#ANCHOR` names an anchor token declared in that file
    ///
    /// Anything that is not a well-formed CMD/EVT reference resolves to false.
    #[must_use]
    pub fn resolve_anchor(&self, file_ref: &str) -> bool {
        file_ref
            .parse::<AnchorRef>()
            .is_ok_and(|r| self.resolves(&r))
    }

    #[must_use]
    pub fn resolves(&self, reference: &AnchorRef) -> bool {
        self.anchors
            .get(reference.file())
            .is_some_and(|ids| ids.contains(reference.anchor()))
    }

    /// Ids within `depth` hops of `id` over the given edge kinds
    ///
    /// Edges are followed in both directions, so a CAP reaches the BRs that
    /// satisfy it as well as the commands it traces. An empty `kinds` slice
    /// follows every edge kind. The start node is not part of the result.
    #[must_use]
    pub fn neighborhood(&self, id: &str, kinds: &[EdgeKind], depth: usize) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let Some(start) = self.index.get(id).copied() else {
            return found;
        };
        let follows = |kind: &EdgeKind| kinds.is_empty() || kinds.contains(kind);

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((idx, hops)) = queue.pop_front() {
            if hops == depth {
                continue;
            }
            let outgoing = self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .filter(|e| follows(e.weight()))
                .map(|e| e.target());
            let incoming = self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| follows(e.weight()))
                .map(|e| e.source());
            let mut next: Vec<NodeIndex> = outgoing.chain(incoming).collect();
            next.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
            for other in next {
                if seen.insert(other) {
                    found.insert(self.graph[other].id.clone());
                    queue.push_back((other, hops + 1));
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CMD: &str = "specs/domain/commands.md#CMD-0001";

    fn sample() -> TraceGraph {
        let mut g = TraceGraph::new();
        g.add_node("BV-0001", ArtifactKind::BusinessValue).unwrap();
        g.add_node("CAP-0001", ArtifactKind::Capability).unwrap();
        g.add_node("CAP-0002", ArtifactKind::Capability).unwrap();
        g.add_node("BR-0001", ArtifactKind::BusinessRule).unwrap();
        g.add_node("BR-0010", ArtifactKind::BusinessRule).unwrap();
        g.add_node(CMD, ArtifactKind::Command).unwrap();
        g.add_anchor("specs/domain/commands.md", "CMD-0001");
        g.add_edge("CAP-0001", "BV-0001", EdgeKind::Realizes).unwrap();
        g.add_edge("CAP-0002", "BV-0001", EdgeKind::Realizes).unwrap();
        g.add_edge("BR-0001", "CAP-0001", EdgeKind::Satisfies).unwrap();
        g.add_edge("CAP-0001", CMD, EdgeKind::TracesCommand).unwrap();
        g
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut g = sample();
        assert_eq!(
            g.add_node("CAP-0001", ArtifactKind::Capability),
            Err(GraphError::DuplicateNode("CAP-0001".to_string()))
        );
    }

    #[test]
    fn dangling_edge_rejected() {
        let mut g = sample();
        let err = g.add_edge("CAP-0001", "BV-0404", EdgeKind::Realizes).unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { ref missing, .. } if missing == "BV-0404"));
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn coverage_reports_uncovered_rule() {
        let g = sample();
        assert_eq!(g.coverage(ArtifactKind::BusinessRule), BTreeSet::from(["BR-0010".to_string()]));
        assert!(g.coverage(ArtifactKind::Capability).is_empty());
        assert!(g.coverage(ArtifactKind::Nfr).is_empty());
    }

    #[test]
    fn anchors_resolve_exactly() {
        let g = sample();
        assert!(g.resolve_anchor(CMD));
        assert!(!g.resolve_anchor("specs/domain/commands.md#CMD-0002"));
        assert!(!g.resolve_anchor("specs/domain/events.md#CMD-0001"));
        assert!(!g.resolve_anchor("CMD-0001"));
    }

    #[test]
    fn neighborhood_follows_both_directions() {
        let g = sample();
        let around = g.neighborhood("CAP-0001", &[EdgeKind::Satisfies, EdgeKind::TracesCommand], 1);
        assert_eq!(around, BTreeSet::from(["BR-0001".to_string(), CMD.to_string()]));
    }

    #[test]
    fn neighborhood_respects_depth() {
        let g = sample();
        assert_eq!(
            g.neighborhood("BR-0001", &[], 1),
            BTreeSet::from(["CAP-0001".to_string()])
        );
        let two = g.neighborhood("BR-0001", &[], 2);
        assert!(two.contains("BV-0001"));
        assert!(two.contains(CMD));
        assert!(!two.contains("CAP-0002"));
        assert!(g.neighborhood("BR-0001", &[], 3).contains("CAP-0002"));
        assert!(g.neighborhood("BR-0001", &[], 0).is_empty());
        assert!(g.neighborhood("BV-9999", &[], 5).is_empty());
    }

    #[test]
    fn edges_are_sorted() {
        let g = sample();
        let edges = g.edges();
        let froms: Vec<_> = edges.iter().map(|e| e.from.as_str()).collect();
        assert_eq!(froms, vec!["BR-0001", "CAP-0001", "CAP-0001", "CAP-0002"]);
    }

    #[test]
    fn predecessors_and_successors() {
        let g = sample();
        assert_eq!(g.predecessors("BV-0001", EdgeKind::Realizes).len(), 2);
        assert_eq!(
            g.successors("CAP-0001", EdgeKind::TracesCommand),
            BTreeSet::from([CMD.to_string()])
        );
    }
}
