//! Impact Resolver
//!
//! Turns one applied delta into impact units: the resolved context a
//! decomposition collaborator needs to draft tasks for each change. Pure
//! status moves are skipped as `no-impact`.

use crate::error::CoreError;
use serde::Serialize;
use ssot_graph::TraceGraph;
use ssot_model::{
    AnchorRef, ArtifactKind, ChangeType, DeltaChange, DeltaStatus, DomainRecord, DomainSpec, EdgeKind,
    MiddlewareEntry, Requirement,
};
use ssot_store::ArtifactStore;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Edge kinds followed when expanding a capability
const CONTEXT_EDGES: &[EdgeKind] = &[
    EdgeKind::Realizes,
    EdgeKind::Satisfies,
    EdgeKind::Constrains,
    EdgeKind::TracesCommand,
    EdgeKind::TracesEvent,
];

/// Why a change produced no impact unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Only `status` differs from the prior record
    StatusOnly,
    /// The target is not a BV/CAP/BR/NFR
    NotGoverned,
    /// The target is not in the store
    MissingTarget,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusOnly => "status-only",
            Self::NotGoverned => "not-governed",
            Self::MissingTarget => "missing-target",
        }
    }
}

/// A change marked `no-impact`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChange {
    pub target: String,
    pub reason: SkipReason,
}

/// Resolved context of one changed artifact
#[derive(Debug, Clone, Serialize)]
pub struct ImpactUnit {
    pub change_type: ChangeType,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning domain id, from the traced command and event sections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Detail record of the owning domain (repository, entrypoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_record: Option<DomainRecord>,
    /// The changed record itself
    pub record: Requirement,
    /// Related requirements, sorted by id
    pub related: Vec<Requirement>,
    /// Command and event sections with full detail
    pub domain_specs: Vec<DomainSpec>,
    /// Middleware the collaborator may wire in, by pipeline position
    pub middleware: Vec<MiddlewareEntry>,
}

impl ImpactUnit {
    /// Whether the unit reaches executable code through a command or event
    #[must_use]
    pub fn has_code_impact(&self) -> bool {
        !self.domain_specs.is_empty()
    }
}

enum Resolution {
    Unit(ImpactUnit),
    Skip(SkipReason),
}

/// Every unit and skip for one delta
#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub delta_id: String,
    pub title: String,
    pub units: Vec<ImpactUnit>,
    pub skipped: Vec<SkippedChange>,
}

/// Resolves impact units for applied deltas
#[derive(Debug)]
pub struct ImpactResolver<'a> {
    store: &'a ArtifactStore,
    graph: &'a TraceGraph,
    baseline: Option<&'a ArtifactStore>,
}

impl<'a> ImpactResolver<'a> {
    #[must_use]
    pub fn new(store: &'a ArtifactStore, graph: &'a TraceGraph) -> Self {
        Self {
            store,
            graph,
            baseline: None,
        }
    }

    /// Diff changed records against their version in `baseline`
    #[inline]
    #[must_use]
    pub fn with_baseline(mut self, baseline: &'a ArtifactStore) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Impact units for delta `delta_id`
    ///
    /// # Errors
    /// Returns error if the delta is unknown or not applied, or a record
    /// cannot be serialized for diffing
    pub fn resolve(&self, delta_id: &str) -> Result<ImpactReport, CoreError> {
        let delta = &self
            .store
            .delta(delta_id)
            .ok_or_else(|| CoreError::UnknownDelta(delta_id.to_string()))?
            .record;
        if delta.status != DeltaStatus::Applied {
            return Err(CoreError::DeltaNotApplied {
                id: delta.id.clone(),
                status: delta.status,
            });
        }

        let mut report = ImpactReport {
            delta_id: delta.id.clone(),
            title: delta.title.clone(),
            units: Vec::new(),
            skipped: Vec::new(),
        };
        for change in &delta.changes {
            match self.resolve_change(change)? {
                Resolution::Unit(unit) => report.units.push(unit),
                Resolution::Skip(reason) => {
                    debug!(change = %change.target, reason = reason.as_str(), "no impact");
                    report.skipped.push(SkippedChange {
                        target: change.target.clone(),
                        reason,
                    });
                }
            }
        }
        info!(
            delta = %delta.id,
            units = report.units.len(),
            skipped = report.skipped.len(),
            "resolved impact"
        );
        Ok(report)
    }

    fn resolve_change(&self, change: &DeltaChange) -> Result<Resolution, CoreError> {
        if !change.is_governed() {
            return Ok(Resolution::Skip(SkipReason::NotGoverned));
        }
        let Some(record) = self.store.requirement(&change.target) else {
            return Ok(Resolution::Skip(SkipReason::MissingTarget));
        };
        if self.is_status_only(change, record)? {
            return Ok(Resolution::Skip(SkipReason::StatusOnly));
        }

        let context = self.context_ids(record);
        let related: Vec<Requirement> = context
            .iter()
            .filter(|id| id.as_str() != record.id())
            .filter_map(|id| self.store.requirement(id))
            .cloned()
            .collect();
        let domain_specs: Vec<DomainSpec> = context
            .iter()
            .filter_map(|id| id.parse::<AnchorRef>().ok())
            .filter_map(|reference| self.store.domain_spec(&reference))
            .collect();
        let domain = domain_specs
            .iter()
            .filter_map(DomainSpec::domain_id)
            .min()
            .map(str::to_string);
        let domain_record = domain.as_deref().and_then(|id| self.store.domain(id)).cloned();
        let mut middleware: Vec<MiddlewareEntry> = self
            .store
            .middleware()
            .map(|registry| registry.middleware.clone())
            .unwrap_or_default();
        middleware.sort_by_key(|entry| entry.position);

        Ok(Resolution::Unit(ImpactUnit {
            change_type: change.change_type,
            target: change.target.clone(),
            description: change.description.clone(),
            domain,
            domain_record,
            record: record.clone(),
            related,
            domain_specs,
            middleware,
        }))
    }

    /// Non-status fields unchanged against the baseline; without a prior
    /// record, whatever the change entry declares
    fn is_status_only(&self, change: &DeltaChange, record: &Requirement) -> Result<bool, CoreError> {
        match self.baseline.and_then(|b| b.requirement(record.id())) {
            Some(prior) => Ok(!record.differs_beyond_status(prior)?),
            None if self.baseline.is_some() => Ok(false),
            None => Ok(change.declares_status_only()),
        }
    }

    /// Capabilities in scope of `record` plus their one-hop neighborhood
    fn context_ids(&self, record: &Requirement) -> BTreeSet<String> {
        let id = record.id();
        let capabilities: BTreeSet<String> = match record.kind() {
            ArtifactKind::Capability => BTreeSet::from([id.to_string()]),
            ArtifactKind::BusinessRule => self.graph.successors(id, EdgeKind::Satisfies),
            ArtifactKind::Nfr => self.graph.successors(id, EdgeKind::Constrains),
            ArtifactKind::BusinessValue => self.graph.predecessors(id, EdgeKind::Realizes),
            _ => BTreeSet::new(),
        };
        let mut context = capabilities.clone();
        for cap in &capabilities {
            context.extend(self.graph.neighborhood(cap, CONTEXT_EDGES, 1));
        }
        context.insert(id.to_string());
        context
    }
}
