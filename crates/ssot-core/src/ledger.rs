//! Delta Ledger
//!
//! Delta lifecycle checks. Transitions are validated for direction only
//! (`draft → applied` is accepted). Ledger problems are reported as
//! Lifecycle diagnostics, distinct from schema errors on the same file.

use crate::error::LedgerError;
use ssot_graph::{checks, GraphBuilder};
use ssot_model::{
    validate_transition, AnchorRef, ArtifactKind, Delta, DeltaChange, DeltaStatus, Diagnostic, ErrorCode, IdError,
};
use ssot_store::ArtifactStore;
use tracing::{debug, info};

/// Lifecycle checks over the deltas of one store, optionally against a
/// baseline store
#[derive(Debug)]
pub struct DeltaLedger<'a> {
    store: &'a ArtifactStore,
    baseline: Option<&'a ArtifactStore>,
}

impl<'a> DeltaLedger<'a> {
    #[must_use]
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store, baseline: None }
    }

    /// Compare against a prior version of the tree
    #[inline]
    #[must_use]
    pub fn with_baseline(mut self, baseline: &'a ArtifactStore) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Every lifecycle violation in the store
    #[must_use]
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for loaded in self.store.deltas() {
            let delta = &loaded.record;
            if let Err(IdError::InvalidDate(_)) = delta.parsed_id() {
                diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::PatternMismatch,
                        delta.id.as_str(),
                        format!("{} does not carry a calendar date", delta.id),
                    )
                    .at("/id"),
                );
            }
            diagnostics.extend(self.dangling_targets(delta));
            if let Some(successor) = &delta.superseded_by {
                if self.store.delta(successor).is_none() {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::DanglingTarget,
                            delta.id.as_str(),
                            format!("supersededBy {successor} does not exist"),
                        )
                        .at("/supersededBy"),
                    );
                }
            }
        }
        if let Some(baseline) = self.baseline {
            diagnostics.extend(self.check_against(baseline));
        }
        info!(
            deltas = self.store.deltas().len(),
            diagnostics = diagnostics.len(),
            "checked delta ledger"
        );
        diagnostics
    }

    /// Targets of `delta` that no longer resolve
    ///
    /// Governed ids must name a requirement record and `file#ANCHOR`
    /// references an anchored section. Free-form documentation targets are
    /// not resolved.
    #[must_use]
    pub fn dangling_targets(&self, delta: &Delta) -> Vec<Diagnostic> {
        delta
            .changes
            .iter()
            .enumerate()
            .filter(|(_, change)| !self.resolves(change))
            .map(|(position, change)| {
                Diagnostic::new(
                    ErrorCode::DanglingTarget,
                    delta.id.as_str(),
                    format!("change target {} does not exist", change.target),
                )
                .at(format!("/changes/{position}/target"))
            })
            .collect()
    }

    fn resolves(&self, change: &DeltaChange) -> bool {
        if change.is_governed() {
            return self.store.requirement(&change.target).is_some();
        }
        if change.target.parse::<AnchorRef>().is_ok() {
            return self.store.contains(&change.target);
        }
        true
    }

    /// Rules that need the prior version of the tree
    #[must_use]
    pub fn check_against(&self, baseline: &ArtifactStore) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for prior in baseline.deltas() {
            let before = &prior.record;
            let Some(current) = self.store.delta(&before.id) else {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::RemovedArtifact,
                    before.id.as_str(),
                    format!("{} was deleted (was {})", before.id, prior.path),
                ));
                continue;
            };
            let after = &current.record;
            if let Err(e) = validate_transition(before.status, after.status) {
                diagnostics.push(Diagnostic::new(ErrorCode::InvalidTransition, after.id.as_str(), e.to_string()).at("/status"));
            }
            if before.status == DeltaStatus::Applied && before.frozen_content().ok() != after.frozen_content().ok() {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::AppliedDeltaMutated,
                    after.id.as_str(),
                    format!("{} is applied; only supersededBy may change", after.id),
                ));
            }
        }

        for prior in baseline.requirements() {
            let id = prior.record.id();
            if self.store.requirement(id).is_none() {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::RemovedArtifact,
                    id,
                    format!("{id} was deleted; deprecate or supersede it instead"),
                ));
            }
        }

        for spec in baseline.domain_specs() {
            let reference = spec.reference.to_string();
            if !self.store.contains(&reference) {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::RemovedArtifact,
                    reference.as_str(),
                    format!("{} was deleted; deprecate it instead", spec.reference.anchor()),
                ));
            }
        }

        for loaded in self.store.requirements() {
            let record = &loaded.record;
            let changed = baseline.requirement(record.id()).map_or(true, |prior| prior != record);
            if changed && !self.covered(record.id(), baseline) {
                debug!(id = record.id(), "governed change without delta");
                diagnostics.push(Diagnostic::new(
                    ErrorCode::UncoveredChange,
                    record.id(),
                    format!("{} changed but no delta targets it", record.id()),
                ));
            }
        }
        diagnostics
    }

    /// Whether a delta new since `baseline`, or not yet applied there,
    /// targets `id`
    ///
    /// Deltas already applied in the baseline are history and cover nothing
    /// that changed afterwards.
    fn covered(&self, id: &str, baseline: &ArtifactStore) -> bool {
        self.store
            .deltas()
            .iter()
            .filter(|l| {
                baseline
                    .delta(&l.record.id)
                    .map_or(true, |prior| prior.record.status != DeltaStatus::Applied)
            })
            .any(|l| l.record.governed_changes().any(|c| c.target == id))
    }

    /// Move delta `id` to `to`, checking direction and guards
    ///
    /// Returns the updated record; persisting it is up to the caller.
    ///
    /// # Errors
    /// Returns error if the delta is unknown, the move is backwards, or a
    /// guard for reaching `applied` does not hold
    pub fn advance(&self, id: &str, to: DeltaStatus) -> Result<Delta, LedgerError> {
        let loaded = self
            .store
            .delta(id)
            .ok_or_else(|| LedgerError::UnknownDelta(id.to_string()))?;
        let from = loaded.record.status;
        validate_transition(from, to)?;

        if to == DeltaStatus::Applied && from != DeltaStatus::Applied {
            let violations = self.applied_guard(&loaded.record);
            if !violations.is_empty() {
                return Err(LedgerError::Guard {
                    id: id.to_string(),
                    to,
                    diagnostics: violations,
                });
            }
        }

        info!(delta = %id, %from, %to, "advanced delta");
        let mut delta = loaded.record.clone();
        delta.status = to;
        Ok(delta)
    }

    /// Targets resolve, and implemented capabilities among them already
    /// trace resolving commands and events
    fn applied_guard(&self, delta: &Delta) -> Vec<Diagnostic> {
        let built = GraphBuilder::from_store(self.store);
        let mut violations = Vec::new();
        for (position, change) in delta.changes.iter().enumerate() {
            let pointer = format!("/changes/{position}/target");
            let guard = |cause: &Diagnostic| {
                Diagnostic::new(
                    ErrorCode::TransitionGuard,
                    delta.id.as_str(),
                    format!("{}: {}", change.target, cause.message),
                )
                .at(pointer.as_str())
            };

            if !self.resolves(change) {
                violations.push(
                    Diagnostic::new(
                        ErrorCode::TransitionGuard,
                        delta.id.as_str(),
                        format!("{} does not resolve", change.target),
                    )
                    .at(pointer.as_str()),
                );
                continue;
            }
            if change.target_kind() != Some(ArtifactKind::Capability) {
                continue;
            }
            let Some(cap) = self.store.requirement(&change.target).and_then(|r| r.as_capability()) else {
                continue;
            };
            if !cap.is_implemented() {
                continue;
            }
            violations.extend(checks::implemented_trace_diagnostics(cap).iter().map(guard));
            violations.extend(
                unresolved_traces(&built.diagnostics, &cap.id)
                    .into_iter()
                    .map(|d| guard(&d)),
            );
        }
        violations
    }
}

/// Trace entries of `cap_id` the graph builder could not turn into edges
fn unresolved_traces(diagnostics: &[Diagnostic], cap_id: &str) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| d.subject == cap_id)
        .filter(|d| matches!(d.code, ErrorCode::UnresolvedAnchor | ErrorCode::EdgeKindMismatch))
        .filter(|d| d.pointer.as_deref().is_some_and(|p| p.starts_with("/trace/")))
        .cloned()
        .collect()
}
