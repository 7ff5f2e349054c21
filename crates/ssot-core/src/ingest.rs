//! Requirements ingestion
//!
//! Artifact drafts from the decomposition collaborator are staged into a
//! candidate store (the current store plus the drafts, in memory), checked
//! with the full validation pipeline and, once accepted by the
//! [`ValidationGate`], written together with a proposed delta covering them.
//!
//! Only violations the drafts introduce count against them; problems already
//! present in the tree are not the collaborator's to repair.

use crate::error::CoreError;
use crate::gate::{Attempt, Decomposer, ValidationGate};
use crate::pipeline::{check_store, Workspace};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssot_model::{
    next_requirement_id, ArtifactKind, ChangeType, Delta, DeltaBuilder, DeltaChange, DeltaId, DeltaStatus,
    Diagnostic, DomainSpec, ErrorCode, Requirement, TraceLink, TraceLinks,
};
use ssot_store::{ArtifactStore, SchemaKind, WriteSet};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info};

/// Subject used for problems with the drafts as a whole
const DRAFTS_SUBJECT: &str = "drafts";

/// Artifacts proposed in one attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactDrafts {
    /// Title for the generated delta
    pub title: Option<String>,
    pub business_values: Vec<Value>,
    pub capabilities: Vec<Value>,
    pub business_rules: Vec<Value>,
    pub nfrs: Vec<Value>,
    pub commands: Vec<DomainSpec>,
    pub events: Vec<DomainSpec>,
    pub trace_links: Vec<TraceLink>,
}

impl ArtifactDrafts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.business_values.is_empty()
            && self.capabilities.is_empty()
            && self.business_rules.is_empty()
            && self.nfrs.is_empty()
            && self.commands.is_empty()
            && self.events.is_empty()
            && self.trace_links.is_empty()
    }

    fn records(&self) -> [(ArtifactKind, &[Value]); 4] {
        [
            (ArtifactKind::BusinessValue, &self.business_values),
            (ArtifactKind::Capability, &self.capabilities),
            (ArtifactKind::BusinessRule, &self.business_rules),
            (ArtifactKind::Nfr, &self.nfrs),
        ]
    }
}

/// Drafts applied to a copy of the store
#[derive(Debug, Clone)]
pub struct Candidate {
    pub store: ArtifactStore,
    pub delta: Delta,
    pub writes: WriteSet,
    /// Problems found while staging, before the pipeline runs
    pub diagnostics: Vec<Diagnostic>,
}

/// Accepted drafts, ready to commit
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub delta: Delta,
    pub writes: WriteSet,
    pub attempts: u32,
    pub history: Vec<Attempt>,
}

/// Ingestion pipeline over one workspace
#[derive(Debug)]
pub struct IngestPipeline<'a> {
    workspace: &'a Workspace,
    date: NaiveDate,
    existing: BTreeSet<Diagnostic>,
}

impl<'a> IngestPipeline<'a> {
    #[must_use]
    pub fn new(workspace: &'a Workspace) -> Self {
        let (_, existing) = check_store(workspace.store(), None, workspace.config());
        Self {
            workspace,
            date: chrono::Utc::now().date_naive(),
            existing: existing.into_iter().collect(),
        }
    }

    /// Date used for the generated delta id
    #[inline]
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Apply `drafts` to a copy of the store
    #[must_use]
    pub fn stage(&self, drafts: &ArtifactDrafts) -> Candidate {
        let layout = self.workspace.config().layout.clone();
        let mut store = self.workspace.store().clone();
        let mut writes = WriteSet::new();
        let mut diagnostics = Vec::new();
        let mut changes = Vec::new();

        if drafts.is_empty() {
            diagnostics.push(Diagnostic::new(
                ErrorCode::MissingField,
                DRAFTS_SUBJECT,
                "drafts contain no artifacts",
            ));
        }

        for (kind, values) in drafts.records() {
            for value in values {
                let mut value = value.clone();
                let declared = value.get("id").and_then(Value::as_str).map(str::to_string);
                let id = match declared {
                    Some(id) => id,
                    None => {
                        let taken: Vec<String> = store.requirements().iter().map(|l| l.record.id().to_string()).collect();
                        let id = match next_requirement_id(kind, taken.iter().map(String::as_str)) {
                            Ok(id) => id,
                            Err(e) => {
                                diagnostics.push(Diagnostic::new(ErrorCode::PatternMismatch, DRAFTS_SUBJECT, e.to_string()));
                                continue;
                            }
                        };
                        if let Some(object) = value.as_object_mut() {
                            object.insert("id".to_string(), Value::String(id.clone()));
                        }
                        id
                    }
                };
                let (Some(path), Some(schema)) = (layout.requirement_path(kind, &id), SchemaKind::for_requirement(kind))
                else {
                    continue;
                };

                let found = self.workspace.catalog().check(schema, &path, &value);
                if !found.is_empty() {
                    diagnostics.extend(found);
                    continue;
                }
                let record = match Requirement::from_value(kind, value.clone()) {
                    Ok(record) => record,
                    Err(e) => {
                        diagnostics.push(Diagnostic::new(ErrorCode::MalformedDocument, path.as_str(), e.to_string()));
                        continue;
                    }
                };
                let change_type = match store.requirement(&id) {
                    Some(existing) if *existing == record => {
                        debug!(id = %id, "draft identical to stored record");
                        continue;
                    }
                    Some(_) => ChangeType::Modify,
                    None => ChangeType::Add,
                };
                match serde_yaml::to_string(&value) {
                    Ok(yaml) => writes.insert(path.as_str(), yaml),
                    Err(e) => {
                        diagnostics.push(Diagnostic::new(ErrorCode::MalformedDocument, path.as_str(), e.to_string()));
                        continue;
                    }
                }
                store.insert_requirement(path, record);
                changes.push(DeltaChange::new(change_type, id));
            }
        }

        let mut touched = BTreeSet::new();
        let sections = drafts
            .commands
            .iter()
            .map(|spec| (ArtifactKind::Command, spec))
            .chain(drafts.events.iter().map(|spec| (ArtifactKind::Event, spec)));
        for (expected, spec) in sections {
            let reference = spec.reference.to_string();
            if spec.kind() != expected {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::PatternMismatch,
                    reference.as_str(),
                    format!("{} is listed as a {} section", spec.reference.anchor(), expected.prefix()),
                ));
                continue;
            }
            if !spec.reference.file().starts_with(layout.domain_docs.trim_end_matches('/')) {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::SchemaViolation,
                    reference.as_str(),
                    format!("{} is outside {}", spec.reference.file(), layout.domain_docs),
                ));
                continue;
            }
            if store.contains(&reference) {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::DuplicateId,
                    reference.as_str(),
                    format!("{} already exists", spec.reference.anchor()),
                ));
                continue;
            }
            store.append_domain_section(spec);
            touched.insert(spec.reference.file().to_string());
            changes.push(DeltaChange::new(ChangeType::Add, reference));
        }
        for file in &touched {
            if let Some(doc) = store.document(file) {
                writes.insert(file.as_str(), doc.source.clone());
            }
        }

        if !drafts.trace_links.is_empty() {
            for link in &drafts.trace_links {
                store.push_trace_link(link.clone());
            }
            let links = TraceLinks {
                links: store.trace_links().to_vec(),
            };
            match serde_yaml::to_string(&links) {
                Ok(yaml) => writes.insert(layout.trace_links.as_str(), yaml),
                Err(e) => diagnostics.push(Diagnostic::new(
                    ErrorCode::MalformedDocument,
                    layout.trace_links.as_str(),
                    e.to_string(),
                )),
            }
        }

        let id = match DeltaId::next_for(self.date, store.deltas().iter().map(|l| l.record.id.as_str())) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::new(ErrorCode::PatternMismatch, DRAFTS_SUBJECT, e.to_string()));
                return Candidate {
                    store,
                    delta: empty_delta(String::new()),
                    writes,
                    diagnostics,
                };
            }
        };
        let title = drafts
            .title
            .clone()
            .unwrap_or_else(|| format!("Ingest {} artifact(s)", changes.len()));
        let delta = changes
            .into_iter()
            .fold(
                DeltaBuilder::new().id(id).title(title).status(DeltaStatus::Proposed),
                DeltaBuilder::change,
            )
            .build();
        let delta = match delta {
            Ok(delta) => delta,
            Err(e) => {
                diagnostics.push(Diagnostic::new(ErrorCode::MissingField, DRAFTS_SUBJECT, e.to_string()));
                empty_delta(id.to_string())
            }
        };
        let delta_path = layout.delta_path(&delta.id);
        match serde_yaml::to_string(&delta) {
            Ok(yaml) => writes.insert(delta_path.as_str(), yaml),
            Err(e) => diagnostics.push(Diagnostic::new(ErrorCode::MalformedDocument, delta.id.as_str(), e.to_string())),
        }
        store.insert_delta(delta_path, delta.clone());

        Candidate {
            store,
            delta,
            writes,
            diagnostics,
        }
    }

    /// Violations `drafts` would introduce
    #[must_use]
    pub fn check(&self, drafts: &ArtifactDrafts) -> Vec<Diagnostic> {
        let candidate = self.stage(drafts);
        self.violations(&candidate)
    }

    fn violations(&self, candidate: &Candidate) -> Vec<Diagnostic> {
        let (_, found) = check_store(&candidate.store, None, self.workspace.config());
        let mut diagnostics = candidate.diagnostics.clone();
        diagnostics.extend(found.into_iter().filter(|d| !self.existing.contains(d)));
        ssot_model::normalize(&mut diagnostics);
        diagnostics
    }

    /// Run the collaborator through the validation gate
    ///
    /// Nothing is written; pass the outcome to [`Self::commit`].
    ///
    /// # Errors
    /// Returns error if the gate rejects every attempt or hits a fatal
    /// violation
    pub fn run<D>(&self, decomposer: &mut D, input: &D::Input) -> Result<IngestOutcome, CoreError>
    where
        D: Decomposer<Draft = ArtifactDrafts>,
    {
        let gate = ValidationGate::new().with_max_attempts(self.workspace.config().max_attempts());
        let context = self.workspace.decomposition_context();
        let outcome = gate.run(decomposer, &context, input, |drafts| self.check(drafts))?;
        let candidate = self.stage(&outcome.draft);
        info!(
            delta = %candidate.delta.id,
            files = candidate.writes.len(),
            attempts = outcome.attempts,
            "ingestion accepted"
        );
        Ok(IngestOutcome {
            delta: candidate.delta,
            writes: candidate.writes,
            attempts: outcome.attempts,
            history: outcome.history,
        })
    }

    /// Write every file of an accepted run, all or nothing
    ///
    /// # Errors
    /// Returns error if any file cannot be written
    pub fn commit(&self, outcome: &IngestOutcome) -> Result<Vec<PathBuf>, CoreError> {
        Ok(self.workspace.writer().commit(&outcome.writes)?)
    }
}

/// Stand-in delta for drafts that cannot produce one
fn empty_delta(id: String) -> Delta {
    Delta {
        id,
        title: String::new(),
        status: DeltaStatus::Proposed,
        changes: Vec::new(),
        superseded_by: None,
        compatibility: None,
        extra: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drafts_deserialize_camel_case() {
        let drafts: ArtifactDrafts = serde_yaml::from_str(
            "title: Login\nbusinessValues:\n  - id: BV-0002\nnfrs: []\ntraceLinks:\n  - {from: CAP-0002, to: BV-0002, type: realizes}\n",
        )
        .unwrap();
        assert_eq!(drafts.title.as_deref(), Some("Login"));
        assert_eq!(drafts.business_values, vec![json!({"id": "BV-0002"})]);
        assert_eq!(drafts.trace_links.len(), 1);
        assert!(!drafts.is_empty());
    }

    #[test]
    fn default_drafts_are_empty() {
        assert!(ArtifactDrafts::default().is_empty());
    }
}
