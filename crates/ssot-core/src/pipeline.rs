//! Validation pipeline
//!
//! A [`Workspace`] is one loaded spec tree (plus an optional baseline) and
//! the configuration it was loaded with. It is rebuilt from disk on every
//! invocation and never mutated in place.

use crate::config::SsotConfig;
use crate::error::CoreError;
use crate::gate::DecompositionContext;
use crate::impact::{ImpactReport, ImpactResolver};
use crate::ledger::DeltaLedger;
use crate::registry::RegistryCrossLinker;
use crate::report::{ReportSummary, ValidationReport};
use ssot_graph::BuiltGraph;
use ssot_model::{Delta, DeltaStatus, Diagnostic};
use ssot_store::{ArtifactStore, ArtifactWriter, SchemaCatalog, SchemaKind, WriteSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Every check over one store: load diagnostics, graph, registries, ledger
///
/// With a baseline the ledger compares against it and mandatory middleware
/// positions are pinned.
#[must_use]
pub fn check_store(
    store: &ArtifactStore,
    baseline: Option<&ArtifactStore>,
    config: &SsotConfig,
) -> (BuiltGraph, Vec<Diagnostic>) {
    let mut diagnostics = store.diagnostics().to_vec();
    let built = ssot_graph::validate(store);
    diagnostics.extend(built.diagnostics.iter().cloned());

    let linker = RegistryCrossLinker::new(store).with_gate_catalog(config.gate_catalog());
    diagnostics.extend(linker.check_all());

    let mut ledger = DeltaLedger::new(store);
    if let Some(baseline) = baseline {
        ledger = ledger.with_baseline(baseline);
        diagnostics.extend(linker.check_positions_against(baseline));
    }
    diagnostics.extend(ledger.check());
    (built, diagnostics)
}

/// Result of [`Workspace::validate`]
#[derive(Debug, Clone)]
pub struct Validation {
    pub graph: BuiltGraph,
    pub report: ValidationReport,
}

/// A loaded spec tree
#[derive(Debug)]
pub struct Workspace {
    config: SsotConfig,
    catalog: SchemaCatalog,
    store: ArtifactStore,
    baseline: Option<ArtifactStore>,
}

impl Workspace {
    /// Load the tree under `root`
    ///
    /// # Errors
    /// Returns error if the root is missing, a schema override is broken or a
    /// file cannot be read
    pub fn open(root: impl AsRef<Path>, config: SsotConfig) -> Result<Self, CoreError> {
        let root = root.as_ref();
        let catalog = SchemaCatalog::load(&root.join(&config.layout.schemas))?;
        let store = ArtifactStore::load(root, &config.layout, &catalog)?;
        Ok(Self {
            config,
            catalog,
            store,
            baseline: None,
        })
    }

    /// Load a prior version of the tree to compare against
    ///
    /// # Errors
    /// Returns error if the baseline cannot be loaded
    pub fn with_baseline(mut self, dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        let baseline = ArtifactStore::load(dir.as_ref(), &self.config.layout, &self.catalog)?;
        self.baseline = Some(baseline);
        Ok(self)
    }

    #[must_use]
    pub fn config(&self) -> &SsotConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    #[must_use]
    pub fn baseline(&self) -> Option<&ArtifactStore> {
        self.baseline.as_ref()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Full validation pipeline
    #[must_use]
    pub fn validate(&self) -> Validation {
        let (graph, diagnostics) = check_store(&self.store, self.baseline.as_ref(), &self.config);
        let summary = ReportSummary {
            requirements: self.store.requirements().len(),
            documents: self.store.documents().len(),
            deltas: self.store.deltas().len(),
            nodes: graph.graph.node_count(),
            edges: graph.graph.edge_count(),
        };
        let report = ValidationReport::new(diagnostics, summary);
        info!(
            ok = report.is_ok(),
            violations = report.diagnostics().len(),
            digest = %report.digest(),
            "validation finished"
        );
        Validation { graph, report }
    }

    /// Impact units for an applied delta
    ///
    /// # Errors
    /// Returns error if the delta is unknown or not applied
    pub fn impact(&self, delta_id: &str) -> Result<ImpactReport, CoreError> {
        let built = ssot_graph::validate(&self.store);
        let mut resolver = ImpactResolver::new(&self.store, &built.graph);
        if let Some(baseline) = &self.baseline {
            resolver = resolver.with_baseline(baseline);
        }
        resolver.resolve(delta_id)
    }

    /// Move a delta to `to` and rewrite its file
    ///
    /// Returns the updated record and the path written.
    ///
    /// # Errors
    /// Returns error if the ledger rejects the move or the write fails
    pub fn advance_delta(&self, id: &str, to: DeltaStatus) -> Result<(Delta, PathBuf), CoreError> {
        let ledger = DeltaLedger::new(&self.store);
        let delta = ledger.advance(id, to)?;
        let path = self
            .store
            .delta(id)
            .map(|l| l.path.clone())
            .ok_or_else(|| CoreError::UnknownDelta(id.to_string()))?;
        let set = WriteSet::new().with_file(path.as_str(), serde_yaml::to_string(&delta)?);
        let mut written = self.writer().commit(&set)?;
        let written = written.pop().unwrap_or_else(|| self.root().join(&path));
        Ok((delta, written))
    }

    #[must_use]
    pub fn writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(self.root())
    }

    /// Context handed to the decomposition collaborator
    #[must_use]
    pub fn decomposition_context(&self) -> DecompositionContext {
        let built = ssot_graph::validate(&self.store);
        let mut existing_ids: Vec<String> = self
            .store
            .requirements()
            .iter()
            .map(|l| l.record.id().to_string())
            .chain(self.store.domain_specs().into_iter().map(|s| s.reference.to_string()))
            .chain(self.store.deltas().iter().map(|l| l.record.id.clone()))
            .collect();
        existing_ids.sort();
        existing_ids.dedup();
        let domains = self.store.domains().iter().map(|l| l.record.id.clone()).collect();
        let trace_edges = built
            .graph
            .edges()
            .into_iter()
            .map(|e| (e.from, e.kind.as_str().to_string(), e.to))
            .collect();
        let schemas = SchemaKind::ALL
            .iter()
            .filter_map(|kind| Some((kind.stem().to_string(), self.catalog.source(*kind)?.clone())))
            .collect();
        DecompositionContext {
            existing_ids,
            domains,
            trace_edges,
            schemas,
        }
    }
}
