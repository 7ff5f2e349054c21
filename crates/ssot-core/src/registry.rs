//! Registry Cross-Linker
//!
//! Referential chains layered on top of the traceability graph:
//! 1. Domain registry: index and detail files agree, repositories are
//!    registered, entrypoints are ids rather than paths
//! 2. Middleware registry: positions unique and strictly increasing, spec
//!    files exist and agree with the index
//! 3. Per-repository index: quality gates come from the catalog and nothing
//!    in it looks like a shell command
//!
//! Every check accumulates; nothing short-circuits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use ssot_model::{is_entrypoint_id, Diagnostic, ErrorCode, MiddlewareCategory, MIDDLEWARE_ENTRY_PREFIX};
use ssot_store::ArtifactStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Keys whose presence alone marks a command
const COMMAND_KEYS: &[&str] = &["command", "cmd", "run", "script", "exec", "shell"];

static SHELL_PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[$>#]\s+\S").expect("valid prompt regex"));

static TOOL_INVOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(cargo|npm|npx|pnpm|yarn|make|python3?|pip|bash|sh|zsh|docker|kubectl|git|go|mvn|gradle|dotnet|node|curl|wget|rm|chmod)(\s|$)",
    )
    .expect("valid tool regex")
});

static COMMAND_CHAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&&|\|\||;\s*\S").expect("valid chain regex"));

/// Whether a string value reads like a shell command
#[must_use]
pub fn looks_like_command(value: &str) -> bool {
    SHELL_PROMPT.is_match(value) || TOOL_INVOCATION.is_match(value) || COMMAND_CHAIN.is_match(value)
}

/// Cross-registry checks over one store
#[derive(Debug)]
pub struct RegistryCrossLinker<'a> {
    store: &'a ArtifactStore,
    gate_catalog: BTreeSet<String>,
}

impl<'a> RegistryCrossLinker<'a> {
    /// Linker using the fixed gate catalog
    #[must_use]
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self {
            store,
            gate_catalog: ssot_model::GATE_CATALOG.iter().map(ToString::to_string).collect(),
        }
    }

    /// Replace the gate catalog
    #[inline]
    #[must_use]
    pub fn with_gate_catalog(mut self, catalog: BTreeSet<String>) -> Self {
        self.gate_catalog = catalog;
        self
    }

    /// Run every registry check
    #[must_use]
    pub fn check_all(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.check_workspace();
        diagnostics.extend(self.check_domains());
        diagnostics.extend(self.check_middleware());
        diagnostics.extend(self.check_repo_index());
        info!(diagnostics = diagnostics.len(), "cross-linked registries");
        diagnostics
    }

    /// Repository ids are unique
    #[must_use]
    pub fn check_workspace(&self) -> Vec<Diagnostic> {
        let Some(workspace) = self.store.workspace() else {
            return Vec::new();
        };
        let path = &self.store.layout().workspace_registry;
        let mut seen = BTreeSet::new();
        let mut diagnostics = Vec::new();
        for (position, repo) in workspace.repos.iter().enumerate() {
            if !seen.insert(repo.id.as_str()) {
                diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::DuplicateId,
                        path.as_str(),
                        format!("repository {} is registered more than once", repo.id),
                    )
                    .at(format!("/repos/{position}/id")),
                );
            }
        }
        diagnostics
    }

    /// Domain index against detail files and the workspace registry
    #[must_use]
    pub fn check_domains(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let index_path = &self.store.layout().domain_index;
        let listed: Vec<&str> = self
            .store
            .domain_index()
            .map(|index| index.domains.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut seen = BTreeSet::new();
        for (position, id) in listed.iter().enumerate() {
            if !seen.insert(*id) {
                diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::DuplicateId,
                        *id,
                        format!("{id} is listed more than once in {index_path}"),
                    )
                    .at(format!("/domains/{position}")),
                );
            }
        }

        let stems: BTreeMap<&str, &str> = self
            .store
            .domain_files()
            .iter()
            .map(|path| (file_stem(path), path.as_str()))
            .collect();
        for id in &seen {
            if !stems.contains_key(id) && self.store.domain(id).is_none() {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::MissingRegistryRecord,
                    *id,
                    format!("{id} is listed in {index_path} but has no detail record"),
                ));
            }
        }
        for (stem, path) in &stems {
            if !seen.contains(stem) {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::OrphanRegistryEntry,
                    *stem,
                    format!("{path} is not listed in {index_path}"),
                ));
            }
        }

        for loaded in self.store.domains() {
            let domain = &loaded.record;
            if !self.repo_registered(&domain.repo_id) {
                diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::UnknownRepository,
                        domain.id.as_str(),
                        format!("repository {} is not in the workspace registry", domain.repo_id),
                    )
                    .at("/repoId"),
                );
            }
            for (field, value) in [
                ("core", &domain.entrypoints.core),
                ("container", &domain.entrypoints.container),
            ] {
                if !is_entrypoint_id(value) {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::MalformedEntrypoint,
                            domain.id.as_str(),
                            format!("entrypoints.{field} '{value}' is not an entrypoint id"),
                        )
                        .at(format!("/entrypoints/{field}")),
                    );
                }
            }
        }
        debug!(domains = self.store.domains().len(), "checked domain registry");
        diagnostics
    }

    /// Middleware index: ordering, spec files, metadata, implementations
    #[must_use]
    pub fn check_middleware(&self) -> Vec<Diagnostic> {
        let Some(registry) = self.store.middleware() else {
            return Vec::new();
        };
        let mut diagnostics = Vec::new();
        let mut previous: Option<(u32, &str)> = None;

        for (position, entry) in registry.middleware.iter().enumerate() {
            let pointer = format!("/middleware/{position}");
            if let Some((last, last_id)) = previous {
                if entry.position == last {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::DuplicatePosition,
                            entry.id.as_str(),
                            format!("position {} is already taken by {last_id}", entry.position),
                        )
                        .at(format!("{pointer}/position")),
                    );
                } else if entry.position < last {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::NonIncreasingPosition,
                            entry.id.as_str(),
                            format!("position {} follows {last_id} at {last}", entry.position),
                        )
                        .at(format!("{pointer}/position")),
                    );
                }
            }
            if previous.map_or(true, |(last, _)| entry.position > last) {
                previous = Some((entry.position, entry.id.as_str()));
            }

            let spec_name = file_name(&entry.spec);
            match self.store.middleware_docs().get(spec_name) {
                None => diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::MissingMiddlewareSpec,
                        entry.id.as_str(),
                        format!("spec file {} does not exist", entry.spec),
                    )
                    .at(format!("{pointer}/spec")),
                ),
                Some(meta) => {
                    let mut mismatch = |field: &str, declared: String| {
                        diagnostics.push(
                            Diagnostic::new(
                                ErrorCode::MetadataMismatch,
                                entry.id.as_str(),
                                format!("{} declares {field} {declared}", entry.spec),
                            )
                            .at(format!("{pointer}/{field}")),
                        );
                    };
                    if let Some(id) = meta.id.as_ref().filter(|id| **id != entry.id) {
                        mismatch("id", id.clone());
                    }
                    if let Some(category) = meta.category.filter(|c| *c != entry.category) {
                        mismatch("category", category.to_string());
                    }
                    if let Some(declared) = meta.position.filter(|p| *p != entry.position) {
                        mismatch("position", declared.to_string());
                    }
                }
            }

            let implementation = &entry.implementation;
            if !implementation.entry.starts_with(MIDDLEWARE_ENTRY_PREFIX)
                || !is_entrypoint_id(&implementation.entry)
            {
                diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::MalformedEntrypoint,
                        entry.id.as_str(),
                        format!(
                            "implementation entry '{}' must be an id starting with {MIDDLEWARE_ENTRY_PREFIX}",
                            implementation.entry
                        ),
                    )
                    .at(format!("{pointer}/implementation/entry")),
                );
            }
            if !self.repo_registered(&implementation.repo_id) {
                diagnostics.push(
                    Diagnostic::new(
                        ErrorCode::UnknownRepository,
                        entry.id.as_str(),
                        format!("repository {} is not in the workspace registry", implementation.repo_id),
                    )
                    .at(format!("{pointer}/implementation/repoId")),
                );
            }
        }
        diagnostics
    }

    /// `repo.yaml`: catalog membership and no executable content
    #[must_use]
    pub fn check_repo_index(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let path = self.store.layout().repo_index.as_str();
        if let Some(index) = self.store.repo_index() {
            for (position, gate) in index.quality_gates.iter().enumerate() {
                if !self.gate_catalog.contains(&gate.id) {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::UnknownQualityGate,
                            path,
                            format!("quality gate {} is not in the catalog", gate.id),
                        )
                        .at(format!("/qualityGates/{position}/id")),
                    );
                }
            }
            if let Some(repo_id) = &index.repo_id {
                if !self.repo_registered(repo_id) {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::UnknownRepository,
                            path,
                            format!("repository {repo_id} is not in the workspace registry"),
                        )
                        .at("/repoId"),
                    );
                }
            }
        }
        if let Some(raw) = self.store.repo_index_raw() {
            let mut found = Vec::new();
            find_commands(raw, String::new(), &mut found);
            diagnostics.extend(found.into_iter().map(|(pointer, reason)| {
                Diagnostic::new(ErrorCode::ExecutableCommand, path, reason).at(pointer)
            }));
        }
        diagnostics
    }

    /// Mandatory middleware keeps its position relative to `baseline`
    #[must_use]
    pub fn check_positions_against(&self, baseline: &ArtifactStore) -> Vec<Diagnostic> {
        let (Some(current), Some(prior)) = (self.store.middleware(), baseline.middleware()) else {
            return Vec::new();
        };
        prior
            .middleware
            .iter()
            .filter(|entry| entry.category == MiddlewareCategory::Mandatory)
            .filter_map(|before| {
                let after = current.get(&before.id)?;
                (after.position != before.position).then(|| {
                    Diagnostic::new(
                        ErrorCode::ImmutablePosition,
                        before.id.as_str(),
                        format!(
                            "mandatory middleware moved from position {} to {}",
                            before.position, after.position
                        ),
                    )
                })
            })
            .collect()
    }

    /// Absent workspace registry means no repository resolves
    fn repo_registered(&self, repo_id: &str) -> bool {
        self.store.workspace().is_some_and(|w| w.contains(repo_id))
    }
}

fn find_commands(value: &Value, pointer: String, found: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_pointer = format!("{pointer}/{}", escape_pointer(key));
                if COMMAND_KEYS.contains(&key.to_lowercase().as_str()) {
                    found.push((child_pointer, format!("key '{key}' declares an executable command")));
                    continue;
                }
                find_commands(child, child_pointer, found);
            }
        }
        Value::Array(items) => {
            for (position, child) in items.iter().enumerate() {
                find_commands(child, format!("{pointer}/{position}"), found);
            }
        }
        Value::String(text) if looks_like_command(text) => {
            found.push((pointer, format!("value '{text}' looks like a shell command")));
        }
        _ => {}
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}
