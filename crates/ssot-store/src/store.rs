//! Artifact Store
//!
//! Loads the spec tree into typed records. Content problems (bad YAML, schema
//! violations, misplaced ids) become diagnostics and the offending record is
//! left out; only operational failures abort the load.
//!
//! Duplicate ids are kept so the graph builder can report them. Directories
//! are read in sorted order so every derived report is stable.

use crate::error::StoreError;
use crate::layout::{join, Layout};
use crate::parsers::{parse_middleware_metadata, MarkdownDocument, MarkdownParser, SourceParser, YamlParser};
use crate::schema::{SchemaCatalog, SchemaKind};
use serde_json::Value;
use ssot_model::{
    AnchorRef, ArtifactKind, Delta, Diagnostic, DomainIndex, DomainRecord, DomainSpec, ErrorCode,
    MiddlewareMetadata, MiddlewareRegistry, RepoIndex, Requirement, TraceLink, TraceLinks,
    WorkspaceRegistry,
};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

const REQUIREMENT_KINDS: [ArtifactKind; 4] = [
    ArtifactKind::BusinessValue,
    ArtifactKind::Capability,
    ArtifactKind::BusinessRule,
    ArtifactKind::Nfr,
];

/// A record together with the relative path it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub path: String,
    pub record: T,
}

impl<T> Loaded<T> {
    pub fn new(path: impl Into<String>, record: T) -> Self {
        Self {
            path: path.into(),
            record,
        }
    }
}

/// In-memory view of one spec tree
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    root: PathBuf,
    layout: Layout,
    requirements: Vec<Loaded<Requirement>>,
    trace_links: Vec<TraceLink>,
    documents: BTreeMap<String, MarkdownDocument>,
    deltas: Vec<Loaded<Delta>>,
    domain_index: Option<DomainIndex>,
    domains: Vec<Loaded<DomainRecord>>,
    domain_files: Vec<String>,
    middleware: Option<MiddlewareRegistry>,
    middleware_docs: BTreeMap<String, MiddlewareMetadata>,
    workspace: Option<WorkspaceRegistry>,
    repo_index: Option<RepoIndex>,
    repo_index_raw: Option<Value>,
    diagnostics: Vec<Diagnostic>,
}

impl ArtifactStore {
    /// Load the spec tree under `root`
    ///
    /// # Errors
    /// Returns error if the root is missing or a file cannot be read
    pub fn load(
        root: impl Into<PathBuf>,
        layout: &Layout,
        catalog: &SchemaCatalog,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::MissingRoot(root));
        }
        let mut loader = Loader {
            root: &root,
            catalog,
            store: ArtifactStore {
                root: root.clone(),
                layout: layout.clone(),
                ..ArtifactStore::default()
            },
        };
        loader.load_requirements()?;
        loader.load_trace_links()?;
        loader.load_documents()?;
        loader.load_deltas()?;
        loader.load_domains()?;
        loader.load_middleware()?;
        loader.load_registries()?;

        let store = loader.store;
        info!(
            root = %store.root.display(),
            requirements = store.requirements.len(),
            trace_links = store.trace_links.len(),
            documents = store.documents.len(),
            deltas = store.deltas.len(),
            diagnostics = store.diagnostics.len(),
            "loaded spec tree"
        );
        Ok(store)
    }

    /// Empty store rooted at `root`, for building candidates in memory
    #[must_use]
    pub fn empty(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Every loaded requirement, duplicates included, in load order
    #[must_use]
    pub fn requirements(&self) -> &[Loaded<Requirement>] {
        &self.requirements
    }

    /// First requirement declaring `id`
    #[must_use]
    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements
            .iter()
            .map(|l| &l.record)
            .find(|r| r.id() == id)
    }

    #[must_use]
    pub fn trace_links(&self) -> &[TraceLink] {
        &self.trace_links
    }

    /// Markdown documents keyed by relative path
    #[must_use]
    pub fn documents(&self) -> &BTreeMap<String, MarkdownDocument> {
        &self.documents
    }

    #[must_use]
    pub fn document(&self, path: &str) -> Option<&MarkdownDocument> {
        self.documents.get(path)
    }

    /// Detail record of an anchored CMD/EVT section
    #[must_use]
    pub fn domain_spec(&self, reference: &AnchorRef) -> Option<DomainSpec> {
        let doc = self.documents.get(reference.file())?;
        doc.domain_specs()
            .into_iter()
            .find(|spec| spec.reference == *reference)
    }

    /// All anchored sections across every document, in path then source order
    #[must_use]
    pub fn domain_specs(&self) -> Vec<DomainSpec> {
        self.documents
            .values()
            .flat_map(MarkdownDocument::domain_specs)
            .collect()
    }

    #[must_use]
    pub fn deltas(&self) -> &[Loaded<Delta>] {
        &self.deltas
    }

    /// First delta declaring `id`
    #[must_use]
    pub fn delta(&self, id: &str) -> Option<&Loaded<Delta>> {
        self.deltas.iter().find(|l| l.record.id == id)
    }

    #[must_use]
    pub fn domain_index(&self) -> Option<&DomainIndex> {
        self.domain_index.as_ref()
    }

    #[must_use]
    pub fn domains(&self) -> &[Loaded<DomainRecord>] {
        &self.domains
    }

    /// Every `DOM-*.yaml` file in the domain registry, loaded or not
    #[must_use]
    pub fn domain_files(&self) -> &[String] {
        &self.domain_files
    }

    #[must_use]
    pub fn domain(&self, id: &str) -> Option<&DomainRecord> {
        self.domains.iter().map(|l| &l.record).find(|d| d.id == id)
    }

    #[must_use]
    pub fn middleware(&self) -> Option<&MiddlewareRegistry> {
        self.middleware.as_ref()
    }

    /// Metadata of middleware spec files, keyed by file name
    #[must_use]
    pub fn middleware_docs(&self) -> &BTreeMap<String, MiddlewareMetadata> {
        &self.middleware_docs
    }

    #[must_use]
    pub fn workspace(&self) -> Option<&WorkspaceRegistry> {
        self.workspace.as_ref()
    }

    #[must_use]
    pub fn repo_index(&self) -> Option<&RepoIndex> {
        self.repo_index.as_ref()
    }

    /// `repo.yaml` as written, for content rules the typed record hides
    #[must_use]
    pub fn repo_index_raw(&self) -> Option<&Value> {
        self.repo_index_raw.as_ref()
    }

    /// Structural problems found while loading
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Every id currently held, across requirements and anchored sections
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        if self.requirement(id).is_some() {
            return true;
        }
        match id.parse::<AnchorRef>() {
            Ok(reference) => self
                .documents
                .get(reference.file())
                .is_some_and(|doc| doc.has_anchor(reference.anchor())),
            Err(_) => false,
        }
    }

    /// Add or replace a requirement record
    pub fn insert_requirement(&mut self, path: impl Into<String>, record: Requirement) {
        let path = path.into();
        self.requirements.retain(|l| l.path != path);
        self.requirements.push(Loaded::new(path, record));
    }

    /// Append an anchored section, creating the document when needed
    pub fn append_domain_section(&mut self, spec: &DomainSpec) {
        let file = spec.reference.file().to_string();
        let doc = self.documents.entry(file.clone()).or_insert_with(|| MarkdownDocument {
            path: file,
            source: String::new(),
            anchors: Vec::new(),
        });
        doc.append_section(spec);
    }

    pub fn push_trace_link(&mut self, link: TraceLink) {
        self.trace_links.push(link);
    }

    /// Add or replace a delta record
    pub fn insert_delta(&mut self, path: impl Into<String>, delta: Delta) {
        let path = path.into();
        self.deltas.retain(|l| l.path != path);
        self.deltas.push(Loaded::new(path, delta));
    }

    pub fn extend_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }
}

struct Loader<'a> {
    root: &'a Path,
    catalog: &'a SchemaCatalog,
    store: ArtifactStore,
}

impl Loader<'_> {
    fn load_requirements(&mut self) -> Result<(), StoreError> {
        for kind in REQUIREMENT_KINDS {
            let (Some(dir), Some(schema)) = (
                self.store.layout.requirement_dir(kind).map(str::to_string),
                SchemaKind::for_requirement(kind),
            ) else {
                continue;
            };
            for path in self.yaml_files(&dir)? {
                let Some(value) = self.read_yaml(&path, schema)? else {
                    continue;
                };
                if let Some(record) = self.typed(&path, value, |v| Requirement::from_value(kind, v)) {
                    debug!(path = %path, id = record.id(), "requirement");
                    self.store.requirements.push(Loaded::new(path, record));
                }
            }
        }
        Ok(())
    }

    fn load_trace_links(&mut self) -> Result<(), StoreError> {
        let path = self.store.layout.trace_links.clone();
        if !self.root.join(&path).is_file() {
            debug!(path = %path, "no trace links file");
            return Ok(());
        }
        if let Some(value) = self.read_yaml(&path, SchemaKind::TraceLinks)? {
            if let Some(links) = self.typed::<TraceLinks>(&path, value, serde_json::from_value) {
                self.store.trace_links = links.links;
            }
        }
        Ok(())
    }

    fn load_documents(&mut self) -> Result<(), StoreError> {
        let dir = self.store.layout.domain_docs.clone();
        for path in self.files(&dir, &MarkdownParser)? {
            self.load_document(&path)?;
        }

        // Capabilities may point at markdown outside the domain directory
        let referenced: Vec<String> = self
            .store
            .requirements
            .iter()
            .filter_map(|l| l.record.as_capability())
            .flat_map(|cap| cap.commands().iter().chain(cap.events()))
            .filter_map(|entry| entry.parse::<AnchorRef>().ok())
            .map(|reference| reference.file().to_string())
            .filter(|file| !self.store.documents.contains_key(file))
            .collect();
        for file in referenced {
            if is_inside(&file) && self.root.join(&file).is_file() && !self.store.documents.contains_key(&file) {
                self.load_document(&file)?;
            }
        }
        Ok(())
    }

    fn load_document(&mut self, path: &str) -> Result<(), StoreError> {
        let content = self.read(path)?;
        match MarkdownParser.parse(path, &content) {
            Ok(doc) => {
                debug!(path = %path, anchors = doc.anchors.len(), "document");
                self.store.documents.insert(path.to_string(), doc);
            }
            Err(e) => self.malformed(path, e.to_string()),
        }
        Ok(())
    }

    fn load_deltas(&mut self) -> Result<(), StoreError> {
        let dir = self.store.layout.deltas.clone();
        for path in self.yaml_files(&dir)? {
            let Some(value) = self.read_yaml(&path, SchemaKind::Delta)? else {
                continue;
            };
            if let Some(delta) = self.typed::<Delta>(&path, value, serde_json::from_value) {
                self.store.deltas.push(Loaded::new(path, delta));
            }
        }
        Ok(())
    }

    fn load_domains(&mut self) -> Result<(), StoreError> {
        let index_path = self.store.layout.domain_index.clone();
        if self.root.join(&index_path).is_file() {
            if let Some(value) = self.read_yaml(&index_path, SchemaKind::DomainIndex)? {
                self.store.domain_index = self.typed(&index_path, value, serde_json::from_value);
            }
        }

        let dir = self.store.layout.domain_registry.clone();
        for path in self.yaml_files(&dir)? {
            let name = file_name(&path);
            if path == index_path || name.ends_with("-template.yaml") || !name.starts_with("DOM-") {
                continue;
            }
            self.store.domain_files.push(path.clone());
            let Some(value) = self.read_yaml(&path, SchemaKind::Domain)? else {
                continue;
            };
            if let Some(record) = self.typed::<DomainRecord>(&path, value, serde_json::from_value) {
                self.store.domains.push(Loaded::new(path, record));
            }
        }
        Ok(())
    }

    fn load_middleware(&mut self) -> Result<(), StoreError> {
        let registry_path = self.store.layout.middleware_registry.clone();
        if self.root.join(&registry_path).is_file() {
            if let Some(value) = self.read_yaml(&registry_path, SchemaKind::MiddlewareRegistry)? {
                self.store.middleware = self.typed(&registry_path, value, serde_json::from_value);
            }
        }

        let dir = self.store.layout.middleware.clone();
        for path in self.files(&dir, &MarkdownParser)? {
            let content = self.read(&path)?;
            self.store
                .middleware_docs
                .insert(file_name(&path).to_string(), parse_middleware_metadata(&content));
        }
        Ok(())
    }

    fn load_registries(&mut self) -> Result<(), StoreError> {
        let workspace_path = self.store.layout.workspace_registry.clone();
        if self.root.join(&workspace_path).is_file() {
            if let Some(value) = self.read_yaml(&workspace_path, SchemaKind::WorkspaceRegistry)? {
                self.store.workspace = self.typed(&workspace_path, value, serde_json::from_value);
            }
        }

        let repo_path = self.store.layout.repo_index.clone();
        if self.root.join(&repo_path).is_file() {
            if let Some(value) = self.read_yaml(&repo_path, SchemaKind::RepoIndex)? {
                self.store.repo_index = self.typed(&repo_path, value.clone(), serde_json::from_value);
                self.store.repo_index_raw = Some(value);
            }
        }
        Ok(())
    }

    /// Parse and schema-check one YAML file; `None` when it is not a document
    fn read_yaml(&mut self, path: &str, schema: SchemaKind) -> Result<Option<Value>, StoreError> {
        let content = self.read(path)?;
        match YamlParser.parse(path, &content) {
            Ok(value) => {
                let issues = self.catalog.check(schema, path, &value);
                self.store.diagnostics.extend(issues);
                Ok(Some(value))
            }
            Err(e) => {
                self.malformed(path, e.to_string());
                Ok(None)
            }
        }
    }

    /// Convert to a typed record; a failure the schema did not already report is malformed
    fn typed<T>(
        &mut self,
        path: &str,
        value: Value,
        convert: impl FnOnce(Value) -> Result<T, serde_json::Error>,
    ) -> Option<T> {
        match convert(value) {
            Ok(record) => Some(record),
            Err(e) => {
                let reported = self.store.diagnostics.iter().any(|d| d.subject == path);
                if !reported {
                    self.malformed(path, e.to_string());
                }
                None
            }
        }
    }

    fn malformed(&mut self, path: &str, message: String) {
        self.store
            .diagnostics
            .push(Diagnostic::new(ErrorCode::MalformedDocument, path, message));
    }

    fn read(&self, path: &str) -> Result<String, StoreError> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| StoreError::io_error(full, e))
    }

    fn yaml_files(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        self.files(dir, &YamlParser)
    }

    /// Files directly under `dir` the parser accepts, sorted by name
    fn files<P: SourceParser>(&self, dir: &str, parser: &P) -> Result<Vec<String>, StoreError> {
        let full = self.root.join(dir);
        if !full.is_dir() {
            debug!(dir = %dir, "directory absent");
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&full).map_err(|e| StoreError::io_error(&full, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io_error(&full, e))?;
            let path = entry.path();
            if path.is_file() && parser.can_parse(&path) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(join(dir, name));
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Relative path that stays inside the root
fn is_inside(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
