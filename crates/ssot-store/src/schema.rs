//! Schema Validator
//!
//! Every persisted record kind has a draft-07 JSON schema. The built-in
//! catalog can be overridden per kind by dropping `<kind>.schema.json` into
//! the schema directory of the layout.
//!
//! Validation is pure: it reads the document and reports issues, each with a
//! JSON pointer and a machine-readable reason. Identifier/filename agreement is
//! a separate placement rule with its own code so callers can tell a broken
//! record apart from a misplaced one.

use crate::error::SchemaError;
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};
use ssot_model::{ArtifactKind, Diagnostic, ErrorCode};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Record kinds with a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaKind {
    BusinessValue,
    Capability,
    BusinessRule,
    Nfr,
    TraceLinks,
    Delta,
    Domain,
    DomainIndex,
    MiddlewareRegistry,
    WorkspaceRegistry,
    RepoIndex,
    TaskDrafts,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 12] = [
        SchemaKind::BusinessValue,
        SchemaKind::Capability,
        SchemaKind::BusinessRule,
        SchemaKind::Nfr,
        SchemaKind::TraceLinks,
        SchemaKind::Delta,
        SchemaKind::Domain,
        SchemaKind::DomainIndex,
        SchemaKind::MiddlewareRegistry,
        SchemaKind::WorkspaceRegistry,
        SchemaKind::RepoIndex,
        SchemaKind::TaskDrafts,
    ];

    #[must_use]
    pub fn stem(self) -> &'static str {
        match self {
            SchemaKind::BusinessValue => "bv",
            SchemaKind::Capability => "cap",
            SchemaKind::BusinessRule => "br",
            SchemaKind::Nfr => "nfr",
            SchemaKind::TraceLinks => "trace-links",
            SchemaKind::Delta => "delta",
            SchemaKind::Domain => "domain",
            SchemaKind::DomainIndex => "domain-index",
            SchemaKind::MiddlewareRegistry => "middleware-registry",
            SchemaKind::WorkspaceRegistry => "workspace-registry",
            SchemaKind::RepoIndex => "repo-index",
            SchemaKind::TaskDrafts => "task-drafts",
        }
    }

    /// Override file name inside the schema directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.schema.json", self.stem())
    }

    /// Schema for a requirement record kind
    #[must_use]
    pub fn for_requirement(kind: ArtifactKind) -> Option<Self> {
        match kind {
            ArtifactKind::BusinessValue => Some(SchemaKind::BusinessValue),
            ArtifactKind::Capability => Some(SchemaKind::Capability),
            ArtifactKind::BusinessRule => Some(SchemaKind::BusinessRule),
            ArtifactKind::Nfr => Some(SchemaKind::Nfr),
            _ => None,
        }
    }

    /// Whether the storage file stem must equal the declared id
    #[must_use]
    pub fn id_in_filename(self) -> bool {
        matches!(
            self,
            SchemaKind::BusinessValue
                | SchemaKind::Capability
                | SchemaKind::BusinessRule
                | SchemaKind::Nfr
                | SchemaKind::Domain
        )
    }

    fn builtin(self) -> Value {
        let status = json!({
            "type": "string",
            "enum": ["proposed", "approved", "implemented", "deprecated", "superseded"]
        });
        match self {
            SchemaKind::BusinessValue => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Business Value",
                "type": "object",
                "required": ["id", "title", "owner", "successMetric"],
                "properties": {
                    "id": { "type": "string", "pattern": "^BV-\\d{4}$" },
                    "title": { "type": "string", "minLength": 1 },
                    "owner": { "type": "string", "minLength": 1 },
                    "successMetric": { "type": "string", "minLength": 1 },
                    "description": { "type": "string" },
                    "status": status
                }
            }),
            SchemaKind::Capability => {
                let refs = |kind: &str| {
                    json!({
                        "type": "array",
                        "items": {
                            "type": "string",
                            "pattern": format!("^[^#\\s]+\\.md#{kind}-\\d{{4}}$")
                        }
                    })
                };
                json!({
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "title": "Capability",
                    "type": "object",
                    "required": ["id", "title", "status"],
                    "properties": {
                        "id": { "type": "string", "pattern": "^CAP-\\d{4}$" },
                        "title": { "type": "string", "minLength": 1 },
                        "description": { "type": "string" },
                        "status": status,
                        "trace": {
                            "type": "object",
                            "properties": {
                                "domain": {
                                    "type": "object",
                                    "properties": {
                                        "commands": refs("CMD"),
                                        "events": refs("EVT")
                                    }
                                }
                            }
                        }
                    }
                })
            }
            SchemaKind::BusinessRule => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Business Rule",
                "type": "object",
                "required": ["id", "title", "rule", "severity"],
                "properties": {
                    "id": { "type": "string", "pattern": "^BR-\\d{4}$" },
                    "title": { "type": "string", "minLength": 1 },
                    "rule": { "type": "string", "minLength": 1 },
                    "severity": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                    "status": status
                }
            }),
            SchemaKind::Nfr => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Non-Functional Requirement",
                "type": "object",
                "required": ["id", "title", "qualityAttribute", "statement"],
                "properties": {
                    "id": { "type": "string", "pattern": "^NFR-\\d{4}$" },
                    "title": { "type": "string", "minLength": 1 },
                    "qualityAttribute": { "type": "string", "minLength": 1 },
                    "statement": { "type": "string", "minLength": 1 },
                    "status": status
                }
            }),
            SchemaKind::TraceLinks => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Trace Links",
                "type": "object",
                "required": ["links"],
                "properties": {
                    "links": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["from", "to", "type"],
                            "properties": {
                                "from": { "type": "string", "minLength": 1 },
                                "to": { "type": "string", "minLength": 1 },
                                "type": { "type": "string", "enum": ["realizes", "satisfies", "constrains"] },
                                "rationale": { "type": "string" }
                            }
                        }
                    }
                }
            }),
            SchemaKind::Delta => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Delta",
                "type": "object",
                "required": ["id", "title", "status", "changes"],
                "properties": {
                    "id": { "type": "string", "pattern": "^DELTA-\\d{4}-\\d{2}-\\d{2}-\\d{3}$" },
                    "title": { "type": "string", "minLength": 1 },
                    "status": { "type": "string", "enum": ["draft", "proposed", "applied"] },
                    "supersededBy": { "type": "string", "pattern": "^DELTA-\\d{4}-\\d{2}-\\d{2}-\\d{3}$" },
                    "changes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["type", "target"],
                            "properties": {
                                "type": { "type": "string", "enum": ["add", "modify", "status", "deprecate", "docs"] },
                                "target": { "type": "string", "minLength": 1 },
                                "description": { "type": "string" }
                            }
                        }
                    },
                    "compatibility": {
                        "type": "object",
                        "required": ["claim"],
                        "properties": {
                            "claim": { "type": "string" },
                            "rationale": { "type": "string" }
                        }
                    }
                }
            }),
            SchemaKind::Domain => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Domain",
                "type": "object",
                "required": ["id", "repoId", "entrypoints"],
                "properties": {
                    "id": { "type": "string", "pattern": "^DOM-\\d{4}$" },
                    "name": { "type": "string" },
                    "repoId": { "type": "string", "minLength": 1 },
                    "entrypoints": {
                        "type": "object",
                        "required": ["core", "container"],
                        "properties": {
                            "core": { "type": "string" },
                            "container": { "type": "string" }
                        }
                    }
                }
            }),
            SchemaKind::DomainIndex => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Domain Index",
                "type": "object",
                "required": ["domains"],
                "properties": {
                    "domains": {
                        "type": "array",
                        "items": { "type": "string", "pattern": "^DOM-\\d{4}$" }
                    }
                }
            }),
            SchemaKind::MiddlewareRegistry => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Middleware Registry",
                "type": "object",
                "required": ["middleware"],
                "properties": {
                    "middleware": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id", "category", "position", "spec", "implementation"],
                            "properties": {
                                "id": { "type": "string", "pattern": "^mw\\.[A-Za-z0-9_]+$" },
                                "category": { "type": "string", "enum": ["mandatory", "optional"] },
                                "position": { "type": "integer", "minimum": 0 },
                                "spec": { "type": "string", "minLength": 1 },
                                "implementation": {
                                    "type": "object",
                                    "required": ["repoId", "entry"],
                                    "properties": {
                                        "repoId": { "type": "string", "minLength": 1 },
                                        "entry": { "type": "string", "minLength": 1 }
                                    }
                                },
                                "description": { "type": "string" }
                            }
                        }
                    }
                }
            }),
            SchemaKind::WorkspaceRegistry => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Workspace Registry",
                "type": "object",
                "required": ["repos"],
                "properties": {
                    "repos": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id"],
                            "properties": {
                                "id": { "type": "string", "minLength": 1 },
                                "url": { "type": "string" }
                            }
                        }
                    }
                }
            }),
            SchemaKind::RepoIndex => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Repository Index",
                "type": "object",
                "properties": {
                    "repoId": { "type": "string", "minLength": 1 },
                    "qualityGates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id"],
                            "properties": { "id": { "type": "string" } }
                        }
                    }
                }
            }),
            SchemaKind::TaskDrafts => json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Task Drafts",
                "type": "object",
                "required": ["tasks"],
                "properties": {
                    "tasks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["key", "title", "layer"],
                            "properties": {
                                "key": { "type": "string", "minLength": 1 },
                                "title": { "type": "string", "minLength": 1 },
                                "layer": {
                                    "type": "string",
                                    "enum": ["domain-core", "application", "adapter-in", "adapter-out", "middleware", "test"]
                                },
                                "domain": { "type": "string" },
                                "description": { "type": "string" },
                                "depends_on": { "type": "array", "items": { "type": "string" } },
                                "target_files": { "type": "array", "items": { "type": "string" } },
                                "acceptance_criteria": { "type": "array", "items": { "type": "string" } },
                                "source_artifacts": { "type": "array", "items": { "type": "string" } },
                                "contracts": { "type": "array", "items": { "type": "string" } },
                                "error_codes": { "type": "array", "items": { "type": "string" } },
                                "priority": { "type": "string", "enum": ["high", "medium", "low"] },
                                "quality_gates": { "type": "array", "items": { "type": "string" } }
                            }
                        }
                    }
                }
            }),
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// JSON pointer into the document (`""` for the root)
    pub pointer: String,
    pub code: ErrorCode,
    pub message: String,
}

impl SchemaIssue {
    /// Attach the issue to a subject (normally the record's storage path)
    #[must_use]
    pub fn into_diagnostic(self, subject: &str) -> Diagnostic {
        Diagnostic::new(self.code, subject, self.message).at(self.pointer)
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub errors: Vec<SchemaIssue>,
}

impl ValidationResult {
    fn from_issues(errors: Vec<SchemaIssue>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }

    #[must_use]
    pub fn into_diagnostics(self, subject: &str) -> Vec<Diagnostic> {
        self.errors
            .into_iter()
            .map(|issue| issue.into_diagnostic(subject))
            .collect()
    }
}

struct CompiledSchema {
    source: Value,
    compiled: JSONSchema,
}

impl CompiledSchema {
    fn compile(kind: SchemaKind, source: Value) -> Result<Self, SchemaError> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&source)
            .map_err(|e| SchemaError::Compile {
                kind,
                message: e.to_string(),
            })?;
        Ok(Self { source, compiled })
    }
}

/// Compiled schemas for every [`SchemaKind`]
pub struct SchemaCatalog {
    schemas: BTreeMap<SchemaKind, CompiledSchema>,
}

impl fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("kinds", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaCatalog {
    /// Catalog of the built-in schemas
    ///
    /// # Errors
    /// Returns error if a built-in schema fails to compile
    pub fn builtin() -> Result<Self, SchemaError> {
        let mut schemas = BTreeMap::new();
        for kind in SchemaKind::ALL {
            schemas.insert(kind, CompiledSchema::compile(kind, kind.builtin())?);
        }
        Ok(Self { schemas })
    }

    /// Built-in catalog with per-kind overrides from `dir`
    ///
    /// A missing directory or a missing override file keeps the built-in schema.
    ///
    /// # Errors
    /// Returns error if an override cannot be read, parsed or compiled
    pub fn load(dir: &Path) -> Result<Self, SchemaError> {
        let mut catalog = Self::builtin()?;
        for kind in SchemaKind::ALL {
            let path = dir.join(kind.file_name());
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|source| SchemaError::Io {
                path: path.clone(),
                source,
            })?;
            let source: Value = serde_json::from_str(&text).map_err(|source| SchemaError::Json {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(kind = %kind, path = %path.display(), "schema override");
            catalog.schemas.insert(kind, CompiledSchema::compile(kind, source)?);
        }
        Ok(catalog)
    }

    /// Schema document in use for `kind`
    #[must_use]
    pub fn source(&self, kind: SchemaKind) -> Option<&Value> {
        self.schemas.get(&kind).map(|s| &s.source)
    }

    /// Validate a document against the schema for `kind`
    #[must_use]
    pub fn validate(&self, kind: SchemaKind, document: &Value) -> ValidationResult {
        let Some(schema) = self.schemas.get(&kind) else {
            return ValidationResult::from_issues(Vec::new());
        };
        let mut issues = match schema.compiled.validate(document) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    let base = error.instance_path.to_string();
                    let (code, pointer) = match &error.kind {
                        ValidationErrorKind::Required { property } => {
                            let name = property.as_str().map_or_else(|| property.to_string(), str::to_string);
                            (ErrorCode::MissingField, format!("{base}/{name}"))
                        }
                        ValidationErrorKind::Type { .. } => (ErrorCode::WrongType, base),
                        ValidationErrorKind::Pattern { .. } => (ErrorCode::PatternMismatch, base),
                        ValidationErrorKind::Enum { .. } => (ErrorCode::UnknownEnumValue, base),
                        _ => (ErrorCode::SchemaViolation, base),
                    };
                    SchemaIssue {
                        pointer,
                        code,
                        message: error.to_string(),
                    }
                })
                .collect(),
        };
        issues.sort_by(|a, b| (&a.pointer, a.code).cmp(&(&b.pointer, b.code)));
        ValidationResult::from_issues(issues)
    }

    /// Schema check plus the placement rule, as diagnostics on `path`
    #[must_use]
    pub fn check(&self, kind: SchemaKind, path: &str, document: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = self.validate(kind, document).into_diagnostics(path);
        if kind.id_in_filename() {
            diagnostics.extend(check_placement(path, document).map(|i| i.into_diagnostic(path)));
        }
        diagnostics
    }
}

/// Declared `id` must equal the file stem of the storage path
///
/// A missing or non-string `id` is left to the schema.
#[must_use]
pub fn check_placement(path: &str, document: &Value) -> Option<SchemaIssue> {
    let declared = document.get("id")?.as_str()?;
    let stem = Path::new(path).file_stem()?.to_str()?;
    (declared != stem).then(|| SchemaIssue {
        pointer: "/id".to_string(),
        code: ErrorCode::IdMismatch,
        message: format!("declared id {declared} does not match file name {stem}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ssot_model::ErrorKind;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::builtin().unwrap()
    }

    #[test]
    fn builtin_schemas_compile() {
        let catalog = catalog();
        for kind in SchemaKind::ALL {
            assert!(catalog.source(kind).is_some(), "{kind}");
        }
    }

    #[test]
    fn valid_capability() {
        let doc = json!({
            "id": "CAP-0001",
            "title": "Issue tokens",
            "status": "implemented",
            "trace": { "domain": {
                "commands": ["specs/domain/commands.md#CMD-0001"],
                "events": ["specs/domain/events.md#EVT-0001"]
            }}
        });
        let result = catalog().validate(SchemaKind::Capability, &doc);
        assert!(result.ok, "{:?}", result.errors);
    }

    #[test]
    fn missing_field_points_at_property() {
        let doc = json!({ "id": "BV-0001", "title": "Revenue", "owner": "sales" });
        let result = catalog().validate(SchemaKind::BusinessValue, &doc);
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].pointer, "/successMetric");
        assert_eq!(result.errors[0].code, ErrorCode::MissingField);
    }

    #[test]
    fn reason_codes() {
        let doc = json!({
            "id": "BR-10",
            "title": "Cap",
            "rule": 7,
            "severity": "extreme"
        });
        let result = catalog().validate(SchemaKind::BusinessRule, &doc);
        let codes: Vec<_> = result.errors.iter().map(|e| (e.pointer.as_str(), e.code)).collect();
        assert_eq!(
            codes,
            vec![
                ("/id", ErrorCode::PatternMismatch),
                ("/rule", ErrorCode::WrongType),
                ("/severity", ErrorCode::UnknownEnumValue),
            ]
        );
    }

    #[test]
    fn validation_does_not_mutate() {
        let doc = json!({ "id": "NFR-0001" });
        let before = doc.clone();
        let _ = catalog().validate(SchemaKind::Nfr, &doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn placement_is_a_distinct_code() {
        let doc = json!({
            "id": "BV-0002",
            "title": "Revenue",
            "owner": "sales",
            "successMetric": "ARR"
        });
        let path = "specs/requirements/business-values/BV-0001.yaml";
        let diagnostics = catalog().check(SchemaKind::BusinessValue, path, &doc);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, ErrorCode::IdMismatch);
        assert_eq!(diagnostics[0].kind, ErrorKind::Structural);
        assert_eq!(diagnostics[0].subject, path);
    }

    #[test]
    fn delta_filename_is_free_form() {
        let doc = json!({
            "id": "DELTA-2026-02-11-001",
            "title": "Add login",
            "status": "draft",
            "changes": []
        });
        let diagnostics = catalog().check(SchemaKind::Delta, "specs/deltas/login.yaml", &doc);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn override_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("nfr.schema.json"),
            r#"{"type": "object", "required": ["id", "owner"]}"#,
        )
        .unwrap();
        let catalog = SchemaCatalog::load(dir.path()).unwrap();
        let result = catalog.validate(SchemaKind::Nfr, &json!({ "id": "NFR-0001" }));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].pointer, "/owner");
    }

    #[test]
    fn broken_override_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cap.schema.json"), "{not json").unwrap();
        assert!(matches!(
            SchemaCatalog::load(dir.path()),
            Err(SchemaError::Json { .. })
        ));
    }
}
