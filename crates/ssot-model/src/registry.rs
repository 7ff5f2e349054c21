//! Registry documents: domains, middleware, workspace repositories and the
//! per-repository index

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

static ENTRYPOINT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^entry(\.[A-Za-z0-9_-]+)+$").expect("valid entrypoint regex")
});

/// Prefix every middleware implementation entry must carry
pub const MIDDLEWARE_ENTRY_PREFIX: &str = "entry.middleware.";

/// Fixed quality gate catalog
pub const GATE_CATALOG: &[&str] = &[
    "qg.build",
    "qg.lint",
    "qg.format",
    "qg.tests.unit",
    "qg.tests.integration",
    "qg.tests.contract",
    "qg.arch.boundaries",
    "qg.security.deps",
    "qg.spec.validate",
];

/// Well-formed entrypoint id (`entry.core.auth`), never a path
#[must_use]
pub fn is_entrypoint_id(value: &str) -> bool {
    ENTRYPOINT_ID.is_match(value)
}

/// `domains.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainIndex {
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrypoints {
    pub core: String,
    pub container: String,
}

/// `DOM-####.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub repo_id: String,
    pub entrypoints: Entrypoints,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `workspace-registry.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRegistry {
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

impl WorkspaceRegistry {
    #[must_use]
    pub fn contains(&self, repo_id: &str) -> bool {
        self.repos.iter().any(|r| r.id == repo_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiddlewareCategory {
    Mandatory,
    Optional,
}

impl MiddlewareCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Optional => "optional",
        }
    }
}

impl Display for MiddlewareCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationRef {
    pub repo_id: String,
    pub entry: String,
}

/// One middleware registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareEntry {
    pub id: String,
    pub category: MiddlewareCategory,
    pub position: u32,
    /// Spec file name relative to the middleware directory
    pub spec: String,
    pub implementation: ImplementationRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Middleware index (`registry.yaml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareRegistry {
    #[serde(default)]
    pub middleware: Vec<MiddlewareEntry>,
}

impl MiddlewareRegistry {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MiddlewareEntry> {
        self.middleware.iter().find(|m| m.id == id)
    }
}

/// Metadata lines declared inside a middleware markdown spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareMetadata {
    pub id: Option<String>,
    pub category: Option<MiddlewareCategory>,
    pub position: Option<u32>,
    pub implementation: Option<ImplementationRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateRef {
    pub id: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `repo.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
    #[serde(default)]
    pub quality_gates: Vec<QualityGateRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
