//! Directory-per-kind layout of the spec tree
//!
//! All paths are relative to the repository root and use `/` separators, the
//! same form trace references use (`specs/domain/commands.md#CMD-0001`).

use serde::{Deserialize, Serialize};
use ssot_model::ArtifactKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub business_values: String,
    pub capabilities: String,
    pub business_rules: String,
    pub nfr: String,
    pub trace_links: String,
    pub domain_docs: String,
    pub deltas: String,
    pub domain_registry: String,
    pub domain_index: String,
    pub middleware: String,
    pub middleware_registry: String,
    pub workspace_registry: String,
    pub repo_index: String,
    pub schemas: String,
    pub tasks: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            business_values: "specs/requirements/business-values".to_string(),
            capabilities: "specs/requirements/capabilities".to_string(),
            business_rules: "specs/requirements/business-rules".to_string(),
            nfr: "specs/requirements/nfr".to_string(),
            trace_links: "specs/requirements/trace-links.yaml".to_string(),
            domain_docs: "specs/domain".to_string(),
            deltas: "specs/deltas".to_string(),
            domain_registry: "specs/architecture/domain".to_string(),
            domain_index: "specs/architecture/domain/domains.yaml".to_string(),
            middleware: "specs/architecture/middleware".to_string(),
            middleware_registry: "specs/architecture/middleware/registry.yaml".to_string(),
            workspace_registry: "specs/registry/workspace-registry.yaml".to_string(),
            repo_index: "repo.yaml".to_string(),
            schemas: "specs/schemas".to_string(),
            tasks: "tasks".to_string(),
        }
    }
}

impl Layout {
    /// Directory holding one file per record of `kind`
    #[must_use]
    pub fn requirement_dir(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::BusinessValue => Some(&self.business_values),
            ArtifactKind::Capability => Some(&self.capabilities),
            ArtifactKind::BusinessRule => Some(&self.business_rules),
            ArtifactKind::Nfr => Some(&self.nfr),
            _ => None,
        }
    }

    /// Storage path of a requirement record
    #[must_use]
    pub fn requirement_path(&self, kind: ArtifactKind, id: &str) -> Option<String> {
        self.requirement_dir(kind).map(|dir| join(dir, &format!("{id}.yaml")))
    }

    /// Domain markdown file for commands or events
    #[must_use]
    pub fn domain_doc(&self, kind: ArtifactKind) -> Option<String> {
        match kind {
            ArtifactKind::Command => Some(join(&self.domain_docs, "commands.md")),
            ArtifactKind::Event => Some(join(&self.domain_docs, "events.md")),
            _ => None,
        }
    }

    /// Storage path of a delta record
    #[must_use]
    pub fn delta_path(&self, id: &str) -> String {
        join(&self.deltas, &format!("{id}.yaml"))
    }
}

/// Join two relative path fragments with a single `/`
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
