//! Testing utilities for the SSOT workspace
//!
//! Builds spec trees on disk inside a temporary directory.

#![allow(missing_docs)]

use serde_json::{json, Value};
use ssot_model::{Layer, TaskDraft};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

pub const COMMANDS_MD: &str = "specs/domain/commands.md";
pub const EVENTS_MD: &str = "specs/domain/events.md";

/// A spec tree written to a temporary directory, removed on drop
#[derive(Debug)]
pub struct SpecTree {
    dir: TempDir,
}

impl SpecTree {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root().join(relative)).unwrap()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.root().join(relative)).unwrap();
    }
}

/// Collects files for a [`SpecTree`]; later writes to a path replace earlier ones
#[derive(Debug, Clone, Default)]
pub struct SpecTreeBuilder {
    files: BTreeMap<String, String>,
    links: Vec<Value>,
    commands: Vec<String>,
    events: Vec<String>,
}

impl SpecTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree that passes every check
    pub fn valid() -> Self {
        Self::new()
            .with_workspace(&["identity", "platform"])
            .with_domain("DOM-0001", "identity")
            .with_domain_index(&["DOM-0001"])
            .with_command("CMD-0001", "RegisterUser", "DOM-0001")
            .with_event("EVT-0001", "UserRegistered", "DOM-0001")
            .with_business_value("BV-0001")
            .with_capability(
                "CAP-0001",
                "implemented",
                &[&format!("{COMMANDS_MD}#CMD-0001")],
                &[&format!("{EVENTS_MD}#EVT-0001")],
            )
            .with_business_rule("BR-0001")
            .with_nfr("NFR-0001")
            .with_link("CAP-0001", "BV-0001", "realizes")
            .with_link("BR-0001", "CAP-0001", "satisfies")
            .with_link("NFR-0001", "CAP-0001", "constrains")
            .with_middleware(&[
                ("mw.trace", "mandatory", 10),
                ("mw.auth", "mandatory", 20),
                ("mw.audit", "optional", 30),
            ])
            .with_repo_index(Some("identity"), &["qg.build", "qg.tests.unit"])
            .with_delta(
                "DELTA-2026-02-11-001",
                "applied",
                &[
                    ("add", "BV-0001"),
                    ("add", "CAP-0001"),
                    ("add", "BR-0001"),
                    ("add", "NFR-0001"),
                ],
            )
    }

    #[must_use]
    pub fn with_file(mut self, relative: &str, content: &str) -> Self {
        self.files.insert(relative.to_string(), content.to_string());
        self
    }

    #[must_use]
    pub fn with_yaml(self, relative: &str, value: &Value) -> Self {
        let content = serde_yaml::to_string(value).unwrap();
        self.with_file(relative, &content)
    }

    #[must_use]
    pub fn without_file(mut self, relative: &str) -> Self {
        self.files.remove(relative);
        self
    }

    #[must_use]
    pub fn with_business_value(self, id: &str) -> Self {
        self.with_yaml(
            &format!("specs/requirements/business-values/{id}.yaml"),
            &json!({
                "id": id,
                "title": format!("Value {id}"),
                "owner": "product",
                "successMetric": "weekly active users",
                "status": "approved"
            }),
        )
    }

    #[must_use]
    pub fn with_capability(self, id: &str, status: &str, commands: &[&str], events: &[&str]) -> Self {
        self.with_yaml(
            &format!("specs/requirements/capabilities/{id}.yaml"),
            &json!({
                "id": id,
                "title": format!("Capability {id}"),
                "status": status,
                "description": "Lets users sign up",
                "trace": { "domain": { "commands": commands, "events": events } }
            }),
        )
    }

    #[must_use]
    pub fn with_business_rule(self, id: &str) -> Self {
        self.with_yaml(
            &format!("specs/requirements/business-rules/{id}.yaml"),
            &json!({
                "id": id,
                "title": format!("Rule {id}"),
                "rule": "Email addresses are unique",
                "severity": "high"
            }),
        )
    }

    #[must_use]
    pub fn with_nfr(self, id: &str) -> Self {
        self.with_yaml(
            &format!("specs/requirements/nfr/{id}.yaml"),
            &json!({
                "id": id,
                "title": format!("Latency {id}"),
                "qualityAttribute": "performance",
                "statement": "p95 under 200ms"
            }),
        )
    }

    #[must_use]
    pub fn with_link(mut self, from: &str, to: &str, link_type: &str) -> Self {
        self.links.push(json!({ "from": from, "to": to, "type": link_type }));
        self
    }

    #[must_use]
    pub fn with_command(mut self, anchor: &str, name: &str, domain: &str) -> Self {
        self.commands.push(format!(
            "<a id=\"{anchor}\"></a>\n### {anchor}: {name}\n\n- **Intent**: {name}\n- **Domain**: {domain}\n- **Aggregate**: `User`\n- **Payload**:\n  - `email` (string) — login address\n- **Invariants**:\n  - email is unique\n- **Emits**: EVT-0001\n- **Error codes**: `USER_EXISTS`\n"
        ));
        self
    }

    #[must_use]
    pub fn with_event(mut self, anchor: &str, name: &str, domain: &str) -> Self {
        self.events.push(format!(
            "<a id=\"{anchor}\"></a>\n### {anchor}: {name}\n\n- **Fact**: {name}\n- **Domain**: {domain}\n- **Triggered by**: CMD-0001\n- **Consumers**: notifications\n"
        ));
        self
    }

    #[must_use]
    pub fn with_delta(self, id: &str, status: &str, changes: &[(&str, &str)]) -> Self {
        let changes: Vec<Value> = changes
            .iter()
            .map(|(change_type, target)| json!({ "type": change_type, "target": target }))
            .collect();
        self.with_yaml(
            &format!("specs/deltas/{id}.yaml"),
            &json!({ "id": id, "title": format!("Change {id}"), "status": status, "changes": changes }),
        )
    }

    #[must_use]
    pub fn with_workspace(self, repos: &[&str]) -> Self {
        let repos: Vec<Value> = repos.iter().map(|id| json!({ "id": id })).collect();
        self.with_yaml("specs/registry/workspace-registry.yaml", &json!({ "repos": repos }))
    }

    #[must_use]
    pub fn with_domain(self, id: &str, repo_id: &str) -> Self {
        let name = id.to_lowercase();
        self.with_yaml(
            &format!("specs/architecture/domain/{id}.yaml"),
            &json!({
                "id": id,
                "name": "Identity",
                "repoId": repo_id,
                "entrypoints": {
                    "core": format!("entry.core.{name}"),
                    "container": format!("entry.container.{name}")
                }
            }),
        )
    }

    #[must_use]
    pub fn with_domain_index(self, ids: &[&str]) -> Self {
        self.with_yaml("specs/architecture/domain/domains.yaml", &json!({ "domains": ids }))
    }

    /// Registry entries `(id, category, position)` plus a matching spec file each
    #[must_use]
    pub fn with_middleware(mut self, entries: &[(&str, &str, u32)]) -> Self {
        let mut index = Vec::new();
        for (id, category, position) in entries {
            let name = id.trim_start_matches("mw.");
            let spec = format!("{name}.md");
            self = self.with_file(
                &format!("specs/architecture/middleware/{spec}"),
                &format!(
                    "# {name}\n\n**Middleware ID:** `{id}`\n**Category:** {category}\n**Pipeline Position:** {position}\n**Implementation Ref:** `platform :: entry.middleware.{name}`\n"
                ),
            );
            index.push(json!({
                "id": id,
                "category": category,
                "position": position,
                "spec": spec,
                "implementation": { "repoId": "platform", "entry": format!("entry.middleware.{name}") }
            }));
        }
        self.with_yaml("specs/architecture/middleware/registry.yaml", &json!({ "middleware": index }))
    }

    #[must_use]
    pub fn with_repo_index(self, repo_id: Option<&str>, gates: &[&str]) -> Self {
        let gates: Vec<Value> = gates.iter().map(|id| json!({ "id": id })).collect();
        let mut doc = json!({ "qualityGates": gates });
        if let Some(repo_id) = repo_id {
            doc["repoId"] = json!(repo_id);
        }
        self.with_yaml("repo.yaml", &doc)
    }

    pub fn build(self) -> SpecTree {
        let tree = SpecTree {
            dir: tempfile::tempdir().unwrap(),
        };
        for (relative, content) in &self.files {
            tree.write(relative, content);
        }
        if !self.links.is_empty() {
            let content = serde_yaml::to_string(&json!({ "links": self.links })).unwrap();
            tree.write("specs/requirements/trace-links.yaml", &content);
        }
        if !self.commands.is_empty() {
            tree.write(COMMANDS_MD, &format!("# Commands\n\n{}", self.commands.join("\n")));
        }
        if !self.events.is_empty() {
            tree.write(EVENTS_MD, &format!("# Events\n\n{}", self.events.join("\n")));
        }
        tree
    }
}

/// Task draft with dependencies on other draft keys
pub fn task(key: &str, layer: Layer, depends_on: &[&str]) -> TaskDraft {
    depends_on
        .iter()
        .fold(TaskDraft::new(key, format!("Task {key}"), layer), |draft, dep| draft.depends_on(*dep))
}

/// Task draft writing to `file`
pub fn task_for_file(key: &str, layer: Layer, file: &str) -> TaskDraft {
    TaskDraft::new(key, format!("Task {key}"), layer).with_target_file(file)
}
