//! Task drafts and planned tasks
//!
//! Drafts come back from the decomposition collaborator keyed by a local,
//! stable `key`. The planner orders them and assigns `TASK-###` ids.

use crate::id::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Implementation layer of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    DomainCore,
    Application,
    AdapterIn,
    AdapterOut,
    Middleware,
    Test,
}

impl Layer {
    /// Tie-break priority: lower runs first; adapters share a rank
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::DomainCore => 0,
            Self::Application => 1,
            Self::AdapterIn | Self::AdapterOut => 2,
            Self::Middleware => 3,
            Self::Test => 4,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_adapter(self) -> bool {
        matches!(self, Self::AdapterIn | Self::AdapterOut)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DomainCore => "domain-core",
            Self::Application => "application",
            Self::AdapterIn => "adapter-in",
            Self::AdapterOut => "adapter-out",
            Self::Middleware => "middleware",
            Self::Test => "test",
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Draft task as proposed by the decomposition collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub key: String,
    pub title: String,
    pub layer: Layer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub target_files: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub source_artifacts: Vec<String>,
    #[serde(default)]
    pub contracts: Vec<String>,
    #[serde(default)]
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub quality_gates: Vec<String>,
}

impl TaskDraft {
    #[must_use]
    pub fn new(key: impl Into<String>, title: impl Into<String>, layer: Layer) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            layer,
            domain: None,
            description: String::new(),
            depends_on: Vec::new(),
            target_files: Vec::new(),
            acceptance_criteria: Vec::new(),
            source_artifacts: Vec::new(),
            contracts: Vec::new(),
            error_codes: Vec::new(),
            priority: Priority::default(),
            quality_gates: Vec::new(),
        }
    }

    #[must_use]
    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.depends_on.push(key.into());
        self
    }

    #[must_use]
    pub fn with_target_file(mut self, path: impl Into<String>) -> Self {
        self.target_files.push(path.into());
        self
    }

    /// Smallest target file path; adapter ties are broken on it
    #[must_use]
    pub fn first_target_file(&self) -> &str {
        self.target_files
            .iter()
            .min()
            .map_or("", String::as_str)
    }
}

/// Collaborator output for task generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDrafts {
    #[serde(default)]
    pub tasks: Vec<TaskDraft>,
}

/// Task with its final position in the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub task_id: String,
    pub key: String,
    pub title: String,
    pub layer: Layer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub source_artifacts: Vec<String>,
    pub target_files: Vec<String>,
    pub contracts: Vec<String>,
    pub error_codes: Vec<String>,
    pub depends_on: Vec<String>,
    pub priority: Priority,
    pub quality_gates: Vec<String>,
}

impl PlannedTask {
    /// Number `draft` as `id`, with dependencies already rewritten to task ids
    #[must_use]
    pub fn from_draft(id: TaskId, draft: TaskDraft, depends_on: Vec<String>) -> Self {
        Self {
            task_id: id.to_string(),
            key: draft.key,
            title: draft.title,
            layer: draft.layer,
            domain: draft.domain,
            description: draft.description,
            acceptance_criteria: draft.acceptance_criteria,
            source_artifacts: draft.source_artifacts,
            target_files: draft.target_files,
            contracts: draft.contracts,
            error_codes: draft.error_codes,
            depends_on,
            priority: draft.priority,
            quality_gates: draft.quality_gates,
        }
    }
}
