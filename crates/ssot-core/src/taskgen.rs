//! Task generation
//!
//! Applied delta → impact units → task drafts from the collaborator (through
//! the [`ValidationGate`]) → [`TaskPlanner`] → a YAML plan under the tasks
//! directory. A delta whose changes are all skipped plans no tasks and never
//! reaches the collaborator.

use crate::error::CoreError;
use crate::gate::{Attempt, Decomposer, ValidationGate};
use crate::impact::ImpactReport;
use crate::pipeline::Workspace;
use crate::planner::TaskPlanner;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssot_model::{Diagnostic, ErrorCode, PlannedTask, TaskDrafts};
use ssot_store::{layout, ArtifactWriter, SchemaKind, WriteSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Subject of diagnostics about the drafts document as a whole
const DRAFTS_SUBJECT: &str = "task-drafts";

/// Delta a plan was generated for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDelta {
    pub id: String,
    pub title: String,
}

/// Plan document written per delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub delta: PlanDelta,
    pub generated_on: NaiveDate,
    pub tasks: Vec<PlannedTask>,
}

/// Output of a plan-only run
#[derive(Debug, Clone, Serialize)]
pub struct TaskPreview {
    pub impact: ImpactReport,
    pub tasks: Vec<PlannedTask>,
    /// Violations of the given drafts; empty when none were given
    pub diagnostics: Vec<Diagnostic>,
}

/// Planned tasks plus the attempts it took
#[derive(Debug, Clone)]
pub struct TaskGenOutcome {
    pub plan: TaskPlan,
    pub attempts: u32,
    pub history: Vec<Attempt>,
}

/// Task generation over one workspace
#[derive(Debug)]
pub struct TaskGenPipeline<'a> {
    workspace: &'a Workspace,
    date: NaiveDate,
}

impl<'a> TaskGenPipeline<'a> {
    #[must_use]
    pub fn new(workspace: &'a Workspace) -> Self {
        Self {
            workspace,
            date: chrono::Utc::now().date_naive(),
        }
    }

    /// Date recorded as `generated_on`
    #[inline]
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    fn planner(&self) -> TaskPlanner {
        TaskPlanner::new().with_gate_catalog(self.workspace.config().gate_catalog())
    }

    /// Schema-check a drafts document and parse it
    ///
    /// Tasks without a priority get the configured default.
    #[must_use]
    pub fn parse(&self, document: &Value) -> (Option<TaskDrafts>, Vec<Diagnostic>) {
        let mut document = document.clone();
        let default_priority = serde_json::to_value(self.workspace.config().planner.default_priority).ok();
        if let (Some(tasks), Some(priority)) = (
            document.get_mut("tasks").and_then(Value::as_array_mut),
            default_priority,
        ) {
            for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
                task.entry("priority").or_insert_with(|| priority.clone());
            }
        }

        let diagnostics = self
            .workspace
            .catalog()
            .check(SchemaKind::TaskDrafts, DRAFTS_SUBJECT, &document);
        if !diagnostics.is_empty() {
            return (None, diagnostics);
        }
        match serde_json::from_value::<TaskDrafts>(document) {
            Ok(drafts) => (Some(drafts), Vec::new()),
            Err(e) => (
                None,
                vec![Diagnostic::new(ErrorCode::MalformedDocument, DRAFTS_SUBJECT, e.to_string())],
            ),
        }
    }

    /// Every violation of a drafts document: schema, source artifacts, planning
    #[must_use]
    pub fn check(&self, document: &Value) -> Vec<Diagnostic> {
        let (drafts, mut diagnostics) = self.parse(document);
        let Some(drafts) = drafts else {
            return diagnostics;
        };
        let store = self.workspace.store();
        for task in &drafts.tasks {
            for (position, source) in task.source_artifacts.iter().enumerate() {
                if !store.contains(source) && store.delta(source).is_none() {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::DanglingEdge,
                            task.key.as_str(),
                            format!("source artifact {source} does not exist"),
                        )
                        .at(format!("/source_artifacts/{position}")),
                    );
                }
            }
        }
        diagnostics.extend(self.planner().check(&drafts.tasks));
        ssot_model::normalize(&mut diagnostics);
        diagnostics
    }

    /// Impact units and, given drafts, the ordering they would get
    ///
    /// Never writes.
    ///
    /// # Errors
    /// Returns error if the delta is unknown or not applied
    pub fn preview(&self, delta_id: &str, drafts: Option<&Value>) -> Result<TaskPreview, CoreError> {
        let impact = self.workspace.impact(delta_id)?;
        let mut preview = TaskPreview {
            impact,
            tasks: Vec::new(),
            diagnostics: Vec::new(),
        };
        let Some(document) = drafts else {
            return Ok(preview);
        };
        preview.diagnostics = self.check(document);
        if preview.diagnostics.is_empty() {
            if let (Some(drafts), _) = self.parse(document) {
                preview.tasks = self.planner().plan(drafts.tasks)?;
            }
        }
        Ok(preview)
    }

    /// Full run: impact, collaborator through the gate, planner
    ///
    /// # Errors
    /// Returns error if the delta is unknown or not applied, the gate gives
    /// up, or the planner refuses the accepted drafts
    pub fn run<D>(&self, delta_id: &str, decomposer: &mut D) -> Result<TaskGenOutcome, CoreError>
    where
        D: Decomposer<Input = ImpactReport, Draft = Value>,
    {
        let impact = self.workspace.impact(delta_id)?;
        let plan_delta = PlanDelta {
            id: impact.delta_id.clone(),
            title: impact.title.clone(),
        };
        if impact.units.is_empty() {
            warn!(delta = %impact.delta_id, skipped = impact.skipped.len(), "no impact units, nothing to plan");
            return Ok(TaskGenOutcome {
                plan: TaskPlan {
                    delta: plan_delta,
                    generated_on: self.date,
                    tasks: Vec::new(),
                },
                attempts: 0,
                history: Vec::new(),
            });
        }

        let gate = ValidationGate::new().with_max_attempts(self.workspace.config().max_attempts());
        let context = self.workspace.decomposition_context();
        let outcome = gate.run(decomposer, &context, &impact, |document| self.check(document))?;
        let (drafts, diagnostics) = self.parse(&outcome.draft);
        let drafts = drafts.ok_or_else(|| crate::error::PlanError { diagnostics })?;
        let tasks = self.planner().plan(drafts.tasks)?;
        info!(delta = %plan_delta.id, tasks = tasks.len(), attempts = outcome.attempts, "generated task plan");
        Ok(TaskGenOutcome {
            plan: TaskPlan {
                delta: plan_delta,
                generated_on: self.date,
                tasks,
            },
            attempts: outcome.attempts,
            history: outcome.history,
        })
    }

    /// Default location of the plan for `delta_id`, relative to the root
    #[must_use]
    pub fn default_path(&self, delta_id: &str) -> String {
        layout::join(&self.workspace.config().layout.tasks, &format!("{delta_id}.yaml"))
    }

    /// Write `plan` to `out`, or under the tasks directory
    ///
    /// # Errors
    /// Returns error if the plan cannot be serialized or written
    pub fn write(&self, plan: &TaskPlan, out: Option<&Path>) -> Result<PathBuf, CoreError> {
        let yaml = serde_yaml::to_string(plan)?;
        let (writer, relative) = match out {
            Some(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("{}.yaml", plan.delta.id));
                let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
                (ArtifactWriter::new(dir), name)
            }
            None => (self.workspace.writer(), self.default_path(&plan.delta.id)),
        };
        let mut written = writer.commit(&WriteSet::new().with_file(relative.as_str(), yaml))?;
        Ok(written.pop().unwrap_or_else(|| PathBuf::from(relative)))
    }
}
