//! Task Planner
//!
//! Orders task drafts topologically over `depends_on`. Among tasks that are
//! ready at the same time the layer order decides
//! (`domain-core < application < adapter-in/adapter-out < middleware < test`),
//! adapters are split by their first target file, and the draft key breaks
//! any remaining tie. A cycle is never broken by guessing: the plan is
//! refused and the cycle's members are named.

use crate::error::PlanError;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use ssot_model::{Diagnostic, ErrorCode, PlannedTask, TaskDraft, TaskId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use tracing::{debug, info};

/// Orders drafts into `TASK-001..N`
#[derive(Debug, Clone, Default)]
pub struct TaskPlanner {
    gate_catalog: Option<BTreeSet<String>>,
}

impl TaskPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require every `quality_gates` entry to be in `catalog`
    #[inline]
    #[must_use]
    pub fn with_gate_catalog(mut self, catalog: BTreeSet<String>) -> Self {
        self.gate_catalog = Some(catalog);
        self
    }

    /// Every problem that prevents an ordering
    #[must_use]
    pub fn check(&self, drafts: &[TaskDraft]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut keys = BTreeSet::new();
        for draft in drafts {
            if !keys.insert(draft.key.as_str()) {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::DuplicateTaskKey,
                    draft.key.as_str(),
                    format!("task key {} is used more than once", draft.key),
                ));
            }
        }

        for draft in drafts {
            for (position, dep) in draft.depends_on.iter().enumerate() {
                if !keys.contains(dep.as_str()) {
                    diagnostics.push(
                        Diagnostic::new(
                            ErrorCode::UnknownDependency,
                            draft.key.as_str(),
                            format!("{} depends on unknown task {dep}", draft.key),
                        )
                        .at(format!("/depends_on/{position}")),
                    );
                }
            }
            if let Some(catalog) = &self.gate_catalog {
                for (position, gate) in draft.quality_gates.iter().enumerate() {
                    if !catalog.contains(gate) {
                        diagnostics.push(
                            Diagnostic::new(
                                ErrorCode::UnknownQualityGate,
                                draft.key.as_str(),
                                format!("quality gate {gate} is not in the catalog"),
                            )
                            .at(format!("/quality_gates/{position}")),
                        );
                    }
                }
            }
        }

        if diagnostics.iter().all(|d| d.code != ErrorCode::DuplicateTaskKey) {
            diagnostics.extend(cycles(drafts));
        }
        diagnostics
    }

    /// Order `drafts` and number them
    ///
    /// # Errors
    /// Returns error carrying every duplicate key, unknown dependency,
    /// unknown quality gate and dependency cycle found
    pub fn plan(&self, drafts: Vec<TaskDraft>) -> Result<Vec<PlannedTask>, PlanError> {
        let mut diagnostics = self.check(&drafts);
        if !diagnostics.is_empty() {
            ssot_model::normalize(&mut diagnostics);
            return Err(PlanError { diagnostics });
        }

        let order = ready_order(&drafts);
        let ids: BTreeMap<&str, TaskId> = order
            .iter()
            .enumerate()
            .map(|(n, idx)| (drafts[*idx].key.as_str(), TaskId(task_number(n))))
            .collect();
        let numbered: Vec<(TaskId, Vec<String>)> = order
            .iter()
            .map(|idx| {
                let draft = &drafts[*idx];
                let deps = draft
                    .depends_on
                    .iter()
                    .filter_map(|key| ids.get(key.as_str()))
                    .map(ToString::to_string)
                    .collect();
                (ids[draft.key.as_str()], deps)
            })
            .collect();

        let mut slots: Vec<Option<TaskDraft>> = drafts.into_iter().map(Some).collect();
        let tasks: Vec<PlannedTask> = order
            .iter()
            .zip(numbered)
            .filter_map(|(idx, (id, deps))| slots[*idx].take().map(|d| PlannedTask::from_draft(id, d, deps)))
            .collect();
        info!(tasks = tasks.len(), "planned tasks");
        Ok(tasks)
    }
}

fn task_number(position: usize) -> u32 {
    u32::try_from(position + 1).unwrap_or(u32::MAX)
}

/// Dependency graph over draft indices, edges point from dependency to dependant
fn dependency_graph(drafts: &[TaskDraft]) -> DiGraphMap<usize, ()> {
    let by_key: BTreeMap<&str, usize> = drafts.iter().enumerate().map(|(i, d)| (d.key.as_str(), i)).collect();
    let mut graph = DiGraphMap::new();
    for (idx, draft) in drafts.iter().enumerate() {
        graph.add_node(idx);
        for dep in &draft.depends_on {
            if let Some(&from) = by_key.get(dep.as_str()) {
                graph.add_edge(from, idx, ());
            }
        }
    }
    graph
}

/// One diagnostic per strongly connected component that forms a cycle
fn cycles(drafts: &[TaskDraft]) -> Vec<Diagnostic> {
    let graph = dependency_graph(drafts);
    let mut diagnostics = Vec::new();
    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1 || component.iter().any(|&n| graph.contains_edge(n, n));
        if !cyclic {
            continue;
        }
        let mut members: Vec<&str> = component.iter().map(|&n| drafts[n].key.as_str()).collect();
        members.sort_unstable();
        let message = if members.len() == 1 {
            format!("{} depends on itself", members[0])
        } else {
            format!("dependency cycle between {}", members.join(", "))
        };
        debug!(members = ?members, "dependency cycle");
        diagnostics.push(Diagnostic::new(ErrorCode::DependencyCycle, members[0], message));
    }
    diagnostics
}

/// Kahn's algorithm with a priority queue keyed on
/// `(layer rank, adapter target file, key)`
fn ready_order(drafts: &[TaskDraft]) -> Vec<usize> {
    let graph = dependency_graph(drafts);
    let sort_key = |idx: usize| {
        let draft = &drafts[idx];
        let file = if draft.layer.is_adapter() {
            draft.first_target_file().to_string()
        } else {
            String::new()
        };
        Reverse((draft.layer.rank(), file, draft.key.clone(), idx))
    };

    let mut pending: Vec<usize> = (0..drafts.len())
        .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<_> = (0..drafts.len()).filter(|&idx| pending[idx] == 0).map(sort_key).collect();
    let mut order = Vec::with_capacity(drafts.len());
    while let Some(Reverse((_, _, _, idx))) = ready.pop() {
        order.push(idx);
        for next in graph.neighbors_directed(idx, Direction::Outgoing) {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(sort_key(next));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ssot_model::{ErrorKind, Layer};

    fn draft(key: &str, layer: Layer, deps: &[&str]) -> TaskDraft {
        deps.iter().fold(TaskDraft::new(key, key, layer), |d, dep| d.depends_on(*dep))
    }

    fn keys(tasks: &[PlannedTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.key.as_str()).collect()
    }

    #[test]
    fn layer_priority_breaks_ties() {
        let tasks = TaskPlanner::new()
            .plan(vec![
                draft("t-test", Layer::Test, &[]),
                draft("t-mw", Layer::Middleware, &[]),
                draft("t-app", Layer::Application, &[]),
                draft("t-core", Layer::DomainCore, &[]),
            ])
            .unwrap();
        assert_eq!(keys(&tasks), vec!["t-core", "t-app", "t-mw", "t-test"]);
        assert_eq!(tasks[0].task_id, "TASK-001");
        assert_eq!(tasks[3].task_id, "TASK-004");
    }

    #[test]
    fn dependencies_override_layer_order() {
        let tasks = TaskPlanner::new()
            .plan(vec![
                draft("core", Layer::DomainCore, &["fixture"]),
                draft("fixture", Layer::Test, &[]),
            ])
            .unwrap();
        assert_eq!(keys(&tasks), vec!["fixture", "core"]);
        assert_eq!(tasks[1].depends_on, vec!["TASK-001".to_string()]);
    }

    #[test]
    fn adapters_are_split_by_target_file() {
        let tasks = TaskPlanner::new()
            .plan(vec![
                TaskDraft::new("http", "http", Layer::AdapterIn).with_target_file("src/z/http.rs"),
                TaskDraft::new("db", "db", Layer::AdapterOut).with_target_file("src/a/db.rs"),
            ])
            .unwrap();
        assert_eq!(keys(&tasks), vec!["db", "http"]);
    }

    #[test]
    fn two_task_cycle_names_both() {
        let err = TaskPlanner::new()
            .plan(vec![
                draft("TASK-A", Layer::Application, &["TASK-B"]),
                draft("TASK-B", Layer::Application, &["TASK-A"]),
            ])
            .unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        let d = &err.diagnostics[0];
        assert_eq!(d.kind, ErrorKind::Planning);
        assert_eq!(d.code, ErrorCode::DependencyCycle);
        assert!(d.message.contains("TASK-A"));
        assert!(d.message.contains("TASK-B"));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = TaskPlanner::new()
            .plan(vec![draft("a", Layer::Test, &["a"])])
            .unwrap_err();
        assert_eq!(err.diagnostics[0].message, "a depends on itself");
    }

    #[test]
    fn unknown_dependency_and_duplicate_key() {
        let err = TaskPlanner::new()
            .plan(vec![
                draft("a", Layer::Test, &["ghost"]),
                draft("a", Layer::Test, &[]),
            ])
            .unwrap_err();
        let codes: Vec<_> = err.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![ErrorCode::UnknownDependency, ErrorCode::DuplicateTaskKey]);
    }

    #[test]
    fn unknown_gate_is_referential() {
        let mut task = draft("a", Layer::Test, &[]);
        task.quality_gates.push("qg.vibes".to_string());
        let catalog = ssot_model::GATE_CATALOG.iter().map(ToString::to_string).collect();
        let err = TaskPlanner::new().with_gate_catalog(catalog).plan(vec![task]).unwrap_err();
        assert_eq!(err.diagnostics[0].code, ErrorCode::UnknownQualityGate);
        assert_eq!(err.diagnostics[0].kind, ErrorKind::Referential);
    }

    #[test]
    fn empty_input_plans_nothing() {
        assert!(TaskPlanner::new().plan(Vec::new()).unwrap().is_empty());
    }
}
