use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use ssot_core::{CoreError, GateError, ImpactReport, ReplayDecomposer, SsotConfig, TaskGenPipeline, TaskPlan, Workspace};
use ssot_model::{ErrorCode, ErrorKind, Priority};
use ssot_test_utils::{SpecTree, SpecTreeBuilder};

const DELTA: &str = "DELTA-2026-02-11-001";

fn open(tree: &SpecTree) -> Workspace {
    Workspace::open(tree.root(), SsotConfig::default()).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn good_drafts() -> Value {
    json!({
        "tasks": [
            {
                "key": "tests",
                "title": "Registration tests",
                "layer": "test",
                "depends_on": ["http"],
                "quality_gates": ["qg.tests.unit"]
            },
            {
                "key": "http",
                "title": "Register endpoint",
                "layer": "adapter-in",
                "depends_on": ["core"],
                "target_files": ["src/http/register.rs"],
                "priority": "high"
            },
            {
                "key": "core",
                "title": "User aggregate",
                "layer": "domain-core",
                "source_artifacts": ["CAP-0001", "specs/domain/commands.md#CMD-0001"]
            }
        ]
    })
}

#[test]
fn preview_orders_drafts_without_writing() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let preview = TaskGenPipeline::new(&workspace)
        .preview(DELTA, Some(&good_drafts()))
        .unwrap();

    assert!(preview.diagnostics.is_empty(), "{:?}", preview.diagnostics);
    assert_eq!(preview.impact.units.len(), 4);
    let order: Vec<(&str, &str)> = preview
        .tasks
        .iter()
        .map(|t| (t.task_id.as_str(), t.key.as_str()))
        .collect();
    assert_eq!(order, vec![("TASK-001", "core"), ("TASK-002", "http"), ("TASK-003", "tests")]);
    assert_eq!(preview.tasks[2].depends_on, vec!["TASK-002".to_string()]);
    assert_eq!(preview.tasks[0].priority, Priority::Medium);
    assert_eq!(preview.tasks[1].priority, Priority::High);
    assert!(!tree.root().join("tasks").exists());
}

#[test]
fn configured_default_priority_fills_gaps() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = Workspace::open(tree.root(), SsotConfig::new().with_default_priority(Priority::Low)).unwrap();
    let preview = TaskGenPipeline::new(&workspace)
        .preview(DELTA, Some(&good_drafts()))
        .unwrap();

    let priorities: Vec<Priority> = preview.tasks.iter().map(|t| t.priority).collect();
    assert_eq!(priorities, vec![Priority::Low, Priority::High, Priority::Low]);
}

#[test]
fn preview_reports_draft_violations() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let drafts = json!({
        "tasks": [
            { "key": "a", "title": "A", "layer": "test", "source_artifacts": ["CAP-0099"] },
            { "key": "b", "title": "B", "layer": "test", "quality_gates": ["qg.vibes"] }
        ]
    });
    let preview = TaskGenPipeline::new(&workspace).preview(DELTA, Some(&drafts)).unwrap();
    let codes: Vec<ErrorCode> = preview.diagnostics.iter().map(|d| d.code).collect();

    assert_eq!(codes, vec![ErrorCode::DanglingEdge, ErrorCode::UnknownQualityGate]);
    assert!(preview.tasks.is_empty());
}

#[test]
fn gate_repairs_drafts_and_plan_is_written() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let broken = json!({ "tasks": [{ "key": "core", "title": "", "layer": "domain-core" }] });
    let mut collaborator = ReplayDecomposer::<ImpactReport, Value>::new(vec![broken, good_drafts()]);

    let pipeline = TaskGenPipeline::new(&workspace).with_date(date());
    let outcome = pipeline.run(DELTA, &mut collaborator).unwrap();
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0].diagnostics[0].kind, ErrorKind::Structural);

    let path = pipeline.write(&outcome.plan, None).unwrap();
    assert!(path.ends_with("tasks/DELTA-2026-02-11-001.yaml"));
    let written: TaskPlan = serde_yaml::from_str(&tree.read("tasks/DELTA-2026-02-11-001.yaml")).unwrap();
    assert_eq!(written, outcome.plan);
    assert_eq!(written.delta.id, DELTA);
    assert_eq!(written.generated_on, date());
    assert_eq!(written.tasks.len(), 3);
}

#[test]
fn explicit_output_path_is_honoured() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("plan.yaml");
    let mut collaborator = ReplayDecomposer::<ImpactReport, Value>::new(vec![good_drafts()]);

    let pipeline = TaskGenPipeline::new(&workspace).with_date(date());
    let outcome = pipeline.run(DELTA, &mut collaborator).unwrap();
    let path = pipeline.write(&outcome.plan, Some(&out)).unwrap();

    assert_eq!(path, out);
    assert!(out.is_file());
}

#[test]
fn cycle_stops_the_gate_without_output() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let cyclic = json!({
        "tasks": [
            { "key": "TASK-A", "title": "A", "layer": "application", "depends_on": ["TASK-B"] },
            { "key": "TASK-B", "title": "B", "layer": "application", "depends_on": ["TASK-A"] }
        ]
    });
    let mut collaborator = ReplayDecomposer::<ImpactReport, Value>::new(vec![cyclic]);
    let err = TaskGenPipeline::new(&workspace).run(DELTA, &mut collaborator).unwrap_err();

    match err {
        CoreError::Gate(GateError::Fatal { attempt, diagnostics }) => {
            assert_eq!(attempt, 1);
            assert_eq!(diagnostics[0].code, ErrorCode::DependencyCycle);
            assert!(diagnostics[0].message.contains("TASK-A"));
            assert!(diagnostics[0].message.contains("TASK-B"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(collaborator.served(), 1);
    assert!(!tree.root().join("tasks").exists());
}

#[test]
fn status_only_delta_plans_nothing() {
    let tree = SpecTreeBuilder::valid()
        .with_delta("DELTA-2026-03-01-001", "applied", &[("status", "CAP-0001")])
        .build();
    let workspace = open(&tree);
    let mut collaborator = ReplayDecomposer::<ImpactReport, Value>::new(Vec::new());
    let outcome = TaskGenPipeline::new(&workspace)
        .run("DELTA-2026-03-01-001", &mut collaborator)
        .unwrap();

    assert!(outcome.plan.tasks.is_empty());
    assert_eq!(outcome.attempts, 0);
    assert_eq!(collaborator.served(), 0);
}

#[test]
fn proposed_delta_does_not_feed_task_generation() {
    let tree = SpecTreeBuilder::valid()
        .with_delta("DELTA-2026-03-01-001", "proposed", &[("modify", "CAP-0001")])
        .build();
    let workspace = open(&tree);
    let mut collaborator = ReplayDecomposer::<ImpactReport, Value>::new(vec![good_drafts()]);
    let err = TaskGenPipeline::new(&workspace)
        .run("DELTA-2026-03-01-001", &mut collaborator)
        .unwrap_err();

    assert!(matches!(err, CoreError::DeltaNotApplied { .. }));
    assert_eq!(collaborator.served(), 0);
}
