use pretty_assertions::assert_eq;
use serde_json::json;
use ssot_core::{CoreError, LedgerError, SsotConfig, Workspace};
use ssot_model::{DeltaStatus, ErrorCode, ErrorKind};
use ssot_test_utils::{SpecTree, SpecTreeBuilder, COMMANDS_MD, EVENTS_MD};

fn open(tree: &SpecTree) -> Workspace {
    Workspace::open(tree.root(), SsotConfig::default()).unwrap()
}

fn codes(workspace: &Workspace) -> Vec<ErrorCode> {
    workspace
        .validate()
        .report
        .diagnostics()
        .iter()
        .map(|d| d.code)
        .collect()
}

#[test]
fn valid_tree_passes() {
    let tree = SpecTreeBuilder::valid().build();
    let validation = open(&tree).validate();

    assert!(validation.report.is_ok(), "{}", validation.report.render_text());
    assert_eq!(validation.report.exit_code(), 0);
    let summary = validation.report.summary();
    assert_eq!(summary.requirements, 4);
    assert_eq!(summary.deltas, 1);
    assert!(validation.report.render_text().starts_with("ok: 4 requirements"));
}

#[test]
fn implemented_capability_with_empty_commands_fails() {
    let tree = SpecTreeBuilder::valid()
        .with_capability("CAP-0002", "implemented", &[], &[&format!("{EVENTS_MD}#EVT-0001")])
        .with_link("CAP-0002", "BV-0001", "realizes")
        .build();
    let report = open(&tree).validate().report;

    assert_eq!(report.exit_code(), 1);
    let d = report
        .diagnostics()
        .iter()
        .find(|d| d.code == ErrorCode::EmptyTraceList)
        .unwrap();
    assert_eq!(d.kind, ErrorKind::Referential);
    assert_eq!(d.subject, "CAP-0002");
    assert!(d.message.contains("commands"));
}

#[test]
fn report_is_byte_identical_across_runs() {
    let tree = SpecTreeBuilder::valid()
        .with_business_rule("BR-0010")
        .with_capability("CAP-0003", "approved", &[], &[])
        .build();
    let first = open(&tree).validate().report;
    let second = open(&tree).validate().report;

    assert!(!first.is_ok());
    assert_eq!(first.render_text(), second.render_text());
    assert_eq!(first.render_json().unwrap(), second.render_json().unwrap());
    assert_eq!(first.digest(), second.digest());
}

#[test]
fn all_kinds_are_reported_in_one_pass() {
    let tree = SpecTreeBuilder::valid()
        .with_business_rule("BR-0010")
        .with_delta("DELTA-2026-02-30-001", "draft", &[("modify", "CAP-0099")])
        .build();
    let report = open(&tree).validate().report;
    let kinds: Vec<ErrorKind> = report.counts().into_keys().collect();

    assert_eq!(kinds, vec![ErrorKind::Structural, ErrorKind::Referential, ErrorKind::Lifecycle]);
}

#[test]
fn baseline_catches_removed_and_uncovered_records() {
    let baseline = SpecTreeBuilder::valid().build();
    let current = SpecTreeBuilder::valid()
        .without_file("specs/requirements/nfr/NFR-0001.yaml")
        .with_business_value("BV-0002")
        .build();
    let workspace = open(&current).with_baseline(baseline.root()).unwrap();
    let found = codes(&workspace);

    assert!(found.contains(&ErrorCode::RemovedArtifact), "{found:?}");
    assert!(found.contains(&ErrorCode::UncoveredChange), "{found:?}");
}

fn edited_business_value() -> SpecTreeBuilder {
    SpecTreeBuilder::valid().with_yaml(
        "specs/requirements/business-values/BV-0001.yaml",
        &json!({
            "id": "BV-0001",
            "title": "Faster onboarding",
            "owner": "growth",
            "successMetric": "time to first login",
            "status": "approved"
        }),
    )
}

#[test]
fn edit_to_existing_record_needs_a_new_delta() {
    let baseline = SpecTreeBuilder::valid().build();
    let current = edited_business_value().build();
    let report = open(&current).with_baseline(baseline.root()).unwrap().validate().report;
    let uncovered: Vec<&str> = report
        .diagnostics()
        .iter()
        .filter(|d| d.code == ErrorCode::UncoveredChange)
        .map(|d| d.subject.as_str())
        .collect();

    assert_eq!(uncovered, vec!["BV-0001"]);
}

#[test]
fn edit_covered_by_a_pending_delta_passes() {
    let baseline = SpecTreeBuilder::valid().build();
    let current = edited_business_value()
        .with_delta("DELTA-2026-03-01-001", "proposed", &[("modify", "BV-0001")])
        .build();
    let report = open(&current).with_baseline(baseline.root()).unwrap().validate().report;

    assert!(report.is_ok(), "{}", report.render_text());
}

#[test]
fn baseline_catches_removed_anchor() {
    let baseline = SpecTreeBuilder::valid().build();
    let current = SpecTreeBuilder::valid().build();
    current.write(EVENTS_MD, "# Events\n");
    let report = open(&current).with_baseline(baseline.root()).unwrap().validate().report;
    let removed: Vec<&str> = report
        .diagnostics()
        .iter()
        .filter(|d| d.code == ErrorCode::RemovedArtifact)
        .map(|d| d.subject.as_str())
        .collect();

    assert_eq!(removed, vec![format!("{EVENTS_MD}#EVT-0001").as_str()]);
    assert!(!report
        .diagnostics()
        .iter()
        .any(|d| d.code == ErrorCode::RemovedArtifact && d.subject.starts_with(COMMANDS_MD)));
}

#[test]
fn baseline_rejects_backward_delta_status() {
    let baseline = SpecTreeBuilder::valid().build();
    let current = SpecTreeBuilder::valid()
        .with_delta(
            "DELTA-2026-02-11-001",
            "draft",
            &[("add", "BV-0001"), ("add", "CAP-0001"), ("add", "BR-0001"), ("add", "NFR-0001")],
        )
        .build();
    let report = open(&current).with_baseline(baseline.root()).unwrap().validate().report;
    let d = report
        .diagnostics()
        .iter()
        .find(|d| d.code == ErrorCode::InvalidTransition)
        .unwrap();

    assert_eq!(d.subject, "DELTA-2026-02-11-001");
    assert_eq!(d.pointer.as_deref(), Some("/status"));
}

#[test]
fn baseline_pins_mandatory_positions() {
    let baseline = SpecTreeBuilder::valid().build();
    let current = SpecTreeBuilder::valid()
        .with_middleware(&[
            ("mw.trace", "mandatory", 15),
            ("mw.auth", "mandatory", 20),
            ("mw.audit", "optional", 35),
        ])
        .build();
    let workspace = open(&current).with_baseline(baseline.root()).unwrap();
    let report = workspace.validate().report;
    let moved: Vec<&str> = report
        .diagnostics()
        .iter()
        .filter(|d| d.code == ErrorCode::ImmutablePosition)
        .map(|d| d.subject.as_str())
        .collect();

    assert_eq!(moved, vec!["mw.trace"]);
}

#[test]
fn draft_may_jump_to_applied_and_is_persisted() {
    let tree = SpecTreeBuilder::valid()
        .with_delta("DELTA-2026-03-01-001", "draft", &[("modify", "CAP-0001")])
        .build();
    let (delta, path) = open(&tree)
        .advance_delta("DELTA-2026-03-01-001", DeltaStatus::Applied)
        .unwrap();

    assert_eq!(delta.status, DeltaStatus::Applied);
    assert!(path.ends_with("specs/deltas/DELTA-2026-03-01-001.yaml"));
    let reloaded = open(&tree);
    let stored = reloaded.store().delta("DELTA-2026-03-01-001").unwrap();
    assert_eq!(stored.record.status, DeltaStatus::Applied);
    assert!(reloaded.validate().report.is_ok());
}

#[test]
fn applied_to_draft_is_rejected() {
    let tree = SpecTreeBuilder::valid().build();
    let before = tree.read("specs/deltas/DELTA-2026-02-11-001.yaml");
    let err = open(&tree)
        .advance_delta("DELTA-2026-02-11-001", DeltaStatus::Draft)
        .unwrap_err();

    assert!(matches!(err, CoreError::Ledger(LedgerError::Transition(_))), "{err:?}");
    assert!(err.is_violation());
    assert_eq!(err.diagnostics()[0].kind, ErrorKind::Lifecycle);
    assert_eq!(tree.read("specs/deltas/DELTA-2026-02-11-001.yaml"), before);
}

#[test]
fn applied_guard_requires_traced_capabilities() {
    let tree = SpecTreeBuilder::valid()
        .with_capability("CAP-0002", "implemented", &[], &[])
        .with_delta("DELTA-2026-03-01-001", "proposed", &[("modify", "CAP-0002")])
        .build();
    let err = open(&tree)
        .advance_delta("DELTA-2026-03-01-001", DeltaStatus::Applied)
        .unwrap_err();

    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.code == ErrorCode::TransitionGuard));
    assert!(diagnostics[0].message.starts_with("CAP-0002: "));
    assert_eq!(diagnostics[0].pointer.as_deref(), Some("/changes/0/target"));
}

#[test]
fn unknown_delta_cannot_advance() {
    let tree = SpecTreeBuilder::valid().build();
    let err = open(&tree)
        .advance_delta("DELTA-2026-09-09-009", DeltaStatus::Applied)
        .unwrap_err();
    assert!(matches!(err, CoreError::Ledger(LedgerError::UnknownDelta(_))));
}

#[test]
fn decomposition_context_lists_ids_and_schemas() {
    let tree = SpecTreeBuilder::valid().build();
    let context = open(&tree).decomposition_context();

    assert!(context.existing_ids.contains(&"CAP-0001".to_string()));
    assert!(context.existing_ids.contains(&"DELTA-2026-02-11-001".to_string()));
    assert_eq!(context.domains, vec!["DOM-0001".to_string()]);
    assert!(context
        .trace_edges
        .contains(&("CAP-0001".to_string(), "realizes".to_string(), "BV-0001".to_string())));
    assert!(context.schemas.contains_key("cap"));
    assert!(context.schemas.contains_key("task-drafts"));
}
