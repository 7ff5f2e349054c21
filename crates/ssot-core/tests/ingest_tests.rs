use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;
use ssot_core::{ArtifactDrafts, CoreError, GateError, IngestPipeline, ReplayDecomposer, SsotConfig, Workspace};
use ssot_model::{ChangeType, DeltaStatus, ErrorCode};
use ssot_test_utils::{SpecTree, SpecTreeBuilder, COMMANDS_MD};

fn open(tree: &SpecTree) -> Workspace {
    Workspace::open(tree.root(), SsotConfig::default()).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn sign_in() -> ArtifactDrafts {
    serde_json::from_value(json!({
        "title": "Sign in",
        "businessValues": [{
            "id": "BV-0002",
            "title": "Retention",
            "owner": "product",
            "successMetric": "monthly churn"
        }],
        "capabilities": [{
            "title": "Sign in with email",
            "status": "proposed",
            "trace": { "domain": { "commands": [format!("{COMMANDS_MD}#CMD-0002")], "events": [] } }
        }],
        "commands": [{
            "reference": format!("{COMMANDS_MD}#CMD-0002"),
            "name": "SignIn",
            "summary": "Start a session",
            "domain": "DOM-0001"
        }],
        "traceLinks": [{ "from": "CAP-0002", "to": "BV-0002", "type": "realizes" }]
    }))
    .unwrap()
}

#[test]
fn accepted_drafts_are_written_with_a_proposed_delta() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let pipeline = IngestPipeline::new(&workspace).with_date(date());
    let mut collaborator = ReplayDecomposer::<String, ArtifactDrafts>::new(vec![sign_in()]);

    let outcome = pipeline.run(&mut collaborator, &"Users sign in".to_string()).unwrap();
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.delta.id, "DELTA-2026-03-01-001");
    assert_eq!(outcome.delta.status, DeltaStatus::Proposed);
    let changes: Vec<(ChangeType, &str)> = outcome
        .delta
        .changes
        .iter()
        .map(|c| (c.change_type, c.target.as_str()))
        .collect();
    let command = format!("{COMMANDS_MD}#CMD-0002");
    assert_eq!(
        changes,
        vec![
            (ChangeType::Add, "BV-0002"),
            (ChangeType::Add, "CAP-0002"),
            (ChangeType::Add, command.as_str()),
        ]
    );

    let written = pipeline.commit(&outcome).unwrap();
    assert_eq!(written.len(), 5);
    assert!(tree.read(COMMANDS_MD).contains("<a id=\"CMD-0002\"></a>"));
    assert!(tree.read("specs/requirements/capabilities/CAP-0002.yaml").contains("Sign in with email"));

    let reopened = open(&tree);
    assert!(reopened.validate().report.is_ok(), "{}", reopened.validate().report.render_text());
    assert!(reopened.store().delta("DELTA-2026-03-01-001").is_some());
}

#[test]
fn structural_mistakes_are_repaired_on_retry() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let mut broken = sign_in();
    broken.capabilities[0]["title"] = json!("");
    let mut collaborator = ReplayDecomposer::<String, ArtifactDrafts>::new(vec![broken, sign_in()]);

    let outcome = IngestPipeline::new(&workspace)
        .with_date(date())
        .run(&mut collaborator, &String::new())
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    let first = &outcome.history[0].diagnostics;
    assert!(first
        .iter()
        .any(|d| d.subject == "specs/requirements/capabilities/CAP-0002.yaml"));
    assert!(first.iter().all(|d| d.is_retryable()));
}

#[test]
fn missing_coverage_is_introduced_by_drafts() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let mut drafts = sign_in();
    drafts.trace_links.clear();
    let pipeline = IngestPipeline::new(&workspace).with_date(date());

    let found = pipeline.check(&drafts);
    let codes: Vec<ErrorCode> = found.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::MissingRealizes]);
}

#[test]
fn existing_problems_do_not_block_ingestion() {
    let tree = SpecTreeBuilder::valid().with_business_rule("BR-0010").build();
    let workspace = open(&tree);
    assert!(!workspace.validate().report.is_ok());

    let found = IngestPipeline::new(&workspace).with_date(date()).check(&sign_in());
    assert!(found.is_empty(), "{found:?}");
}

#[test]
fn duplicate_anchor_exhausts_the_gate() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let mut drafts = sign_in();
    drafts.commands[0].reference = format!("{COMMANDS_MD}#CMD-0001").parse().unwrap();
    let mut collaborator = ReplayDecomposer::<String, ArtifactDrafts>::new(vec![drafts]);

    let err = IngestPipeline::new(&workspace)
        .run(&mut collaborator, &String::new())
        .unwrap_err();
    match err {
        CoreError::Gate(GateError::Exhausted { attempts, ref history }) => {
            assert_eq!(attempts, 3);
            assert!(history[2].diagnostics.iter().any(|d| d.code == ErrorCode::DuplicateId));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(collaborator.served(), 3);
}

#[test]
fn empty_drafts_are_rejected() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let found = IngestPipeline::new(&workspace).check(&ArtifactDrafts::default());

    assert_eq!(found[0].code, ErrorCode::MissingField);
    assert_eq!(found[0].subject, "drafts");
}

#[test]
fn run_alone_writes_nothing() {
    let tree = SpecTreeBuilder::valid().build();
    let workspace = open(&tree);
    let mut collaborator = ReplayDecomposer::<String, ArtifactDrafts>::new(vec![sign_in()]);
    IngestPipeline::new(&workspace)
        .run(&mut collaborator, &String::new())
        .unwrap();

    assert!(!tree
        .root()
        .join("specs/requirements/business-values/BV-0002.yaml")
        .exists());
}

#[test]
fn full_delta_day_is_reported_instead_of_overflowing() {
    let tree = SpecTreeBuilder::valid()
        .with_delta("DELTA-2026-03-01-999", "proposed", &[("modify", "CAP-0001")])
        .build();
    let workspace = open(&tree);
    let pipeline = IngestPipeline::new(&workspace).with_date(date());
    let candidate = pipeline.stage(&sign_in());

    assert!(candidate.delta.id.is_empty());
    assert!(candidate.writes.paths().all(|p| !p.contains("DELTA-2026-03-01-1000")));
    let found = pipeline.check(&sign_in());
    assert!(found
        .iter()
        .any(|d| d.code == ErrorCode::PatternMismatch && d.subject == "drafts" && d.message.contains("DELTA-2026-03-01")));
}

#[test]
fn full_requirement_range_is_reported_instead_of_overflowing() {
    let tree = SpecTreeBuilder::valid()
        .with_capability("CAP-9999", "proposed", &[], &[])
        .build();
    let workspace = open(&tree);
    let found = IngestPipeline::new(&workspace).with_date(date()).check(&sign_in());

    assert!(found
        .iter()
        .any(|d| d.code == ErrorCode::PatternMismatch && d.subject == "drafts" && d.message.contains("CAP")));
    assert!(found.iter().all(|d| !d.subject.contains("CAP-10000")));
}
