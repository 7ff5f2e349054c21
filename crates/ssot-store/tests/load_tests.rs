use pretty_assertions::assert_eq;
use ssot_model::{AnchorRef, ArtifactKind, ErrorCode, ErrorKind, MiddlewareCategory};
use ssot_store::{ArtifactStore, Layout, SchemaCatalog};
use ssot_test_utils::{SpecTreeBuilder, COMMANDS_MD};

fn load(tree: &ssot_test_utils::SpecTree) -> ArtifactStore {
    let catalog = SchemaCatalog::builtin().unwrap();
    ArtifactStore::load(tree.root(), &Layout::default(), &catalog).unwrap()
}

#[test]
fn loads_valid_tree_without_diagnostics() {
    let tree = SpecTreeBuilder::valid().build();
    let store = load(&tree);

    assert!(store.diagnostics().is_empty(), "{:?}", store.diagnostics());
    let ids: Vec<_> = store.requirements().iter().map(|l| l.record.id()).collect();
    assert_eq!(ids, vec!["BV-0001", "CAP-0001", "BR-0001", "NFR-0001"]);
    assert_eq!(store.trace_links().len(), 3);
    assert_eq!(store.deltas().len(), 1);
    assert_eq!(store.domains().len(), 1);
    assert_eq!(store.domain_index().unwrap().domains, vec!["DOM-0001"]);
    assert_eq!(store.workspace().unwrap().repos.len(), 2);
    assert_eq!(store.middleware().unwrap().middleware.len(), 3);
    assert_eq!(
        store.middleware_docs()["trace.md"].category,
        Some(MiddlewareCategory::Mandatory)
    );
    assert_eq!(store.repo_index().unwrap().quality_gates.len(), 2);
}

#[test]
fn resolves_anchor_detail() {
    let tree = SpecTreeBuilder::valid().build();
    let store = load(&tree);

    assert!(store.contains(&format!("{COMMANDS_MD}#CMD-0001")));
    let reference = AnchorRef::new(COMMANDS_MD, "CMD-0001").unwrap();
    let spec = store.domain_spec(&reference).unwrap();
    assert_eq!(spec.name, "RegisterUser");
    assert_eq!(spec.domain.as_deref(), Some("DOM-0001"));
    assert_eq!(spec.error_codes, vec!["USER_EXISTS"]);
    assert_eq!(store.domain_specs().len(), 2);
}

#[test]
fn schema_violation_drops_record_and_reports() {
    let tree = SpecTreeBuilder::valid()
        .with_file(
            "specs/requirements/business-values/BV-0002.yaml",
            "id: BV-0002\ntitle: Retention\n",
        )
        .build();
    let store = load(&tree);

    assert!(store.requirement("BV-0002").is_none());
    let codes: Vec<_> = store
        .diagnostics()
        .iter()
        .map(|d| (d.pointer.as_deref(), d.code))
        .collect();
    assert_eq!(
        codes,
        vec![
            (Some("/owner"), ErrorCode::MissingField),
            (Some("/successMetric"), ErrorCode::MissingField),
        ]
    );
    assert!(store.diagnostics().iter().all(|d| d.kind == ErrorKind::Structural));
}

#[test]
fn misplaced_id_is_reported_but_loaded() {
    let tree = SpecTreeBuilder::valid().build();
    let content = tree.read("specs/requirements/business-values/BV-0001.yaml");
    tree.write("specs/requirements/business-values/BV-0009.yaml", &content);
    let store = load(&tree);

    let mismatch: Vec<_> = store
        .diagnostics()
        .iter()
        .filter(|d| d.code == ErrorCode::IdMismatch)
        .collect();
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].subject, "specs/requirements/business-values/BV-0009.yaml");

    // Both copies reach the store so the duplicate is visible downstream
    let count = store
        .requirements()
        .iter()
        .filter(|l| l.record.kind() == ArtifactKind::BusinessValue)
        .count();
    assert_eq!(count, 2);
}

#[test]
fn malformed_yaml_is_structural() {
    let tree = SpecTreeBuilder::valid()
        .with_file("specs/deltas/broken.yaml", "id: [unclosed\n")
        .build();
    let store = load(&tree);

    assert_eq!(store.diagnostics().len(), 1);
    assert_eq!(store.diagnostics()[0].code, ErrorCode::MalformedDocument);
    assert_eq!(store.diagnostics()[0].subject, "specs/deltas/broken.yaml");
}

#[test]
fn domain_templates_are_ignored() {
    let tree = SpecTreeBuilder::valid()
        .with_file("specs/architecture/domain/DOM-template.yaml", "id: DOM-XXXX\n")
        .build();
    let store = load(&tree);
    assert_eq!(store.domain_files(), ["specs/architecture/domain/DOM-0001.yaml"]);
    assert!(store.diagnostics().is_empty());
}

#[test]
fn empty_root_loads_empty_store() {
    let tree = SpecTreeBuilder::new().build();
    let store = load(&tree);
    assert!(store.requirements().is_empty());
    assert!(store.middleware().is_none());
    assert!(store.diagnostics().is_empty());
}

#[test]
fn loading_twice_is_identical() {
    let tree = SpecTreeBuilder::valid()
        .with_file("specs/requirements/nfr/NFR-0002.yaml", "id: NFR-2\n")
        .build();
    let first = load(&tree);
    let second = load(&tree);
    assert_eq!(first.diagnostics(), second.diagnostics());
    assert_eq!(first.requirements(), second.requirements());
}
