use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ssot_graph::{validate, GraphBuilder};
use ssot_model::{normalize, ArtifactKind, EdgeKind, ErrorCode, ErrorKind};
use ssot_store::{ArtifactStore, Layout, SchemaCatalog};
use ssot_test_utils::{SpecTree, SpecTreeBuilder, COMMANDS_MD, EVENTS_MD};
use std::collections::BTreeSet;

fn load(tree: &SpecTree) -> ArtifactStore {
    let catalog = SchemaCatalog::builtin().unwrap();
    ArtifactStore::load(tree.root(), &Layout::default(), &catalog).unwrap()
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(ToString::to_string).collect()
}

#[test]
fn valid_tree_has_full_coverage() {
    let tree = SpecTreeBuilder::valid().build();
    let built = validate(&load(&tree));

    assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);
    assert!(built.graph.coverage(ArtifactKind::Capability).is_empty());
    assert!(built.graph.coverage(ArtifactKind::BusinessRule).is_empty());
    assert!(built.graph.resolve_anchor(&format!("{COMMANDS_MD}#CMD-0001")));
}

#[test]
fn reversed_links_are_normalized() {
    let tree = SpecTreeBuilder::valid()
        .with_link("BV-0001", "CAP-0001", "realizes")
        .with_link("CAP-0001", "BR-0001", "satisfies")
        .build();
    let built = validate(&load(&tree));
    assert!(built.diagnostics.is_empty(), "{:?}", built.diagnostics);
    assert_eq!(
        built.graph.successors("CAP-0001", EdgeKind::Realizes),
        ids(&["BV-0001"])
    );
}

#[test]
fn uncovered_rule_scenario() {
    let tree = SpecTreeBuilder::valid().with_business_rule("BR-0010").build();
    let built = validate(&load(&tree));

    assert_eq!(built.graph.coverage(ArtifactKind::BusinessRule), ids(&["BR-0010"]));
    let d = built
        .diagnostics
        .iter()
        .find(|d| d.subject == "BR-0010")
        .unwrap();
    assert_eq!(d.code, ErrorCode::MissingSatisfies);
    assert_eq!(d.kind, ErrorKind::Referential);
}

#[test]
fn implemented_capability_with_empty_commands_scenario() {
    let tree = SpecTreeBuilder::valid()
        .with_capability("CAP-0002", "implemented", &[], &[&format!("{EVENTS_MD}#EVT-0001")])
        .with_link("CAP-0002", "BV-0001", "realizes")
        .build();
    let built = validate(&load(&tree));

    assert_eq!(built.diagnostics.len(), 1, "{:?}", built.diagnostics);
    let d = &built.diagnostics[0];
    assert_eq!(d.kind, ErrorKind::Referential);
    assert_eq!(d.code, ErrorCode::EmptyTraceList);
    assert!(d.message.contains("CAP-0002"));
    assert!(d.message.contains("commands"));
}

#[test]
fn unresolved_anchor_is_referential() {
    let tree = SpecTreeBuilder::valid()
        .with_capability(
            "CAP-0001",
            "implemented",
            &[&format!("{COMMANDS_MD}#CMD-0042")],
            &[&format!("{EVENTS_MD}#EVT-0001")],
        )
        .build();
    let built = validate(&load(&tree));

    assert_eq!(built.diagnostics.len(), 1, "{:?}", built.diagnostics);
    assert_eq!(built.diagnostics[0].code, ErrorCode::UnresolvedAnchor);
    assert_eq!(built.diagnostics[0].pointer.as_deref(), Some("/trace/domain/commands/0"));
}

#[test]
fn anchor_in_code_block_does_not_resolve() {
    let tree = SpecTreeBuilder::valid().build();
    let commands = tree.read(COMMANDS_MD);
    tree.write(
        COMMANDS_MD,
        &format!("{commands}\n```\n<a id=\"CMD-0042\"></a>\n```\n"),
    );
    let built = validate(&load(&tree));
    assert!(!built.graph.resolve_anchor(&format!("{COMMANDS_MD}#CMD-0042")));
}

#[test]
fn dangling_link_is_reported() {
    let tree = SpecTreeBuilder::valid()
        .with_link("CAP-0001", "BV-0404", "realizes")
        .build();
    let built = validate(&load(&tree));

    let dangling: Vec<_> = built
        .diagnostics
        .iter()
        .filter(|d| d.code == ErrorCode::DanglingEdge)
        .collect();
    assert_eq!(dangling.len(), 1);
    assert!(dangling[0].message.contains("BV-0404"));
}

#[test]
fn wrong_link_kinds_are_reported() {
    let tree = SpecTreeBuilder::valid()
        .with_link("BR-0001", "BV-0001", "realizes")
        .build();
    let built = validate(&load(&tree));
    assert!(built
        .diagnostics
        .iter()
        .any(|d| d.code == ErrorCode::EdgeKindMismatch && d.subject == "BR-0001"));
}

#[test]
fn duplicate_id_is_structural() {
    let tree = SpecTreeBuilder::valid().build();
    let content = tree.read("specs/requirements/nfr/NFR-0001.yaml");
    tree.write("specs/requirements/nfr/NFR-0001-copy.yaml", &content);
    let built = validate(&load(&tree));
    assert!(built
        .diagnostics
        .iter()
        .any(|d| d.code == ErrorCode::DuplicateId && d.kind == ErrorKind::Structural));
}

#[test]
fn capability_neighborhood() {
    let tree = SpecTreeBuilder::valid().build();
    let built = GraphBuilder::from_store(&load(&tree));
    let around = built.graph.neighborhood(
        "CAP-0001",
        &[EdgeKind::Satisfies, EdgeKind::TracesCommand, EdgeKind::TracesEvent],
        1,
    );
    assert_eq!(
        around,
        ids(&[
            "BR-0001",
            &format!("{COMMANDS_MD}#CMD-0001"),
            &format!("{EVENTS_MD}#EVT-0001"),
        ])
    );
}

#[test]
fn delta_targets_become_edges() {
    let tree = SpecTreeBuilder::valid().build();
    let built = GraphBuilder::from_store(&load(&tree));
    assert_eq!(
        built.graph.successors("DELTA-2026-02-11-001", EdgeKind::Targets),
        ids(&["BR-0001", "BV-0001", "CAP-0001", "NFR-0001"])
    );
}

#[test]
fn validation_output_is_idempotent() {
    let tree = SpecTreeBuilder::valid()
        .with_business_rule("BR-0010")
        .with_capability("CAP-0002", "implemented", &[], &[])
        .with_link("CAP-0001", "BV-0404", "realizes")
        .build();
    let render = || {
        let mut diagnostics = validate(&load(&tree)).diagnostics;
        normalize(&mut diagnostics);
        diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    };
    assert_eq!(render(), render());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_coverage_is_exactly_the_unlinked_rules(linked in proptest::collection::vec(any::<bool>(), 1..8)) {
        let mut builder = SpecTreeBuilder::valid();
        let mut expected = BTreeSet::new();
        for (n, has_link) in linked.iter().enumerate() {
            let id = format!("BR-{:04}", n + 100);
            builder = builder.with_business_rule(&id);
            if *has_link {
                builder = builder.with_link(&id, "CAP-0001", "satisfies");
            } else {
                expected.insert(id);
            }
        }
        let tree = builder.build();
        let built = validate(&load(&tree));
        prop_assert_eq!(built.graph.coverage(ArtifactKind::BusinessRule), expected);
    }
}
