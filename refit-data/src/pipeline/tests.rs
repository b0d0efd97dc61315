//! Orchestrator tests against real files in a scratch directory.

use super::*;
use crate::codec::{open_for_write, read_all};
use refit_core::test_support::{node, sample_collection, tags, way};
use refit_core::{Entity, EntityKey, Tags};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf-8 temp path")
    }

    fn extract(&self, name: &str, entities: &[Entity]) -> Utf8PathBuf {
        let path = self.path(name);
        let mut sink = open_for_write(&path).expect("open extract");
        for entity in entities {
            sink.write(entity).expect("write entity");
        }
        sink.finish().expect("finish extract");
        path
    }

    fn text(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture directory");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }
}

#[fixture]
fn workspace() -> Workspace {
    Workspace {
        dir: tempfile::tempdir().expect("create temp dir"),
    }
}

fn way_tags(entities: &[Entity], id: i64) -> Tags {
    entities
        .iter()
        .find(|entity| entity.key() == EntityKey::way(id))
        .map(|entity| entity.tags().clone())
        .unwrap_or_else(|| panic!("way {id} missing from output"))
}

#[rstest]
fn change_files_precede_overrides(workspace: Workspace) {
    let input = workspace.extract(
        "base.osm.pbf",
        &[way(1, &[], tags([("highway", "unclassified")]))],
    );
    workspace.text(
        "changes/010-main.osc",
        r#"<osmChange version="0.6"><modify>
             <way id="1" version="2"><tag k="highway" v="primary"/><tag k="name" v="Main St"/></way>
           </modify></osmChange>"#,
    );
    let rules = workspace.text("rules.json", r#"[{"way_ids": [1], "tags": {"name": ""}}]"#);
    let output = workspace.path("out.osm.pbf");

    let request = PipelineRequest::new(input, output.clone())
        .with_changes(workspace.path("changes"))
        .with_overrides(rules);
    let report = run_pipeline(&request).expect("pipeline succeeds");

    let written = read_all(&output).expect("output reads back");
    assert_eq!(way_tags(&written, 1), tags([("highway", "primary")]));
    assert!(report.warnings.is_empty());
    assert_eq!((report.change_files, report.override_rules), (1, 1));
    assert_eq!(report.summary.ways, 1);
    assert_eq!(report.states.last(), Some(&PipelineState::Done));
    assert_eq!(report.states.len(), 6);
}

#[rstest]
fn no_modifications_copies_the_input(workspace: Workspace) {
    let input = workspace.extract("base.opl", &sample_collection());
    let output = workspace.path("copy.osm");

    let report = run_pipeline(&PipelineRequest::new(input, output.clone())).expect("copy succeeds");

    assert_eq!(report.summary.total(), 5);
    assert_eq!(read_all(&output).expect("reads back").len(), 5);
}

#[rstest]
fn warnings_do_not_fail_the_run(workspace: Workspace) {
    let input = workspace.extract("base.osm", &sample_collection());
    workspace.text("changes/README", "not a change file");
    workspace.text(
        "changes/a.osc",
        r#"<osmChange version="0.6"><delete><way id="999"/></delete></osmChange>"#,
    );
    let rules = workspace.text("rules.json", r#"[{"node_ids": [12345], "tags": {"x": "y"}}]"#);

    let request = PipelineRequest::new(input, workspace.path("out.osm"))
        .with_changes(workspace.path("changes"))
        .with_overrides(rules);
    let report = run_pipeline(&request).expect("warnings are not fatal");

    assert_eq!(
        report.warnings,
        vec![
            Warning::SkippedFile {
                file: "README".into()
            },
            Warning::UnresolvedDelete {
                file: "a.osc".into(),
                key: EntityKey::way(999)
            },
            Warning::UnmatchedRule {
                key: EntityKey::node(12345)
            },
        ]
    );
}

#[rstest]
fn unresolved_modify_leaves_existing_output_untouched(workspace: Workspace) {
    let input = workspace.extract("base.osm", &sample_collection());
    let output = workspace.text("out.osm", "previous output");
    workspace.text(
        "changes/a.osc",
        r#"<osmChange version="0.6"><modify><node id="77" lat="1" lon="2"/></modify></osmChange>"#,
    );

    let request = PipelineRequest::new(input, output.clone()).with_changes(workspace.path("changes"));
    let err = run_pipeline(&request).expect_err("modify of a missing node is fatal");

    assert!(matches!(
        err,
        PipelineError::Stage(StageError::UnresolvedModify { .. })
    ));
    assert_eq!(
        std::fs::read_to_string(&output).expect("output still readable"),
        "previous output"
    );
    let entries = std::fs::read_dir(workspace.dir.path()).expect("list workspace").count();
    assert_eq!(entries, 3, "no staged file may remain");
}

#[rstest]
fn malformed_rules_abort_before_writing(workspace: Workspace) {
    let input = workspace.extract("base.osm", &sample_collection());
    let rules = workspace.text("rules.json", r#"[{"way_ids": [10], "tags": {}, "why": 1}]"#);
    let output = workspace.path("out.osm");

    let err = run_pipeline(&PipelineRequest::new(input, output.clone()).with_overrides(rules))
        .expect_err("unknown fields are rejected");

    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::OverrideRules(
            OverrideRuleError::InvalidRule { index: 0, .. }
        ))
    ));
    assert!(!output.exists());
}

#[rstest]
fn missing_input_is_reported(workspace: Workspace) {
    let request = PipelineRequest::new(workspace.path("absent.osm.pbf"), workspace.path("out.osm.pbf"));
    assert!(matches!(
        run_pipeline(&request),
        Err(PipelineError::Input { source: None, .. })
    ));
}

#[rstest]
fn merge_files_append_after_change_files(workspace: Workspace) {
    let input = workspace.extract("base.osm", &[node(1, 0.0, 0.0, Tags::new())]);
    workspace.text(
        "changes/010-create.osc",
        r#"<osmChange version="0.6"><create><node id="-1" lat="1" lon="1"/></create></osmChange>"#,
    );
    workspace.extract("changes/020-extra.opl", &[node(1, 5.0, 5.0, tags([("dup", "yes")]))]);
    let output = workspace.path("out.opl");

    run_pipeline(&PipelineRequest::new(input, output.clone()).with_changes(workspace.path("changes")))
        .expect("pipeline succeeds");

    let keys: Vec<EntityKey> = read_all(&output)
        .expect("reads back")
        .iter()
        .map(Entity::key)
        .collect();
    assert_eq!(
        keys,
        vec![EntityKey::node(1), EntityKey::node(-1), EntityKey::node(1)]
    );
}

#[rstest]
fn strips_networks_from_a_file(workspace: Workspace) {
    let input = workspace.extract(
        "base.osm.pbf",
        &[
            way(1, &[], tags([("highway", "primary"), ("network", "AU:QLD:S"), ("ref", "23")])),
            way(2, &[], tags([("highway", "primary")])),
        ],
    );
    let output = workspace.path("stripped.osm.pbf");

    let report = strip_networks_file(&input, &output, NetworkStripper::new(["AU:QLD:S"]))
        .expect("strip succeeds");

    assert_eq!(report.stats.modified_ways, 1);
    assert_eq!(report.summary.ways, 2);
    let written = read_all(&output).expect("reads back");
    assert_eq!(way_tags(&written, 1), tags([("highway", "primary")]));
}
