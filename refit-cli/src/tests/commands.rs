//! Commands executed end to end against scratch extracts.

use super::helpers::Workspace;
use super::*;
use refit_core::test_support::{sample_collection, tags, way};
use refit_core::{Entity, EntityKey, Tags};
use refit_data::codec::{read_all, read_changes};
use rstest::{fixture, rstest};

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

fn invoke(args: &[&str]) -> Result<(), CliError> {
    run_with_args(std::iter::once("refit").chain(args.iter().copied()))
}

fn way_tags(path: &Utf8Path, id: i64) -> Tags {
    read_all(path)
        .expect("output reads back")
        .iter()
        .find(|entity| entity.key() == EntityKey::way(id))
        .map(|entity| entity.tags().clone())
        .unwrap_or_else(|| panic!("way {id} missing from {path}"))
}

#[rstest]
fn apply_changes_succeeds_with_warnings(workspace: Workspace) {
    let input = workspace.extract("base.osm.pbf", &sample_collection());
    let changes = workspace.path("changes");
    workspace.text("changes/notes.txt", "ignored");
    workspace.text(
        "changes/001.osc",
        r#"<osmChange version="0.6">
             <modify><way id="10" version="2"><nd ref="1"/><nd ref="3"/><tag k="highway" v="service"/></way></modify>
             <delete><node id="404"/></delete>
           </osmChange>"#,
    );
    let output = workspace.path("out.osm.pbf");

    invoke(&["apply-changes", input.as_str(), output.as_str(), changes.as_str()])
        .expect("warnings do not fail the command");

    assert_eq!(way_tags(&output, 10), tags([("highway", "service")]));
}

#[rstest]
fn apply_overrides_deletes_empty_values(workspace: Workspace) {
    let input = workspace.extract("base.opl", &sample_collection());
    let rules = workspace.text(
        "rules.json",
        r#"[{"way_ids": [10], "tags": {"name": "", "surface": "gravel"}}]"#,
    );
    let output = workspace.path("out.osm");

    invoke(&["apply-overrides", input.as_str(), output.as_str(), rules.as_str()])
        .expect("overrides apply");

    assert_eq!(
        way_tags(&output, 10),
        tags([("highway", "unclassified"), ("surface", "gravel")])
    );
}

#[rstest]
fn run_applies_changes_then_overrides(workspace: Workspace) {
    let input = workspace.extract("base.osm", &sample_collection());
    let changes = workspace.path("changes");
    workspace.text(
        "changes/a.osc",
        r#"<osmChange version="0.6"><modify>
             <way id="10" version="2"><nd ref="1"/><tag k="name" v="Mill Road"/></way>
           </modify></osmChange>"#,
    );
    let rules = workspace.text("rules.json", r#"[{"way_ids": [10], "tags": {"name": "Mill Street"}}]"#);
    let output = workspace.path("out.opl");

    invoke(&[
        "run",
        input.as_str(),
        output.as_str(),
        "--changes",
        changes.as_str(),
        "--overrides",
        rules.as_str(),
    ])
    .expect("run succeeds");

    assert_eq!(way_tags(&output, 10), tags([("name", "Mill Street")]));
}

#[rstest]
fn missing_input_fails_without_output(workspace: Workspace) {
    let output = workspace.path("out.osm.pbf");
    let missing = workspace.path("absent.osm.pbf");

    let err = invoke(&["apply-changes", missing.as_str(), output.as_str(), "changes"])
        .expect_err("missing input is fatal");

    match err {
        CliError::MissingSourceFile { field, path } => {
            assert_eq!(field, ARG_INPUT);
            assert_eq!(path, missing);
        }
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
    assert_eq!(workspace.entries(), 0);
}

#[rstest]
fn pipeline_failures_surface_through_the_cli(workspace: Workspace) {
    let input = workspace.extract("base.osm", &sample_collection());
    let rules = workspace.text("rules.json", "{not json");
    let output = workspace.path("out.osm");

    let err = invoke(&["apply-overrides", input.as_str(), output.as_str(), rules.as_str()])
        .expect_err("malformed rules are fatal");

    assert!(matches!(err, CliError::Pipeline(_)));
    assert!(render_error(&err).contains("caused by"));
    assert!(!output.exists());
}

#[rstest]
fn diff_writes_a_change_file(workspace: Workspace) {
    let original = workspace.extract("before.osm.pbf", &sample_collection());
    let mut edited: Vec<Entity> = sample_collection();
    edited.push(way(11, &[2, 3], tags([("highway", "footway")])));
    let modified = workspace.extract("after.osm.pbf", &edited);
    let output = workspace.path("diff.osc.bz2");

    invoke(&["diff", original.as_str(), modified.as_str(), output.as_str()])
        .expect("diff succeeds");

    let operations = read_changes(&output).expect("change file reads back");
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].key(), EntityKey::way(11));
}

#[rstest]
fn strip_networks_uses_default_networks(workspace: Workspace) {
    let input = workspace.extract(
        "base.osm.pbf",
        &[
            way(1, &[], tags([("highway", "primary"), ("network", "AU:QLD:MR"), ("ref", "15")])),
            way(2, &[], tags([("highway", "primary"), ("network", "AU:NSW:A"), ("ref", "1")])),
        ],
    );
    let output = workspace.path("out.osm.pbf");

    invoke(&["strip-networks", input.as_str(), output.as_str()]).expect("strip succeeds");

    assert_eq!(way_tags(&output, 1), tags([("highway", "primary")]));
    assert_eq!(
        way_tags(&output, 2),
        tags([("highway", "primary"), ("network", "AU:NSW:A"), ("ref", "1")])
    );
}
