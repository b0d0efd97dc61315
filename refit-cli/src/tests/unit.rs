//! Focused unit tests covering CLI parsing and `run` configuration.

use super::helpers::Workspace;
use super::*;
use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(None, Some("out.osm.pbf"), ARG_INPUT, ENV_RUN_INPUT)]
#[case(Some("in.osm.pbf"), None, ARG_OUTPUT, ENV_RUN_OUTPUT)]
fn converting_without_required_fields_errors(
    #[case] input: Option<&str>,
    #[case] output: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = RunArgs {
        input: input.map(Utf8PathBuf::from),
        output: output.map(Utf8PathBuf::from),
        ..RunArgs::default()
    };
    let err = RunConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn missing_argument_names_the_environment_variable() {
    let err = CliError::MissingArgument {
        field: ARG_OUTPUT,
        env: ENV_RUN_OUTPUT,
    };
    assert_eq!(
        err.to_string(),
        "missing output (pass it on the command line or set REFIT_CMDS_RUN_OUTPUT)"
    );
}

#[rstest]
fn validate_sources_reports_missing_input() {
    let workspace = Workspace::new();
    let config = RunConfig {
        input: workspace.path("absent.osm.pbf"),
        output: workspace.path("out.osm.pbf"),
        changes: None,
        overrides: None,
    };
    match config.validate_sources().expect_err("expected failure") {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_INPUT),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn validate_sources_rejects_directory_overrides() {
    let workspace = Workspace::new();
    let rules = workspace.path("rules.d");
    std::fs::create_dir(&rules).expect("create rules directory");
    let config = RunConfig {
        input: workspace.text("in.opl", ""),
        output: workspace.path("out.opl"),
        changes: None,
        overrides: Some(rules),
    };
    match config.validate_sources().expect_err("expected failure") {
        CliError::SourcePathNotFile { field, .. } => assert_eq!(field, ARG_OVERRIDES),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn validate_sources_tolerates_a_missing_change_directory() {
    let workspace = Workspace::new();
    let config = RunConfig {
        input: workspace.text("in.opl", ""),
        output: workspace.path("out.opl"),
        changes: Some(workspace.path("no-such-dir")),
        overrides: None,
    };
    config
        .validate_sources()
        .expect("change directory is checked by the pipeline");
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "input": 42 }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "input": "from-file.osm.pbf",
            "output": "from-file-out.osm.pbf",
            "overrides": "from-file.json",
        }),
        None,
    );
    composer.push_environment(json!({
        "output": "from-env-out.osm.pbf",
        "changes": "from-env-changes",
    }));
    composer.push_cli(json!({ "input": "from-cli.osm.pbf" }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(
        config,
        RunConfig {
            input: "from-cli.osm.pbf".into(),
            output: "from-env-out.osm.pbf".into(),
            changes: Some("from-env-changes".into()),
            overrides: Some("from-file.json".into()),
        }
    );
}

#[rstest]
fn strip_networks_defaults_to_queensland_state_routes() {
    let cli = Cli::try_parse_from(["refit", "strip-networks", "in.osm.pbf", "out.osm.pbf"])
        .expect("arguments parse");
    match cli.command {
        Command::StripNetworks(args) => {
            assert_eq!(args.networks, ["AU:QLD:S", "AU:QLD:MR", "AU:QLD:NR"]);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[rstest]
fn strip_networks_accepts_repeated_networks() {
    let cli = Cli::try_parse_from([
        "refit",
        "strip-networks",
        "in.osm.pbf",
        "out.osm.pbf",
        "--network",
        "AU:NSW:A",
        "--network",
        "AU:NSW:B",
    ])
    .expect("arguments parse");
    match cli.command {
        Command::StripNetworks(args) => assert_eq!(args.networks, ["AU:NSW:A", "AU:NSW:B"]),
        other => panic!("unexpected command {other:?}"),
    }
}

#[rstest]
#[case(&["refit", "apply-changes", "in.osm.pbf", "out.osm.pbf"])]
#[case(&["refit", "diff", "a.osm"])]
#[case(&["refit", "frobnicate"])]
fn malformed_invocations_are_argument_errors(#[case] invocation: &[&str]) {
    match run_with_args(invocation.iter().copied()) {
        Err(CliError::ArgumentParsing(_)) => {}
        other => panic!("expected ArgumentParsing, found {other:?}"),
    }
}

#[rstest]
fn help_is_not_an_error() {
    run_with_args(["refit", "--help"]).expect("help prints and succeeds");
}

#[rstest]
fn rendered_errors_include_the_cause_chain() {
    let err = CliError::InspectSourcePath {
        field: ARG_INPUT,
        path: "in.osm.pbf".into(),
        source: std::io::Error::other("permission denied"),
    };
    assert_eq!(
        render_error(&err),
        "refit: failed to inspect input path \"in.osm.pbf\"\n  caused by: permission denied"
    );
}
