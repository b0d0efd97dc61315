//! Scratch extracts and layered configuration for CLI tests.

use super::*;
use ortho_config::MergeComposer;
use refit_core::Entity;
use refit_data::codec::open_for_write;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

#[derive(Debug)]
pub(super) struct Workspace {
    dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn extract(&self, name: &str, entities: &[Entity]) -> Utf8PathBuf {
        let path = self.path(name);
        let mut sink = open_for_write(&path).expect("open extract");
        for entity in entities {
            sink.write(entity).expect("write entity");
        }
        sink.finish().expect("finish extract");
        path
    }

    pub(super) fn text(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture directory");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    pub(super) fn entries(&self) -> usize {
        std::fs::read_dir(self.dir.path())
            .expect("list workspace")
            .count()
    }
}

/// Values supplied by one configuration layer.
#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) input: Option<Utf8PathBuf>,
    pub(super) output: Option<Utf8PathBuf>,
    pub(super) changes: Option<Utf8PathBuf>,
    pub(super) overrides: Option<Utf8PathBuf>,
}

impl LayerOverrides {
    fn to_json(&self) -> Value {
        let mut layer = Map::new();
        for (key, value) in [
            ("input", &self.input),
            ("output", &self.output),
            ("changes", &self.changes),
            ("overrides", &self.overrides),
        ] {
            if let Some(path) = value {
                layer.insert(key.to_owned(), json!(path.as_str()));
            }
        }
        Value::Object(layer)
    }
}

impl From<&RunArgs> for LayerOverrides {
    fn from(args: &RunArgs) -> Self {
        Self {
            input: args.input.clone(),
            output: args.output.clone(),
            changes: args.changes.clone(),
            overrides: args.overrides.clone(),
        }
    }
}

/// Merge file, environment and CLI layers, lowest precedence first.
pub(super) fn merge_layers(
    cli_args: &RunArgs,
    file_layer: Option<&LayerOverrides>,
    env_layer: Option<&LayerOverrides>,
) -> Result<RunConfig, CliError> {
    let mut composer = MergeComposer::new();
    if let Some(file) = file_layer {
        composer.push_file(file.to_json(), None);
    }
    if let Some(env) = env_layer {
        composer.push_environment(env.to_json());
    }
    composer.push_cli(LayerOverrides::from(cli_args).to_json());
    config_from_layers_for_test(composer.layers())
}
