//! `run` command: change files and overrides in a single pass.

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use refit_data::{PipelineRequest, run_pipeline};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CHANGES, ARG_INPUT, ARG_OUTPUT, ARG_OVERRIDES, CliError, ENV_RUN_INPUT, ENV_RUN_OUTPUT,
    log_report, require_file,
};

/// CLI arguments for the `run` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply the change files in a directory and then a JSON \
                 override rule file to an extract. Paths can come from \
                 arguments, configuration files, or REFIT_CMDS_RUN_* \
                 environment variables.",
    about = "Apply change files, then tag overrides"
)]
#[ortho_config(prefix = "REFIT")]
pub(crate) struct RunArgs {
    /// Base extract.
    #[arg(value_name = "input")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Destination extract.
    #[arg(value_name = "output")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Directory of change files.
    #[arg(long = ARG_CHANGES, value_name = "dir")]
    #[serde(default)]
    pub(crate) changes: Option<Utf8PathBuf>,
    /// JSON override rule file.
    #[arg(long = ARG_OVERRIDES, value_name = "path")]
    #[serde(default)]
    pub(crate) overrides: Option<Utf8PathBuf>,
}

impl RunArgs {
    pub(crate) fn into_config(self) -> Result<RunConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RunConfig::try_from(merged)
    }
}

/// Resolved `run` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) changes: Option<Utf8PathBuf>,
    pub(crate) overrides: Option<Utf8PathBuf>,
}

impl RunConfig {
    /// The change directory is checked by the pipeline, which tolerates a
    /// missing one.
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_file(&self.input, ARG_INPUT)?;
        if let Some(overrides) = &self.overrides {
            require_file(overrides, ARG_OVERRIDES)?;
        }
        Ok(())
    }

    pub(crate) fn into_request(self) -> PipelineRequest {
        let mut request = PipelineRequest::new(self.input, self.output);
        request.changes = self.changes;
        request.overrides = self.overrides;
        request
    }
}

impl TryFrom<RunArgs> for RunConfig {
    type Error = CliError;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_RUN_INPUT,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_RUN_OUTPUT,
        })?;
        Ok(Self {
            input,
            output,
            changes: args.changes,
            overrides: args.overrides,
        })
    }
}

pub(crate) fn run_command(args: RunArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let report = run_pipeline(&config.into_request())?;
    log_report(&report);
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<RunConfig, CliError> {
    let merged = RunArgs::merge_from_layers(layers).map_err(CliError::from)?;
    RunConfig::try_from(merged)
}
