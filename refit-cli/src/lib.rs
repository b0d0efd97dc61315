//! Command-line interface for refitting OpenStreetMap extracts.
#![forbid(unsafe_code)]

use std::{error::Error as _, ffi::OsString};

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use log::info;
use refit_core::NetworkStripper;
use refit_data::{PipelineReport, PipelineRequest, diff_files, run_pipeline, strip_networks_file};
use refit_fs::PathKind;

mod error;
mod logging;
mod run;

pub use error::CliError;
use run::RunArgs;

pub(crate) const ARG_INPUT: &str = "input";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_CHANGES: &str = "changes";
pub(crate) const ARG_OVERRIDES: &str = "overrides";
pub(crate) const ENV_RUN_INPUT: &str = "REFIT_CMDS_RUN_INPUT";
pub(crate) const ENV_RUN_OUTPUT: &str = "REFIT_CMDS_RUN_OUTPUT";

/// Networks removed by `strip-networks` when none are given.
pub const DEFAULT_STRIPPED_NETWORKS: [&str; 3] = ["AU:QLD:S", "AU:QLD:MR", "AU:QLD:NR"];

/// Run the refit CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the command fails.
pub fn run() -> Result<(), CliError> {
    logging::init_logging()?;
    run_with_args(std::env::args_os())
}

/// Parse `args` (including the program name) and execute the command.
///
/// Help and version requests print their text and succeed.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the command fails.
pub fn run_with_args<I, T>(args: I) -> Result<(), CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            err.print().map_err(CliError::WriteOutput)?;
            return Ok(());
        }
        Err(err) => return Err(CliError::ArgumentParsing(err)),
    };
    execute(cli.command)
}

/// Format `err` and its causes, one per line, for standard error.
#[must_use]
pub fn render_error(err: &CliError) -> String {
    let mut rendered = format!("refit: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    rendered
}

#[derive(Debug, Parser)]
#[command(
    name = "refit",
    about = "Apply change files and tag overrides to OpenStreetMap extracts",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply every change file in a directory, in byte-wise name order.
    ApplyChanges(ApplyChangesArgs),
    /// Apply JSON tag override rules.
    ApplyOverrides(ApplyOverridesArgs),
    /// Apply change files, then tag overrides, in one pass.
    Run(RunArgs),
    /// Write the difference between two extracts as an OSM change file.
    Diff(DiffArgs),
    /// Remove network route tags from ways and drop matching route relations.
    StripNetworks(StripNetworksArgs),
}

#[derive(Debug, Clone, Args)]
struct ApplyChangesArgs {
    /// Base extract (.osm.pbf, .osm, .opl, optionally .bz2).
    #[arg(value_name = "input")]
    input: Utf8PathBuf,
    /// Destination extract; the format follows the extension.
    #[arg(value_name = "output")]
    output: Utf8PathBuf,
    /// Directory containing .osc, .osm and .opl change files.
    #[arg(value_name = "changes-dir")]
    changes: Utf8PathBuf,
}

#[derive(Debug, Clone, Args)]
struct ApplyOverridesArgs {
    /// Base extract.
    #[arg(value_name = "input")]
    input: Utf8PathBuf,
    /// Destination extract.
    #[arg(value_name = "output")]
    output: Utf8PathBuf,
    /// JSON array of override rules.
    #[arg(value_name = "rules")]
    overrides: Utf8PathBuf,
}

#[derive(Debug, Clone, Args)]
struct DiffArgs {
    /// Extract before modification.
    #[arg(value_name = "original")]
    original: Utf8PathBuf,
    /// Extract after modification.
    #[arg(value_name = "modified")]
    modified: Utf8PathBuf,
    /// Destination change file (.osc or .osc.bz2).
    #[arg(value_name = "output")]
    output: Utf8PathBuf,
}

#[derive(Debug, Clone, Args)]
struct StripNetworksArgs {
    /// Base extract.
    #[arg(value_name = "input")]
    input: Utf8PathBuf,
    /// Destination extract.
    #[arg(value_name = "output")]
    output: Utf8PathBuf,
    /// Network tag value to strip; repeat for several.
    #[arg(
        long = "network",
        value_name = "value",
        default_values_t = DEFAULT_STRIPPED_NETWORKS.map(String::from)
    )]
    networks: Vec<String>,
}

fn execute(command: Command) -> Result<(), CliError> {
    match command {
        Command::ApplyChanges(args) => {
            require_file(&args.input, ARG_INPUT)?;
            let request = PipelineRequest::new(args.input, args.output).with_changes(args.changes);
            log_report(&run_pipeline(&request)?);
        }
        Command::ApplyOverrides(args) => {
            require_file(&args.input, ARG_INPUT)?;
            require_file(&args.overrides, ARG_OVERRIDES)?;
            let request =
                PipelineRequest::new(args.input, args.output).with_overrides(args.overrides);
            log_report(&run_pipeline(&request)?);
        }
        Command::Run(args) => run::run_command(args)?,
        Command::Diff(args) => {
            require_file(&args.original, "original")?;
            require_file(&args.modified, "modified")?;
            let report = diff_files(&args.original, &args.modified, &args.output)?;
            info!("Diff complete: {} operation(s)", report.total());
        }
        Command::StripNetworks(args) => {
            require_file(&args.input, ARG_INPUT)?;
            let report = strip_networks_file(
                &args.input,
                &args.output,
                NetworkStripper::new(args.networks),
            )?;
            info!(
                "Modified {} way(s), dropped {} relation(s)",
                report.stats.modified_ways, report.stats.dropped_relations
            );
        }
    }
    Ok(())
}

pub(crate) fn log_report(report: &PipelineReport) {
    if report.warnings.is_empty() {
        info!("Done: {}", report.summary);
    } else {
        info!(
            "Done with {} warning(s): {}",
            report.warnings.len(),
            report.summary
        );
    }
}

pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match refit_fs::path_kind(path) {
        Ok(PathKind::File) => Ok(()),
        Ok(PathKind::Missing) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Ok(_) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
