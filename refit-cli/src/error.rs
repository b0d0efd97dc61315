//! Error types emitted by the refit CLI.

use std::{io, sync::Arc};

use camino::Utf8PathBuf;
use refit_data::PipelineError;
use thiserror::Error;

/// Errors emitted by the refit CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required value is missing after configuration merging.
    #[error("missing {field} (pass it on the command line or set {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// A logger was already installed.
    #[error("failed to initialise logging")]
    Logging(#[from] log::SetLoggerError),
    /// Help or version text could not be printed.
    #[error("failed to write to standard output")]
    WriteOutput(#[source] io::Error),
    /// The requested operation failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
