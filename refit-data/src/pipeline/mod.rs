//! Extract modification pipeline: change files, then tag overrides, then
//! atomic publication of the result.
//!
//! Change files and override rules are parsed in full before the base
//! extract is opened for streaming, so configuration errors never leave a
//! partially written output behind. The output is staged next to its
//! destination and only renamed into place once every stage has succeeded.

mod state;

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use refit_core::{
    ApplyOverrides, CodecError, Diagnostics, EntityStream, NetworkStripper, OverrideIndex,
    StageError, StreamSummary, StripNetworks, StripStats, Warning, apply_change_sources,
    lift_codec_stream,
};
use refit_fs::{PathKind, StagedFile};
use thiserror::Error;

use crate::{
    ChangeFileError, OverrideRuleError,
    codec::{open_for_read, writer_for},
    load_change_sources, load_override_rules,
};

pub use state::PipelineState;
use state::StateTrace;

/// Malformed configuration detected before streaming begins.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A change file or the change directory is unusable.
    #[error(transparent)]
    ChangeFiles(#[from] ChangeFileError),
    /// The override rule file is unusable.
    #[error(transparent)]
    OverrideRules(#[from] OverrideRuleError),
}

/// Fatal pipeline failures. No output is published when one is returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input extract is missing or not a regular file.
    #[error("input extract {path:?} is not a readable file")]
    Input {
        /// Offending path.
        path: Utf8PathBuf,
        /// Inspection failure, if the path could not be examined.
        #[source]
        source: Option<io::Error>,
    },
    /// Change files or override rules are malformed.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),
    /// A file could not be opened, decoded or encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A stage rejected the stream.
    #[error(transparent)]
    Stage(#[from] StageError),
    /// The output could not be staged or published.
    #[error("failed to publish output {path:?}")]
    Output {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

impl From<ChangeFileError> for PipelineError {
    fn from(err: ChangeFileError) -> Self {
        Self::Configuration(err.into())
    }
}

impl From<OverrideRuleError> for PipelineError {
    fn from(err: OverrideRuleError) -> Self {
        Self::Configuration(err.into())
    }
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    /// Base extract.
    pub input: Utf8PathBuf,
    /// Destination of the modified extract.
    pub output: Utf8PathBuf,
    /// Directory of change files, applied in byte-wise name order.
    pub changes: Option<Utf8PathBuf>,
    /// JSON override rule file, applied after the change files.
    pub overrides: Option<Utf8PathBuf>,
}

impl PipelineRequest {
    /// A request that copies `input` to `output` with no modifications.
    #[must_use]
    pub fn new(input: impl Into<Utf8PathBuf>, output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            changes: None,
            overrides: None,
        }
    }

    /// Apply the change files found in `dir`.
    #[must_use]
    pub fn with_changes(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.changes = Some(dir.into());
        self
    }

    /// Apply the override rules in `path`.
    #[must_use]
    pub fn with_overrides(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.overrides = Some(path.into());
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Counts and bounds of the published output.
    pub summary: StreamSummary,
    /// Every non-fatal finding, in the order it was raised.
    pub warnings: Vec<Warning>,
    /// Number of change files applied.
    pub change_files: usize,
    /// Number of override rules loaded.
    pub override_rules: usize,
    /// States visited, from `Idle` to `Done`.
    pub states: Vec<PipelineState>,
}

fn require_input_file(path: &Utf8Path) -> Result<(), PipelineError> {
    match refit_fs::path_kind(path) {
        Ok(PathKind::File) => Ok(()),
        Ok(_) => Err(PipelineError::Input {
            path: path.to_path_buf(),
            source: None,
        }),
        Err(source) => Err(PipelineError::Input {
            path: path.to_path_buf(),
            source: Some(source),
        }),
    }
}

/// Drain `stream` into a staged copy of `output` and publish it.
///
/// Nothing appears at `output` unless every entity was written and the
/// encoding was finalised.
///
/// # Errors
/// Returns the first stream, encoding or publication failure.
pub fn write_stream(
    stream: EntityStream<'_>,
    output: &Utf8Path,
) -> Result<StreamSummary, PipelineError> {
    let output_error = |source| PipelineError::Output {
        path: output.to_path_buf(),
        source,
    };
    let staged = StagedFile::new(output).map_err(output_error)?;
    let mut sink = writer_for(output, staged.writer().map_err(output_error)?)?;
    let mut summary = StreamSummary::default();
    for entity in stream {
        let entity = entity?;
        summary.record(&entity);
        sink.write(&entity)?;
    }
    sink.finish()?;
    staged.commit().map_err(output_error)?;
    info!("Wrote {output}: {summary}");
    Ok(summary)
}

fn report_warnings(warnings: &[Warning]) {
    if warnings.is_empty() {
        return;
    }
    warn!("{} warning(s):", warnings.len());
    for warning in warnings {
        warn!("  - {warning}");
    }
}

struct Run<'r> {
    request: &'r PipelineRequest,
    diagnostics: Diagnostics,
    trace: StateTrace,
    change_files: usize,
    override_rules: usize,
}

impl Run<'_> {
    fn execute(&mut self) -> Result<StreamSummary, PipelineError> {
        let request = self.request;
        self.trace.advance();
        require_input_file(&request.input)?;
        let sources = match &request.changes {
            Some(dir) => load_change_sources(dir, &self.diagnostics)?,
            None => Vec::new(),
        };
        let rules = match &request.overrides {
            Some(path) => load_override_rules(path)?,
            None => Vec::new(),
        };
        self.change_files = sources.len();
        self.override_rules = rules.len();
        let base = lift_codec_stream(open_for_read(&request.input)?);

        self.trace.advance();
        let changed = apply_change_sources(base, sources, &self.diagnostics);

        self.trace.advance();
        let overridden: EntityStream<'_> = if rules.is_empty() {
            changed
        } else {
            Box::new(ApplyOverrides::new(
                changed,
                OverrideIndex::build(&rules),
                self.diagnostics.clone(),
            ))
        };

        self.trace.advance();
        write_stream(overridden, &request.output)
    }
}

/// Run the pipeline described by `request`.
///
/// Warnings are logged once at the end of the run, whether or not it
/// succeeds, and returned in the report.
///
/// # Errors
/// Returns [`PipelineError`] on any fatal condition; the destination is left
/// untouched in that case.
///
/// # Examples
/// ```no_run
/// use refit_data::{PipelineRequest, run_pipeline};
///
/// # fn main() -> Result<(), refit_data::PipelineError> {
/// let request = PipelineRequest::new("region.osm.pbf", "region-refit.osm.pbf")
///     .with_changes("changes")
///     .with_overrides("overrides.json");
/// let report = run_pipeline(&request)?;
/// println!("{} warnings", report.warnings.len());
/// # Ok(())
/// # }
/// ```
pub fn run_pipeline(request: &PipelineRequest) -> Result<PipelineReport, PipelineError> {
    let mut run = Run {
        request,
        diagnostics: Diagnostics::new(),
        trace: StateTrace::new(),
        change_files: 0,
        override_rules: 0,
    };
    let outcome = run.execute();
    let warnings = run.diagnostics.snapshot();
    report_warnings(&warnings);
    match outcome {
        Ok(summary) => {
            run.trace.advance();
            info!(
                "Pipeline finished: {} change file(s), {} override rule(s), {} warning(s)",
                run.change_files,
                run.override_rules,
                warnings.len()
            );
            Ok(PipelineReport {
                summary,
                warnings,
                change_files: run.change_files,
                override_rules: run.override_rules,
                states: run.trace.into_states(),
            })
        }
        Err(err) => {
            let failed_in = run.trace.current();
            run.trace.fail();
            debug!("pipeline failed while {failed_in}");
            Err(err)
        }
    }
}

/// Outcome of a network strip run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripReport {
    /// Way and relation counts from the stripper.
    pub stats: StripStats,
    /// Counts and bounds of the published output.
    pub summary: StreamSummary,
}

/// Strip `networks` from `input`, publishing the result at `output`.
///
/// # Errors
/// Returns [`PipelineError`] if the input cannot be read or the output
/// cannot be written.
pub fn strip_networks_file(
    input: &Utf8Path,
    output: &Utf8Path,
    stripper: NetworkStripper,
) -> Result<StripReport, PipelineError> {
    require_input_file(input)?;
    info!(
        "Stripping networks [{}] from {input}",
        stripper.networks().collect::<Vec<_>>().join(", ")
    );
    let mut adapter = StripNetworks::new(lift_codec_stream(open_for_read(input)?), stripper);
    let summary = write_stream(Box::new(adapter.by_ref()), output)?;
    Ok(StripReport {
        stats: adapter.stats(),
        summary,
    })
}

#[cfg(test)]
mod tests;
