//! File formats and orchestration for refitting OpenStreetMap extracts.
//!
//! Responsibilities:
//! - Read and write entity files (PBF, OSM XML, OPL) and change files (OSC),
//!   with transparent bzip2 handling.
//! - Discover, order and load change files; load override rules.
//! - Run the modification pipeline and publish its output atomically.
//!
//! Boundaries:
//! - Stream semantics live in `refit-core`; this crate only wires them to
//!   files.
//!
//! Invariants:
//! - Configuration is fully validated before the base extract is streamed.
//! - A failed run never replaces an existing output file.

#![forbid(unsafe_code)]

mod changes;
pub mod codec;
mod diff;
mod pipeline;
mod rules;

pub use changes::{
    ChangeFileDescriptor, ChangeFileError, ChangeSemantics, discover_change_files,
    load_change_sources, sort_change_files,
};
pub use diff::{DiffReport, diff_files};
pub use pipeline::{
    ConfigurationError, PipelineError, PipelineReport, PipelineRequest, PipelineState,
    StripReport, run_pipeline, strip_networks_file, write_stream,
};
pub use rules::{OverrideRuleError, load_override_rules, parse_override_rules};
