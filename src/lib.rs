//! Facade crate for refitting OpenStreetMap extracts.
//!
//! This crate re-exports the entity model and stream stages from
//! `refit-core` together with the file formats and pipeline from
//! `refit-data`.

#![forbid(unsafe_code)]

pub use refit_core::{
    ChangeOperation, ChangeSource, Changeset, CodecError, Diagnostics, Entity, EntityDiff,
    EntityKey, EntityKind, EntitySink, Member, MergeFile, NetworkStripper, Node, OverrideIndex,
    OverrideRule, Relation, StageError, StreamSummary, TagAction, TagPatch, Tags, Warning, Way,
};
pub use refit_data::{
    ChangeFileDescriptor, ChangeFileError, ChangeSemantics, ConfigurationError, DiffReport,
    OverrideRuleError, PipelineError, PipelineReport, PipelineRequest, PipelineState, StripReport,
    codec, diff_files, load_override_rules, run_pipeline, strip_networks_file,
};
