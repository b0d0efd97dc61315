//! Core model and stream stages for refitting OpenStreetMap extracts.
//!
//! Responsibilities:
//! - Define the entity model and kind-scoped identities.
//! - Provide lazy stream adapters for change files, merge files, tag
//!   overrides and network stripping.
//! - Collect non-fatal findings through a shared [`Diagnostics`] handle.
//!
//! Boundaries:
//! - No file-system or format knowledge; codecs live in `refit-data`.
//!
//! Invariants:
//! - Stages never reorder entities they pass through.
//! - An upstream error ends every downstream stage.

#![forbid(unsafe_code)]

mod changeset;
mod diagnostics;
mod diff;
mod entity;
mod merge;
mod networks;
mod overrides;
mod sources;
mod stream;
mod summary;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use changeset::{ApplyChangeset, ChangeOperation, Changeset};
pub use diagnostics::{Diagnostics, Warning};
pub use diff::{EntityDiff, KindCounts, LOCATION_TOLERANCE, same_content};
pub use entity::{
    Entity, EntityKey, EntityKind, Member, Node, Relation, Tags, UnknownEntityKind, Way,
};
pub use merge::{AppendEntities, MergeFile};
pub use networks::{NetworkStripper, StripNetworks, StripStats};
pub use overrides::{ApplyOverrides, OverrideIndex, OverrideRule, TagAction, TagPatch};
pub use sources::{ChangeSource, apply_change_sources};
pub use stream::{
    CodecError, EntityResult, EntitySink, EntityStream, StageError, VecSink, lift_codec_stream,
};
pub use summary::StreamSummary;
