//! Ordered folding of change files over a base stream.
//!
//! Each file is classified exactly once, when it is loaded, into either a
//! replace-style [`Changeset`] or a merge-style [`MergeFile`]. The fold then
//! wraps the stream stage by stage without re-inspecting file types.

use log::info;

use crate::{AppendEntities, ApplyChangeset, Changeset, Diagnostics, EntityStream, MergeFile};

/// A loaded change file, tagged with the semantics it is applied with.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSource {
    /// OSC file: creates, modifications and deletions patch the stream.
    Changeset(Changeset),
    /// Full OSM or OPL file: entities are appended without deduplication.
    Merge(MergeFile),
}

impl ChangeSource {
    /// Name of the originating file.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Changeset(changeset) => changeset.name(),
            Self::Merge(merge) => merge.name(),
        }
    }

    /// Wrap `upstream` with this file's transformation.
    pub fn apply<'a>(self, upstream: EntityStream<'a>, diagnostics: &Diagnostics) -> EntityStream<'a> {
        match self {
            Self::Changeset(changeset) => Box::new(ApplyChangeset::new(
                upstream,
                changeset,
                diagnostics.clone(),
            )),
            Self::Merge(merge) => Box::new(AppendEntities::new(upstream, merge)),
        }
    }
}

/// Fold `sources` over `base` in the order given.
///
/// Callers are responsible for ordering; an empty source list returns `base`
/// untouched.
///
/// # Examples
/// ```
/// use refit_core::{
///     ChangeSource, Diagnostics, Entity, EntityStream, MergeFile, Tags, Way, apply_change_sources,
/// };
///
/// let way = Entity::Way(Way { id: 5, version: None, tags: Tags::new(), node_refs: vec![1, 2] });
/// let base: EntityStream<'_> = Box::new(vec![Ok(way.clone())].into_iter());
/// let sources = vec![ChangeSource::Merge(MergeFile::new("extra.osm", vec![way]))];
/// let stream = apply_change_sources(base, sources, &Diagnostics::new());
/// assert_eq!(stream.count(), 2);
/// ```
pub fn apply_change_sources<'a>(
    base: EntityStream<'a>,
    sources: Vec<ChangeSource>,
    diagnostics: &Diagnostics,
) -> EntityStream<'a> {
    let total = sources.len();
    sources
        .into_iter()
        .enumerate()
        .fold(base, |stream, (position, source)| {
            let semantics = match source {
                ChangeSource::Changeset(_) => "changeset",
                ChangeSource::Merge(_) => "merge",
            };
            info!(
                "Applying change file {}/{total}: {} ({semantics})",
                position + 1,
                source.name()
            );
            source.apply(stream, diagnostics)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{node, sample_collection, tags, way};
    use crate::{ChangeOperation, Entity, EntityKey, Tags};
    use rstest::rstest;

    fn base_stream() -> EntityStream<'static> {
        Box::new(sample_collection().into_iter().map(Ok))
    }

    #[rstest]
    fn no_sources_is_a_passthrough() {
        let output: Vec<Entity> = apply_change_sources(base_stream(), Vec::new(), &Diagnostics::new())
            .collect::<Result<_, _>>()
            .expect("passthrough succeeds");
        assert_eq!(output, sample_collection());
    }

    #[rstest]
    fn later_files_see_earlier_output() {
        let created = way(-1, &[1, 2], tags([("highway", "footway")]));
        let renamed = way(-1, &[1, 2], tags([("highway", "path")]));
        let sources = vec![
            ChangeSource::Changeset(Changeset::new(
                "001.osc",
                vec![ChangeOperation::Create(created)],
            )),
            ChangeSource::Changeset(Changeset::new(
                "002.osc",
                vec![ChangeOperation::Modify(renamed.clone())],
            )),
        ];
        let output: Vec<Entity> = apply_change_sources(base_stream(), sources, &Diagnostics::new())
            .collect::<Result<_, _>>()
            .expect("second file resolves against first file's creation");
        assert_eq!(output.last(), Some(&renamed));
    }

    #[rstest]
    fn independent_negative_ids_collide() {
        let first = node(-1, 1.0, 1.0, Tags::new());
        let second = node(-1, 2.0, 2.0, Tags::new());
        let sources = vec![
            ChangeSource::Changeset(Changeset::new("a.osc", vec![ChangeOperation::Create(first)])),
            ChangeSource::Changeset(Changeset::new("b.osc", vec![ChangeOperation::Create(second)])),
        ];
        let diagnostics = Diagnostics::new();
        let output: Vec<Entity> = apply_change_sources(base_stream(), sources, &diagnostics)
            .collect::<Result<_, _>>()
            .expect("colliding provisional ids are not rejected");
        let provisional: Vec<_> = output
            .iter()
            .filter(|entity| entity.key() == EntityKey::node(-1))
            .collect();
        assert_eq!(provisional.len(), 2, "provisional ids are not remapped");
        assert_eq!(diagnostics.len(), 1, "the collision is reported once");
    }
}
