//! Merge-semantics application of full OSM or OPL data files.
//!
//! Upstream entities pass through untouched and the file's entities follow.
//! Nothing is deduplicated: an id present both upstream and in the file
//! appears twice in the output.

use crate::{Entity, EntityResult};

/// Entities loaded from one data-dump style file.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeFile {
    name: String,
    entities: Vec<Entity>,
}

impl MergeFile {
    /// Wrap entities read from the named file.
    pub fn new(name: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self {
            name: name.into(),
            entities,
        }
    }

    /// File name the entities came from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entities in file order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

/// Stream adapter appending a [`MergeFile`] after its upstream.
///
/// Appended entities are only emitted once the upstream ends cleanly; an
/// upstream error terminates the stream.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use refit_core::{AppendEntities, Entity, MergeFile, Node, Tags};
///
/// let node = |x: f64| {
///     Entity::Node(Node { id: 1, version: None, tags: Tags::new(), location: Coord { x, y: 0.0 } })
/// };
/// let base = vec![Ok(node(0.0))];
/// let merge = MergeFile::new("extra.opl", vec![node(1.0)]);
/// let merged: Vec<_> = AppendEntities::new(base.into_iter(), merge)
///     .collect::<Result<_, _>>()?;
/// assert_eq!(merged.len(), 2);
/// # Ok::<(), refit_core::StageError>(())
/// ```
#[derive(Debug)]
pub struct AppendEntities<I> {
    upstream: Option<I>,
    appended: std::vec::IntoIter<Entity>,
}

impl<I> AppendEntities<I>
where
    I: Iterator<Item = EntityResult>,
{
    /// Wrap `upstream`, queueing the merge file's entities behind it.
    pub fn new(upstream: I, merge: MergeFile) -> Self {
        Self {
            upstream: Some(upstream),
            appended: merge.entities.into_iter(),
        }
    }
}

impl<I> Iterator for AppendEntities<I>
where
    I: Iterator<Item = EntityResult>,
{
    type Item = EntityResult;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(upstream) = self.upstream.as_mut() {
            match upstream.next() {
                Some(Ok(entity)) => return Some(Ok(entity)),
                Some(Err(err)) => {
                    self.upstream = None;
                    self.appended = Vec::new().into_iter();
                    return Some(Err(err));
                }
                None => self.upstream = None,
            }
        }
        self.appended.next().map(Ok)
    }
}
