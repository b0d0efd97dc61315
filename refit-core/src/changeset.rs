//! Replace-semantics application of a single OSC change file.
//!
//! Operations are indexed by entity identity before streaming starts; change
//! files are small while the base extract is not. The base stream is then read
//! once: deleted entities are dropped, modified entities are swapped for their
//! replacement, and fresh creations are appended after the base is exhausted.

use std::collections::HashMap;

use log::debug;

use crate::{Diagnostics, Entity, EntityKey, EntityResult, StageError, Warning};

/// One operation of an OSM change file.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOperation {
    /// Add a new entity.
    Create(Entity),
    /// Replace an existing entity wholesale.
    Modify(Entity),
    /// Remove an existing entity.
    Delete(EntityKey),
}

impl ChangeOperation {
    /// Identity targeted by the operation.
    #[must_use]
    pub const fn key(&self) -> EntityKey {
        match self {
            Self::Create(entity) | Self::Modify(entity) => entity.key(),
            Self::Delete(key) => *key,
        }
    }
}

/// An ordered list of operations loaded from one change file.
///
/// # Examples
/// ```
/// use refit_core::{ChangeOperation, Changeset, EntityKey};
///
/// let changeset = Changeset::new("010-cleanup.osc", vec![ChangeOperation::Delete(EntityKey::way(4))]);
/// assert_eq!(changeset.name(), "010-cleanup.osc");
/// assert_eq!(changeset.operations().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    name: String,
    operations: Vec<ChangeOperation>,
}

impl Changeset {
    /// Wrap operations read from the named change file.
    pub fn new(name: impl Into<String>, operations: Vec<ChangeOperation>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }

    /// File name the operations came from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operations in file order.
    #[must_use]
    pub fn operations(&self) -> &[ChangeOperation] {
        &self.operations
    }
}

/// Net effect of every operation targeting one identity.
#[derive(Debug, Clone)]
enum Resolution {
    /// The entity is new to this file's input.
    Created(Entity),
    /// The upstream entity is replaced.
    Modified(Entity),
    /// The upstream entity is removed.
    Deleted,
    /// Deleted, then created again. Replaces the upstream entity if there is
    /// one, otherwise it is appended like a creation.
    Recreated(Entity),
    /// Created and deleted within the same file.
    Cancelled,
}

#[derive(Debug, Clone)]
struct PendingChange {
    resolution: Resolution,
    /// The first operation assumed the entity already existed upstream.
    requires_upstream: bool,
    observed: bool,
    /// The key is listed in the creation order.
    queued: bool,
}

impl PendingChange {
    fn fold(&mut self, operation: ChangeOperation) {
        self.resolution = match (&self.resolution, operation) {
            (
                Resolution::Created(_) | Resolution::Cancelled,
                ChangeOperation::Create(entity) | ChangeOperation::Modify(entity),
            ) => Resolution::Created(entity),
            (Resolution::Created(_) | Resolution::Cancelled, ChangeOperation::Delete(_)) => {
                Resolution::Cancelled
            }
            (
                Resolution::Deleted | Resolution::Recreated(_),
                ChangeOperation::Create(entity),
            )
            | (Resolution::Recreated(_), ChangeOperation::Modify(entity)) => {
                Resolution::Recreated(entity)
            }
            (
                Resolution::Modified(_),
                ChangeOperation::Create(entity) | ChangeOperation::Modify(entity),
            )
            | (Resolution::Deleted, ChangeOperation::Modify(entity)) => Resolution::Modified(entity),
            (
                Resolution::Modified(_) | Resolution::Deleted | Resolution::Recreated(_),
                ChangeOperation::Delete(_),
            ) => Resolution::Deleted,
        };
    }
}

/// Operations of one changeset folded per identity.
#[derive(Debug, Clone)]
struct ChangesetIndex {
    changes: HashMap<EntityKey, PendingChange>,
    creation_order: Vec<EntityKey>,
}

impl ChangesetIndex {
    fn build(operations: Vec<ChangeOperation>) -> Self {
        let mut changes: HashMap<EntityKey, PendingChange> = HashMap::new();
        let mut creation_order = Vec::new();
        for operation in operations {
            let key = operation.key();
            if let Some(pending) = changes.get_mut(&key) {
                pending.fold(operation);
                if !pending.queued && matches!(pending.resolution, Resolution::Recreated(_)) {
                    pending.queued = true;
                    creation_order.push(key);
                }
                continue;
            }
            let pending = match operation {
                ChangeOperation::Create(entity) => {
                    creation_order.push(key);
                    PendingChange {
                        resolution: Resolution::Created(entity),
                        requires_upstream: false,
                        observed: false,
                        queued: true,
                    }
                }
                ChangeOperation::Modify(entity) => PendingChange {
                    resolution: Resolution::Modified(entity),
                    requires_upstream: true,
                    observed: false,
                    queued: false,
                },
                ChangeOperation::Delete(_) => PendingChange {
                    resolution: Resolution::Deleted,
                    requires_upstream: true,
                    observed: false,
                    queued: false,
                },
            };
            changes.insert(key, pending);
        }
        Self {
            changes,
            creation_order,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Creating,
    Done,
}

/// Stream adapter applying one [`Changeset`] to its upstream.
///
/// Unresolved deletes become [`Warning::UnresolvedDelete`]; unresolved
/// modifications end the stream with [`StageError::UnresolvedModify`].
///
/// # Examples
/// ```
/// use refit_core::{
///     ApplyChangeset, ChangeOperation, Changeset, Diagnostics, Entity, EntityKey, Tags, Way,
/// };
///
/// let way = |id: i64, highway: &str| {
///     Entity::Way(Way {
///         id,
///         version: None,
///         tags: Tags::from([("highway".into(), highway.into())]),
///         node_refs: vec![1, 2],
///     })
/// };
/// let changeset = Changeset::new(
///     "fix.osc",
///     vec![ChangeOperation::Modify(way(1, "primary"))],
/// );
/// let base = vec![Ok(way(1, "unclassified"))];
/// let output: Vec<Entity> = ApplyChangeset::new(base.into_iter(), changeset, Diagnostics::new())
///     .collect::<Result<_, _>>()?;
/// assert_eq!(output, vec![way(1, "primary")]);
/// # Ok::<(), refit_core::StageError>(())
/// ```
#[derive(Debug)]
pub struct ApplyChangeset<I> {
    upstream: I,
    name: String,
    index: ChangesetIndex,
    diagnostics: Diagnostics,
    creations: std::vec::IntoIter<Entity>,
    phase: Phase,
}

impl<I> ApplyChangeset<I>
where
    I: Iterator<Item = EntityResult>,
{
    /// Wrap `upstream`, indexing the changeset's operations up front.
    pub fn new(upstream: I, changeset: Changeset, diagnostics: Diagnostics) -> Self {
        let Changeset { name, operations } = changeset;
        debug!("indexing {} operations from {name}", operations.len());
        Self {
            upstream,
            name,
            index: ChangesetIndex::build(operations),
            diagnostics,
            creations: Vec::new().into_iter(),
            phase: Phase::Streaming,
        }
    }

    fn patch(&mut self, entity: Entity) -> Option<Entity> {
        let key = entity.key();
        let Some(pending) = self.index.changes.get_mut(&key) else {
            return Some(entity);
        };
        let first_sighting = !pending.observed;
        pending.observed = true;
        match &pending.resolution {
            Resolution::Modified(replacement) | Resolution::Recreated(replacement) => {
                Some(replacement.clone())
            }
            Resolution::Deleted => None,
            Resolution::Created(_) => {
                if first_sighting {
                    self.diagnostics.warn(Warning::CreateCollision {
                        file: self.name.clone(),
                        key,
                    });
                }
                Some(entity)
            }
            Resolution::Cancelled => Some(entity),
        }
    }

    /// Resolve end-of-upstream bookkeeping, returning the entities to append.
    fn finish_upstream(&mut self) -> Result<Vec<Entity>, StageError> {
        let mut unresolved_modifies = Vec::new();
        let mut unresolved_deletes = Vec::new();
        for (key, pending) in &self.index.changes {
            if !pending.requires_upstream || pending.observed {
                continue;
            }
            match pending.resolution {
                Resolution::Modified(_) => unresolved_modifies.push(*key),
                Resolution::Deleted | Resolution::Recreated(_) => unresolved_deletes.push(*key),
                Resolution::Created(_) | Resolution::Cancelled => {}
            }
        }

        unresolved_deletes.sort_unstable();
        for key in unresolved_deletes {
            self.diagnostics.warn(Warning::UnresolvedDelete {
                file: self.name.clone(),
                key,
            });
        }

        if !unresolved_modifies.is_empty() {
            unresolved_modifies.sort_unstable();
            return Err(StageError::UnresolvedModify {
                file: self.name.clone(),
                keys: unresolved_modifies,
            });
        }

        let mut creations = Vec::with_capacity(self.index.creation_order.len());
        for key in std::mem::take(&mut self.index.creation_order) {
            let Some(pending) = self.index.changes.remove(&key) else {
                continue;
            };
            match pending.resolution {
                Resolution::Created(entity) => creations.push(entity),
                Resolution::Recreated(entity) if !pending.observed => creations.push(entity),
                _ => {}
            }
        }
        debug!("{}: appending {} created entities", self.name, creations.len());
        Ok(creations)
    }
}

impl<I> Iterator for ApplyChangeset<I>
where
    I: Iterator<Item = EntityResult>,
{
    type Item = EntityResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Streaming => match self.upstream.next() {
                    Some(Ok(entity)) => {
                        if let Some(patched) = self.patch(entity) {
                            return Some(Ok(patched));
                        }
                    }
                    Some(Err(err)) => {
                        self.phase = Phase::Done;
                        return Some(Err(err));
                    }
                    None => match self.finish_upstream() {
                        Ok(creations) => {
                            self.creations = creations.into_iter();
                            self.phase = Phase::Creating;
                        }
                        Err(err) => {
                            self.phase = Phase::Done;
                            return Some(Err(err));
                        }
                    },
                },
                Phase::Creating => {
                    if let Some(created) = self.creations.next() {
                        return Some(Ok(created));
                    }
                    self.phase = Phase::Done;
                }
                Phase::Done => return None,
            }
        }
    }
}
