//! Comparison of two entity collections into change operations.

use std::collections::BTreeMap;

use crate::{ChangeOperation, Entity, EntityKey, EntityKind};

/// Largest coordinate difference, in degrees, treated as "unchanged".
pub const LOCATION_TOLERANCE: f64 = 1e-7;

/// Whether two entities with the same identity carry the same content.
///
/// Versions are ignored: edited extracts frequently keep the old version.
#[must_use]
pub fn same_content(original: &Entity, modified: &Entity) -> bool {
    if original.tags() != modified.tags() {
        return false;
    }
    match (original, modified) {
        (Entity::Node(a), Entity::Node(b)) => {
            (a.location.x - b.location.x).abs() <= LOCATION_TOLERANCE
                && (a.location.y - b.location.y).abs() <= LOCATION_TOLERANCE
        }
        (Entity::Way(a), Entity::Way(b)) => a.node_refs == b.node_refs,
        (Entity::Relation(a), Entity::Relation(b)) => a.members == b.members,
        _ => false,
    }
}

/// Per-kind operation counts for one diff section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    /// Node operations.
    pub nodes: usize,
    /// Way operations.
    pub ways: usize,
    /// Relation operations.
    pub relations: usize,
}

impl KindCounts {
    fn tally<'a>(keys: impl Iterator<Item = &'a EntityKey>) -> Self {
        let mut counts = Self::default();
        for key in keys {
            match key.kind {
                EntityKind::Node => counts.nodes += 1,
                EntityKind::Way => counts.ways += 1,
                EntityKind::Relation => counts.relations += 1,
            }
        }
        counts
    }

    /// Total across kinds.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.nodes + self.ways + self.relations
    }
}

/// Differences between an original and a modified collection.
///
/// Each section is keyed by identity, so iteration yields nodes, then ways,
/// then relations, each in ascending id order.
///
/// # Examples
/// ```
/// use refit_core::{ChangeOperation, Entity, EntityDiff, EntityKey, Tags, Way};
///
/// let way = |id: i64, highway: &str| {
///     Entity::Way(Way {
///         id,
///         version: Some(1),
///         tags: Tags::from([("highway".into(), highway.into())]),
///         node_refs: vec![1, 2],
///     })
/// };
/// let diff = EntityDiff::compute(
///     vec![way(1, "track"), way(2, "path")],
///     vec![way(1, "service"), way(3, "path")],
/// );
/// let operations = diff.into_operations();
/// assert_eq!(operations.len(), 3);
/// assert_eq!(operations[0], ChangeOperation::Create(way(3, "path")));
/// assert_eq!(operations[2], ChangeOperation::Delete(EntityKey::way(2)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDiff {
    created: BTreeMap<EntityKey, Entity>,
    modified: BTreeMap<EntityKey, Entity>,
    deleted: BTreeMap<EntityKey, Entity>,
}

fn index(entities: impl IntoIterator<Item = Entity>) -> BTreeMap<EntityKey, Entity> {
    entities
        .into_iter()
        .map(|entity| (entity.key(), entity))
        .collect()
}

impl EntityDiff {
    /// Compare two collections. Duplicate ids within one side keep the last copy.
    pub fn compute(
        original: impl IntoIterator<Item = Entity>,
        modified: impl IntoIterator<Item = Entity>,
    ) -> Self {
        let mut original = index(original);
        let mut diff = Self::default();
        for (key, entity) in index(modified) {
            match original.remove(&key) {
                None => {
                    diff.created.insert(key, entity);
                }
                Some(before) if !same_content(&before, &entity) => {
                    diff.modified.insert(key, entity);
                }
                Some(_) => {}
            }
        }
        diff.deleted = original;
        diff
    }

    /// Whether the collections are equivalent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Counts of created entities.
    #[must_use]
    pub fn created_counts(&self) -> KindCounts {
        KindCounts::tally(self.created.keys())
    }

    /// Counts of modified entities.
    #[must_use]
    pub fn modified_counts(&self) -> KindCounts {
        KindCounts::tally(self.modified.keys())
    }

    /// Counts of deleted entities.
    #[must_use]
    pub fn deleted_counts(&self) -> KindCounts {
        KindCounts::tally(self.deleted.keys())
    }

    /// Operations in create, modify, delete order.
    #[must_use]
    pub fn into_operations(self) -> Vec<ChangeOperation> {
        let Self {
            created,
            modified,
            deleted,
        } = self;
        created
            .into_values()
            .map(ChangeOperation::Create)
            .chain(modified.into_values().map(ChangeOperation::Modify))
            .chain(deleted.into_keys().map(ChangeOperation::Delete))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{node, relation, sample_collection, tags, way};
    use crate::{ApplyChangeset, Changeset, Diagnostics, Tags};
    use rstest::rstest;

    #[rstest]
    fn identical_collections_have_no_diff() {
        assert!(EntityDiff::compute(sample_collection(), sample_collection()).is_empty());
    }

    #[rstest]
    #[case(node(1, 11.6256, 52.1199, Tags::new()), node(1, 11.625_600_05, 52.1199, Tags::new()), true)]
    #[case(node(1, 11.6256, 52.1199, Tags::new()), node(1, 11.6257, 52.1199, Tags::new()), false)]
    #[case(way(1, &[1, 2], Tags::new()), way(1, &[2, 1], Tags::new()), false)]
    #[case(
        relation(1, &[(EntityKind::Way, 2, "outer")], Tags::new()),
        relation(1, &[(EntityKind::Way, 2, "inner")], Tags::new()),
        false
    )]
    #[case(way(1, &[1], tags([("a", "b")])), way(1, &[1], tags([("a", "c")])), false)]
    fn compares_content(#[case] a: Entity, #[case] b: Entity, #[case] same: bool) {
        assert_eq!(same_content(&a, &b), same);
    }

    #[rstest]
    fn version_changes_alone_are_ignored() {
        let before = way(1, &[1, 2], Tags::new());
        let mut after = before.clone();
        if let Entity::Way(inner) = &mut after {
            inner.version = Some(9);
        }
        assert!(same_content(&before, &after));
    }

    #[rstest]
    fn sections_are_ordered_by_kind_then_id() {
        let original = vec![way(5, &[1], Tags::new()), node(9, 0.0, 0.0, Tags::new())];
        let modified = vec![
            relation(2, &[], Tags::new()),
            way(3, &[1], Tags::new()),
            node(4, 0.0, 0.0, Tags::new()),
            way(1, &[1], Tags::new()),
        ];
        let diff = EntityDiff::compute(original, modified);
        assert_eq!(
            diff.created_counts(),
            KindCounts {
                nodes: 1,
                ways: 2,
                relations: 1
            }
        );
        assert_eq!(diff.deleted_counts().total(), 2);
        let keys: Vec<EntityKey> = diff
            .into_operations()
            .iter()
            .map(ChangeOperation::key)
            .collect();
        assert_eq!(
            keys,
            vec![
                EntityKey::node(4),
                EntityKey::way(1),
                EntityKey::way(3),
                EntityKey::relation(2),
                EntityKey::node(9),
                EntityKey::way(5),
            ]
        );
    }

    #[rstest]
    fn applying_the_diff_reproduces_the_modified_content() {
        let original = sample_collection();
        let mut modified = sample_collection();
        modified.retain(|entity| entity.key() != EntityKey::relation(100));
        if let Some(entity) = modified.get_mut(3) {
            entity.tags_mut().insert("surface".into(), "gravel".into());
        }
        modified.push(node(4, 11.64, 52.13, tags([("amenity", "bench")])));

        let operations = EntityDiff::compute(original.clone(), modified.clone()).into_operations();
        let applied: Vec<Entity> = ApplyChangeset::new(
            original.into_iter().map(Ok),
            Changeset::new("diff.osc", operations),
            Diagnostics::new(),
        )
        .collect::<Result<_, _>>()
        .expect("diff applies cleanly to its original");
        assert!(EntityDiff::compute(applied, modified).is_empty());
    }
}
