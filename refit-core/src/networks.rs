//! Removal of route network tagging from highway ways and route relations.
//!
//! `network` and `ref` values are semicolon-delimited lists whose entries
//! correspond by position. Stripping a network removes the `ref` entry at the
//! same position; tags left with no entries are removed entirely.

use std::collections::BTreeSet;

use log::{debug, info};

use crate::{Entity, EntityResult, Relation, Tags};

const NETWORK: &str = "network";
const REF: &str = "ref";
const DESTINATION_REF: &str = "destination:ref";

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn is_numeric_only(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn set_or_remove(tags: &mut Tags, key: &str, items: &[&str]) {
    if items.is_empty() {
        tags.remove(key);
    } else {
        tags.insert(key.to_owned(), items.join(";"));
    }
}

/// Counts reported by [`StripNetworks`] once its upstream is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripStats {
    /// Ways seen.
    pub ways: u64,
    /// Ways carrying a `highway` tag.
    pub highway_ways: u64,
    /// Highway ways whose tags changed.
    pub modified_ways: u64,
    /// Relations seen.
    pub relations: u64,
    /// Relations dropped from the output.
    pub dropped_relations: u64,
}

/// Strips a fixed set of route networks.
///
/// # Examples
/// ```
/// use refit_core::{NetworkStripper, Tags};
///
/// let stripper = NetworkStripper::new(["AU:QLD:S"]);
/// let mut tags = Tags::from([
///     ("highway".into(), "primary".into()),
///     ("network".into(), "AU:QLD:S;AU:NR".into()),
///     ("ref".into(), "23;A1".into()),
/// ]);
/// assert!(stripper.strip_way_tags(&mut tags));
/// assert_eq!(tags.get("network").map(String::as_str), Some("AU:NR"));
/// assert_eq!(tags.get("ref").map(String::as_str), Some("A1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStripper {
    networks: BTreeSet<String>,
}

impl NetworkStripper {
    /// Strip the given network names.
    pub fn new<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            networks: networks.into_iter().map(Into::into).collect(),
        }
    }

    /// Networks being stripped, sorted.
    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.iter().map(String::as_str)
    }

    fn lists_target(&self, tags: &Tags) -> bool {
        tags.get(NETWORK).is_some_and(|value| {
            split_list(value)
                .iter()
                .any(|network| self.networks.contains(*network))
        })
    }

    /// Rewrite the tags of a way, returning whether anything changed.
    ///
    /// Ways without a `highway` tag are left alone.
    pub fn strip_way_tags(&self, tags: &mut Tags) -> bool {
        if !tags.contains_key("highway") {
            return false;
        }
        let mut changed = false;

        if self.lists_target(tags) {
            let network_value = tags.get(NETWORK).cloned().unwrap_or_default();
            let ref_value = tags.get(REF).cloned().unwrap_or_default();
            let networks = split_list(&network_value);
            let refs = split_list(&ref_value);
            let removed: Vec<usize> = networks
                .iter()
                .enumerate()
                .filter(|(_, network)| self.networks.contains(**network))
                .map(|(position, _)| position)
                .collect();
            let kept_networks: Vec<&str> = networks
                .iter()
                .enumerate()
                .filter(|(position, _)| !removed.contains(position))
                .map(|(_, network)| *network)
                .collect();
            let kept_refs: Vec<&str> = refs
                .iter()
                .enumerate()
                .filter(|(position, _)| !removed.contains(position))
                .map(|(_, value)| *value)
                .collect();
            set_or_remove(tags, NETWORK, &kept_networks);
            if tags.contains_key(REF) {
                set_or_remove(tags, REF, &kept_refs);
            }
            changed = true;
        }

        if tags
            .get(DESTINATION_REF)
            .is_some_and(|value| is_numeric_only(value))
        {
            tags.remove(DESTINATION_REF);
            changed = true;
        }
        changed
    }

    /// Whether a relation belongs to a stripped network and must be dropped.
    #[must_use]
    pub fn drops_relation(&self, relation: &Relation) -> bool {
        self.lists_target(&relation.tags)
    }
}

/// Stream adapter applying a [`NetworkStripper`].
#[derive(Debug)]
pub struct StripNetworks<I> {
    upstream: I,
    stripper: NetworkStripper,
    stats: StripStats,
    finished: bool,
}

impl<I> StripNetworks<I>
where
    I: Iterator<Item = EntityResult>,
{
    /// Wrap `upstream`.
    pub fn new(upstream: I, stripper: NetworkStripper) -> Self {
        Self {
            upstream,
            stripper,
            stats: StripStats::default(),
            finished: false,
        }
    }

    /// Counts gathered so far.
    #[must_use]
    pub const fn stats(&self) -> StripStats {
        self.stats
    }

    fn process(&mut self, entity: Entity) -> Option<Entity> {
        match entity {
            Entity::Way(mut way) => {
                self.stats.ways += 1;
                if way.tags.contains_key("highway") {
                    self.stats.highway_ways += 1;
                }
                if self.stripper.strip_way_tags(&mut way.tags) {
                    self.stats.modified_ways += 1;
                    debug!("stripped network tagging from way {}", way.id);
                }
                Some(Entity::Way(way))
            }
            Entity::Relation(relation) => {
                self.stats.relations += 1;
                if self.stripper.drops_relation(&relation) {
                    self.stats.dropped_relations += 1;
                    debug!("dropped relation {}", relation.id);
                    None
                } else {
                    Some(Entity::Relation(relation))
                }
            }
            node @ Entity::Node(_) => Some(node),
        }
    }
}

impl<I> Iterator for StripNetworks<I>
where
    I: Iterator<Item = EntityResult>,
{
    type Item = EntityResult;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.upstream.next() {
                Some(Ok(entity)) => {
                    if let Some(kept) = self.process(entity) {
                        return Some(Ok(kept));
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    let stats = self.stats;
                    info!(
                        "Network strip: {} ways ({} highway, {} modified); {} relations ({} dropped)",
                        stats.ways,
                        stats.highway_ways,
                        stats.modified_ways,
                        stats.relations,
                        stats.dropped_relations
                    );
                }
            }
        }
        None
    }
}
