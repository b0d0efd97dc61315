//! Entity builders and strategies shared by the core integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use geo::Coord;
use proptest::prelude::*;
use refit_core::{Entity, EntityKind, Member, Node, Relation, Tags, Way};

/// Build a tag map from string pairs.
pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

pub fn node(id: i64, lon: f64, lat: f64, node_tags: Tags) -> Entity {
    Entity::Node(Node {
        id,
        version: Some(1),
        tags: node_tags,
        location: Coord { x: lon, y: lat },
    })
}

pub fn way(id: i64, refs: &[i64], way_tags: Tags) -> Entity {
    Entity::Way(Way {
        id,
        version: Some(1),
        tags: way_tags,
        node_refs: refs.to_vec(),
    })
}

pub fn relation(id: i64, members: &[(EntityKind, i64, &str)], relation_tags: Tags) -> Entity {
    Entity::Relation(Relation {
        id,
        version: Some(1),
        tags: relation_tags,
        members: members
            .iter()
            .map(|(kind, member_id, role)| Member::new(*kind, *member_id, *role))
            .collect(),
    })
}

fn tag_strategy() -> impl Strategy<Value = Tags> {
    prop::collection::btree_map("[a-z:]{1,8}", "[A-Za-z0-9 ]{1,8}", 0..4)
}

fn entity_strategy() -> impl Strategy<Value = Entity> {
    prop_oneof![
        (1_i64..500, -180.0_f64..180.0, -90.0_f64..90.0, tag_strategy())
            .prop_map(|(id, lon, lat, node_tags)| node(id, lon, lat, node_tags)),
        (1_i64..500, prop::collection::vec(1_i64..500, 2..6), tag_strategy())
            .prop_map(|(id, refs, way_tags)| way(id, &refs, way_tags)),
        (1_i64..500, tag_strategy()).prop_map(|(id, relation_tags)| {
            relation(id, &[(EntityKind::Way, id, "outer")], relation_tags)
        }),
    ]
}

/// Collections with unique identities, kept in generation order.
pub fn collection_strategy() -> impl Strategy<Value = Vec<Entity>> {
    prop::collection::vec(entity_strategy(), 0..40).prop_map(|entities| {
        let mut seen = std::collections::HashSet::new();
        entities
            .into_iter()
            .filter(|entity| seen.insert(entity.key()))
            .collect()
    })
}
