//! Entity builders used by unit and behaviour tests across the workspace.

use geo::Coord;

use crate::{Entity, EntityKind, Member, Node, Relation, Tags, Way};

/// Build a tag map from string pairs.
pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// A versioned node at the given location.
pub fn node(id: i64, lon: f64, lat: f64, node_tags: Tags) -> Entity {
    Entity::Node(Node {
        id,
        version: Some(1),
        tags: node_tags,
        location: Coord { x: lon, y: lat },
    })
}

/// A versioned way over `refs`.
pub fn way(id: i64, refs: &[i64], way_tags: Tags) -> Entity {
    Entity::Way(Way {
        id,
        version: Some(1),
        tags: way_tags,
        node_refs: refs.to_vec(),
    })
}

/// A versioned relation with `(kind, id, role)` members.
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

/// A small connected sample: three nodes, one way over them and a route
/// relation containing the way.
pub fn sample_collection() -> Vec<Entity> {
    vec![
        node(1, 11.6256, 52.1199, Tags::new()),
        node(2, 11.6283, 52.1211, tags([("highway", "traffic_signals")])),
        node(3, 11.6310, 52.1224, Tags::new()),
        way(
            10,
            &[1, 2, 3],
            tags([("highway", "unclassified"), ("name", "Mill Lane")]),
        ),
        relation(
            100,
            &[(EntityKind::Way, 10, "forward")],
            tags([("type", "route"), ("route", "bicycle")]),
        ),
    ]
}
