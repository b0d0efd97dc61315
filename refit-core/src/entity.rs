//! OpenStreetMap entity model shared by every pipeline stage.
//!
//! Entities are plain owned values. Identifiers are signed because editor
//! exports use negative ids for provisional objects, and those ids are carried
//! through unchanged.

use std::{collections::BTreeMap, fmt, str::FromStr};

use geo::Coord;
use thiserror::Error;

/// Free-form key/value tags attached to an entity.
///
/// A sorted map keeps tag output deterministic across runs.
pub type Tags = BTreeMap<String, String>;

/// The three OSM entity types, ordered the way extracts order them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// A point carrying a location.
    Node,
    /// An ordered list of node references.
    Way,
    /// An ordered list of typed members with roles.
    Relation,
}

impl EntityKind {
    /// Lower-case name as used by OSM XML element and member types.
    ///
    /// # Examples
    /// ```
    /// use refit_core::EntityKind;
    ///
    /// assert_eq!(EntityKind::Relation.as_str(), "relation");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    /// Single-letter prefix used by OPL and compact member references.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    /// Resolve a kind from its OPL letter.
    #[must_use]
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'n' => Some(Self::Node),
            'w' => Some(Self::Way),
            'r' => Some(Self::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown entity kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity type {0:?}")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(UnknownEntityKind(other.to_owned())),
        }
    }
}

/// Identity of an entity: ids are only unique within their kind.
///
/// # Examples
/// ```
/// use refit_core::{EntityKey, EntityKind};
///
/// let key = EntityKey::way(42);
/// assert_eq!(key.kind, EntityKind::Way);
/// assert_eq!(key.to_string(), "way 42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    /// Entity type scoping the id.
    pub kind: EntityKind,
    /// Raw OSM identifier, negative for provisional editor objects.
    pub id: i64,
}

impl EntityKey {
    /// Construct a key from its parts.
    #[must_use]
    pub const fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// Key for a node id.
    #[must_use]
    pub const fn node(id: i64) -> Self {
        Self::new(EntityKind::Node, id)
    }

    /// Key for a way id.
    #[must_use]
    pub const fn way(id: i64) -> Self {
        Self::new(EntityKind::Way, id)
    }

    /// Key for a relation id.
    #[must_use]
    pub const fn relation(id: i64) -> Self {
        Self::new(EntityKind::Relation, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// A node with a WGS84 location (`x = longitude`, `y = latitude`).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// OSM identifier.
    pub id: i64,
    /// Object version, when the source carried one.
    pub version: Option<u32>,
    /// Tags attached to the node.
    pub tags: Tags,
    /// Node position.
    pub location: Coord<f64>,
}

/// A way referencing an ordered list of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    /// OSM identifier.
    pub id: i64,
    /// Object version, when the source carried one.
    pub version: Option<u32>,
    /// Tags attached to the way.
    pub tags: Tags,
    /// Ordered node references.
    pub node_refs: Vec<i64>,
}

/// A typed, role-carrying relation member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Member entity type.
    pub kind: EntityKind,
    /// Member identifier.
    pub id: i64,
    /// Role string; empty when the member has no role.
    pub role: String,
}

impl Member {
    /// Construct a member reference.
    pub fn new(kind: EntityKind, id: i64, role: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            role: role.into(),
        }
    }

    /// Identity of the referenced entity.
    #[must_use]
    pub const fn key(&self) -> EntityKey {
        EntityKey::new(self.kind, self.id)
    }
}

/// A relation grouping other entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// OSM identifier.
    pub id: i64,
    /// Object version, when the source carried one.
    pub version: Option<u32>,
    /// Tags attached to the relation.
    pub tags: Tags,
    /// Ordered members.
    pub members: Vec<Member>,
}

/// Any OSM entity.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use refit_core::{Entity, EntityKey, Node, Tags};
///
/// let entity = Entity::Node(Node {
///     id: 7,
///     version: Some(1),
///     tags: Tags::from([("amenity".into(), "cafe".into())]),
///     location: Coord { x: 13.4, y: 52.5 },
/// });
/// assert_eq!(entity.key(), EntityKey::node(7));
/// assert_eq!(entity.tags().get("amenity").map(String::as_str), Some("cafe"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A node.
    Node(Node),
    /// A way.
    Way(Way),
    /// A relation.
    Relation(Relation),
}

impl Entity {
    /// Entity type.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Way(_) => EntityKind::Way,
            Self::Relation(_) => EntityKind::Relation,
        }
    }

    /// Raw identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Node(node) => node.id,
            Self::Way(way) => way.id,
            Self::Relation(relation) => relation.id,
        }
    }

    /// Kind-scoped identity.
    #[must_use]
    pub const fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    /// Object version, if known.
    #[must_use]
    pub const fn version(&self) -> Option<u32> {
        match self {
            Self::Node(node) => node.version,
            Self::Way(way) => way.version,
            Self::Relation(relation) => relation.version,
        }
    }

    /// Borrow the tags.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        match self {
            Self::Node(node) => &node.tags,
            Self::Way(way) => &way.tags,
            Self::Relation(relation) => &relation.tags,
        }
    }

    /// Mutably borrow the tags.
    pub fn tags_mut(&mut self) -> &mut Tags {
        match self {
            Self::Node(node) => &mut node.tags,
            Self::Way(way) => &mut way.tags,
            Self::Relation(relation) => &mut relation.tags,
        }
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Way> for Entity {
    fn from(way: Way) -> Self {
        Self::Way(way)
    }
}

impl From<Relation> for Entity {
    fn from(relation: Relation) -> Self {
        Self::Relation(relation)
    }
}
