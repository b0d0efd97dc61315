//! Per-kind counts and node bounds of an entity stream.

use std::fmt;

use geo::{Coord, Rect};

use crate::Entity;

/// Summary of the entities that passed through a stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamSummary {
    /// Number of nodes.
    pub nodes: u64,
    /// Number of ways.
    pub ways: u64,
    /// Number of relations.
    pub relations: u64,
    /// Bounding box covering all finite node coordinates, if any.
    pub bounds: Option<Rect<f64>>,
}

impl StreamSummary {
    /// Account for one entity.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use refit_core::{Entity, Node, StreamSummary, Tags};
    ///
    /// let mut summary = StreamSummary::default();
    /// for (id, x) in [(1, 10.0), (2, 12.5)] {
    ///     summary.record(&Entity::Node(Node {
    ///         id,
    ///         version: None,
    ///         tags: Tags::new(),
    ///         location: Coord { x, y: 50.0 },
    ///     }));
    /// }
    /// let bounds = summary.bounds.expect("nodes produce bounds");
    /// assert_eq!(summary.nodes, 2);
    /// assert_eq!(bounds.max().x, 12.5);
    /// ```
    pub fn record(&mut self, entity: &Entity) {
        match entity {
            Entity::Node(node) => {
                self.nodes += 1;
                self.extend_bounds(node.location);
            }
            Entity::Way(_) => self.ways += 1,
            Entity::Relation(_) => self.relations += 1,
        }
    }

    /// Total number of entities recorded.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }

    fn extend_bounds(&mut self, coord: Coord<f64>) {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return;
        }
        self.bounds = Some(match self.bounds {
            None => Rect::new(coord, coord),
            Some(bounds) => {
                let min = bounds.min();
                let max = bounds.max();
                Rect::new(
                    Coord {
                        x: min.x.min(coord.x),
                        y: min.y.min(coord.y),
                    },
                    Coord {
                        x: max.x.max(coord.x),
                        y: max.y.max(coord.y),
                    },
                )
            }
        });
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} ways, {} relations",
            self.nodes, self.ways, self.relations
        )?;
        if let Some(bounds) = self.bounds {
            let min = bounds.min();
            let max = bounds.max();
            write!(
                f,
                "; bounds ({:.7}, {:.7}) to ({:.7}, {:.7})",
                min.x, min.y, max.x, max.y
            )?;
        }
        Ok(())
    }
}
