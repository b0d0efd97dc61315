//! OSM XML and OSM change XML.

mod read;
mod write;

pub use read::{OsmXmlReader, read_osc};
pub use write::{OsmXmlWriter, write_osc};
