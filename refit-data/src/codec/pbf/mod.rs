//! OSM PBF: decoding through `osmpbf`, encoding by hand.
//!
//! The writer emits uncompressed blobs, which every PBF reader must accept.
//! Each primitive group holds a single entity kind and plain (non-dense)
//! nodes.

mod proto;
mod read;
mod write;

pub use read::PbfReader;
pub use write::PbfWriter;

/// Fixed-point scale of coordinates at the default granularity of 100 nanodegrees.
const COORDINATE_SCALE: f64 = 1e7;
