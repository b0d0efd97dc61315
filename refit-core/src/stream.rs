//! Stream plumbing shared by the codec and the pipeline stages.
//!
//! Entity collections are never materialised: readers yield entities lazily,
//! stages wrap the upstream iterator, and a sink consumes the final stream.

use std::{error::Error as StdError, io};

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::{Entity, EntityKey};

/// Errors raised while decoding or encoding an entity collection.
///
/// Every variant names the offending file so failures deep inside a chained
/// stream remain attributable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The file could not be opened or created.
    #[error("failed to open {path:?}")]
    Open {
        /// File being opened.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file extension does not map to a supported encoding.
    #[error("unsupported entity file format for {path:?}")]
    UnsupportedFormat {
        /// File whose extension was not recognised.
        path: Utf8PathBuf,
    },
    /// Reading from the file failed.
    #[error("failed to read {path:?}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A decoder library rejected the payload.
    #[error("failed to decode {path:?}")]
    Decode {
        /// File being decoded.
        path: Utf8PathBuf,
        /// Error reported by the decoder.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The payload was readable but structurally invalid.
    #[error("malformed entity data in {path:?} at {location}: {reason}")]
    Malformed {
        /// File being decoded.
        path: Utf8PathBuf,
        /// Human-readable position (line number or element).
        location: String,
        /// What was wrong.
        reason: String,
    },
    /// Writing to the output failed.
    #[error("failed to write {path:?}")]
    Write {
        /// File being written.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Errors surfacing from a stage-composed entity stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StageError {
    /// The base collection or a secondary file could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A changeset modifies entities that never appeared upstream.
    ///
    /// This indicates the change file was exported against a different base
    /// extract.
    #[error("change file {file} modifies {} entities absent from its input (first: {})", keys.len(), first_key(keys))]
    UnresolvedModify {
        /// Name of the change file.
        file: String,
        /// Every unresolved target, sorted.
        keys: Vec<EntityKey>,
    },
}

fn first_key(keys: &[EntityKey]) -> String {
    keys.first()
        .map_or_else(|| "none".to_owned(), ToString::to_string)
}

/// A single item of an entity stream.
pub type EntityResult = Result<Entity, StageError>;

/// A boxed, lazily-evaluated entity stream.
pub type EntityStream<'a> = Box<dyn Iterator<Item = EntityResult> + 'a>;

/// Lift a codec reader into a stage stream.
///
/// # Examples
/// ```
/// use refit_core::{CodecError, Entity, lift_codec_stream};
///
/// let source: Vec<Result<Entity, CodecError>> = Vec::new();
/// let mut stream = lift_codec_stream(source);
/// assert!(stream.next().is_none());
/// ```
pub fn lift_codec_stream<'a, I>(reader: I) -> EntityStream<'a>
where
    I: IntoIterator<Item = Result<Entity, CodecError>>,
    I::IntoIter: 'a,
{
    Box::new(
        reader
            .into_iter()
            .map(|item| item.map_err(StageError::from)),
    )
}

/// Destination accepting entities in stream order.
///
/// Implementations buffer as they see fit; nothing is guaranteed to be valid
/// on disk until [`EntitySink::finish`] returns successfully.
pub trait EntitySink {
    /// Append an entity to the output.
    fn write(&mut self, entity: &Entity) -> Result<(), CodecError>;

    /// Flush buffered data and finalise the encoding.
    fn finish(self: Box<Self>) -> Result<(), CodecError>;
}

/// Sink collecting entities in memory.
///
/// Useful for tests and for small collections such as merge files.
#[derive(Debug, Default)]
pub struct VecSink {
    /// Entities written so far.
    pub entities: Vec<Entity>,
}

impl EntitySink for VecSink {
    fn write(&mut self, entity: &Entity) -> Result<(), CodecError> {
        self.entities.push(entity.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), CodecError> {
        Ok(())
    }
}
