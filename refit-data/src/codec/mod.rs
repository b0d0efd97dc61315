//! Entity file encodings and format detection.
//!
//! Readers are lazy iterators over `Result<Entity, CodecError>`; writers are
//! [`EntitySink`] implementations that only produce a valid file once
//! [`EntitySink::finish`] succeeds. The encoding is chosen from the file name.

mod files;
mod opl;
mod pbf;
mod xml;

use camino::Utf8Path;
use refit_core::{ChangeOperation, CodecError, Entity, EntitySink};

pub use files::{InputStream, OutputStream};
pub use opl::{OplReader, OplWriter, opl_escape};
pub use pbf::{PbfReader, PbfWriter};
pub use xml::{OsmXmlReader, OsmXmlWriter, read_osc, write_osc};

/// A lazily decoded entity file.
pub type EntityReader = Box<dyn Iterator<Item = Result<Entity, CodecError>>>;

/// Payload encoding of an entity or change file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// OSM protocol buffer binary format.
    Pbf,
    /// OSM XML.
    Xml,
    /// Object-per-line text format.
    Opl,
    /// OSM change XML.
    OsmChange,
}

impl DataFormat {
    /// Conventional upper-case label used in log output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pbf => "PBF",
            Self::Xml => "OSM",
            Self::Opl => "OPL",
            Self::OsmChange => "OSC",
        }
    }
}

/// Outer compression wrapped around the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Stored as-is.
    None,
    /// bzip2 stream, signalled by a trailing `.bz2`.
    Bzip2,
}

/// Encoding detected from a file name.
///
/// # Examples
/// ```
/// use camino::Utf8Path;
/// use refit_data::codec::{Compression, DataFormat, FileFormat};
///
/// let format = FileFormat::detect(Utf8Path::new("changes/010-roads.osc.bz2"));
/// assert_eq!(
///     format,
///     Some(FileFormat { data: DataFormat::OsmChange, compression: Compression::Bzip2 })
/// );
/// assert_eq!(FileFormat::detect(Utf8Path::new("notes.txt")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFormat {
    /// Payload encoding.
    pub data: DataFormat,
    /// Outer compression.
    pub compression: Compression,
}

impl FileFormat {
    /// Detect the format from the extension, ignoring case.
    #[must_use]
    pub fn detect(path: &Utf8Path) -> Option<Self> {
        let name = path.file_name()?.to_ascii_lowercase();
        let (stem, compression) = match name.strip_suffix(".bz2") {
            Some(stem) => (stem, Compression::Bzip2),
            None => (name.as_str(), Compression::None),
        };
        let data = if stem.ends_with(".pbf") {
            DataFormat::Pbf
        } else if stem.ends_with(".osm") {
            DataFormat::Xml
        } else if stem.ends_with(".opl") {
            DataFormat::Opl
        } else if stem.ends_with(".osc") {
            DataFormat::OsmChange
        } else {
            return None;
        };
        Some(Self { data, compression })
    }

    fn require(path: &Utf8Path) -> Result<Self, CodecError> {
        Self::detect(path).ok_or_else(|| CodecError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

/// Open an entity file for lazy reading.
///
/// # Errors
/// Returns [`CodecError::UnsupportedFormat`] for unknown extensions and change
/// files, or [`CodecError::Open`] when the file cannot be opened.
pub fn open_for_read(path: &Utf8Path) -> Result<EntityReader, CodecError> {
    let format = FileFormat::require(path)?;
    let input = InputStream::open(path, format.compression)?;
    Ok(match format.data {
        DataFormat::Pbf => Box::new(PbfReader::new(path, input)),
        DataFormat::Xml => Box::new(OsmXmlReader::new(path, input)),
        DataFormat::Opl => Box::new(OplReader::new(path, input)),
        DataFormat::OsmChange => {
            return Err(CodecError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    })
}

/// Read a whole entity file into memory.
///
/// Intended for secondary inputs such as merge files, which are small.
///
/// # Errors
/// Propagates any [`CodecError`] from opening or decoding.
pub fn read_all(path: &Utf8Path) -> Result<Vec<Entity>, CodecError> {
    open_for_read(path)?.collect()
}

/// Create a sink writing the encoding implied by `path` into `file`.
///
/// `path` only selects the encoding and labels errors; the bytes go to
/// `file`, which lets callers stage output under a temporary name.
///
/// # Errors
/// Returns [`CodecError::UnsupportedFormat`] for unknown extensions, change
/// files and compressed PBF, or [`CodecError::Write`] if the header cannot be
/// written.
pub fn writer_for(
    path: &Utf8Path,
    file: std::fs::File,
) -> Result<Box<dyn EntitySink>, CodecError> {
    let format = FileFormat::require(path)?;
    let unsupported = || CodecError::UnsupportedFormat {
        path: path.to_path_buf(),
    };
    match (format.data, format.compression) {
        (DataFormat::Pbf, Compression::None) => {
            Ok(Box::new(PbfWriter::new(path, OutputStream::new(file, format.compression))?))
        }
        (DataFormat::Xml, _) => Ok(Box::new(OsmXmlWriter::new(
            path,
            OutputStream::new(file, format.compression),
        )?)),
        (DataFormat::Opl, _) => Ok(Box::new(OplWriter::new(
            path,
            OutputStream::new(file, format.compression),
        ))),
        (DataFormat::Pbf, Compression::Bzip2) | (DataFormat::OsmChange, _) => Err(unsupported()),
    }
}

/// Create `path` and return a sink for its encoding.
///
/// # Errors
/// As for [`writer_for`], plus [`CodecError::Open`] if the file cannot be
/// created.
pub fn open_for_write(path: &Utf8Path) -> Result<Box<dyn EntitySink>, CodecError> {
    FileFormat::require(path)?;
    let file = std::fs::File::create(path).map_err(|source| CodecError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    writer_for(path, file)
}

/// Read every operation of an OSM change file.
///
/// # Errors
/// Returns [`CodecError::UnsupportedFormat`] unless `path` names an `.osc`
/// file, otherwise any open or decode failure.
pub fn read_changes(path: &Utf8Path) -> Result<Vec<ChangeOperation>, CodecError> {
    let format = FileFormat::require(path)?;
    if format.data != DataFormat::OsmChange {
        return Err(CodecError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }
    read_osc(path, InputStream::open(path, format.compression)?)
}

/// Write `operations` as an OSM change file into `file`.
///
/// # Errors
/// Returns [`CodecError::UnsupportedFormat`] unless `path` names an `.osc`
/// file, or [`CodecError::Write`] on I/O failure.
pub fn write_changes(
    path: &Utf8Path,
    file: std::fs::File,
    operations: &[ChangeOperation],
) -> Result<(), CodecError> {
    let format = FileFormat::require(path)?;
    if format.data != DataFormat::OsmChange {
        return Err(CodecError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }
    write_osc(path, OutputStream::new(file, format.compression), operations)
}
