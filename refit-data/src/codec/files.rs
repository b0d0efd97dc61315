//! Byte-level input and output with transparent bzip2 handling.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
};

use bzip2::{read::MultiBzDecoder, write::BzEncoder};
use camino::Utf8Path;
use refit_core::CodecError;

use super::Compression;

/// Buffered, possibly decompressed, input bytes.
pub struct InputStream {
    inner: Box<dyn BufRead + Send>,
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream").finish_non_exhaustive()
    }
}

impl InputStream {
    /// Open `path`, decompressing on the fly when asked to.
    ///
    /// # Errors
    /// Returns [`CodecError::Open`] if the file cannot be opened.
    pub fn open(path: &Utf8Path, compression: Compression) -> Result<Self, CodecError> {
        let file = refit_fs::open_utf8_file(path)
            .map_err(|source| CodecError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .into_std();
        Ok(Self::from_file(file, compression))
    }

    /// Wrap an already opened file.
    #[must_use]
    pub fn from_file(file: File, compression: Compression) -> Self {
        let buffered = BufReader::new(file);
        let inner: Box<dyn BufRead + Send> = match compression {
            Compression::None => Box::new(buffered),
            Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(buffered))),
        };
        Self { inner }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for InputStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amount: usize) {
        self.inner.consume(amount);
    }
}

/// Buffered, possibly compressed, output bytes.
pub enum OutputStream {
    /// Uncompressed output.
    Plain(BufWriter<File>),
    /// bzip2-compressed output.
    Bzip2(BzEncoder<BufWriter<File>>),
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Plain(_) => "Plain",
            Self::Bzip2(_) => "Bzip2",
        };
        f.debug_tuple("OutputStream").field(&variant).finish()
    }
}

impl OutputStream {
    /// Wrap a file opened for writing.
    #[must_use]
    pub fn new(file: File, compression: Compression) -> Self {
        let buffered = BufWriter::new(file);
        match compression {
            Compression::None => Self::Plain(buffered),
            Compression::Bzip2 => Self::Bzip2(BzEncoder::new(buffered, bzip2::Compression::default())),
        }
    }

    /// Flush everything, writing the compression trailer if any.
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    pub fn finish(self) -> io::Result<()> {
        let mut buffered = match self {
            Self::Plain(buffered) => buffered,
            Self::Bzip2(encoder) => encoder.finish()?,
        };
        buffered.flush()?;
        buffered.get_ref().sync_all()
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Bzip2(inner) => inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Bzip2(inner) => inner.flush(),
        }
    }
}
