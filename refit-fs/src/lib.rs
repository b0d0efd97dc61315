//! Capability-based filesystem helpers shared by the refit crates.
//!
//! Paths are UTF-8 throughout. Directories are opened with ambient authority
//! once and then addressed relative to the resulting handle.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;
use tempfile::NamedTempFile;

/// What a path currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Nothing exists at the path.
    Missing,
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Anything else, such as a socket or device.
    Other,
}

/// Open a UTF-8 file path for reading.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

/// Classify `path` without following it past its parent directory handle.
pub fn path_kind(path: &Utf8Path) -> io::Result<PathKind> {
    let Some(name) = path.file_name() else {
        // `/` or `..`: only directories have no final component.
        return Ok(PathKind::Directory);
    };
    let parent = match fs_utf8::Dir::open_ambient_dir(parent_or_current(path), ambient_authority())
    {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(PathKind::Missing),
        Err(err) => return Err(err),
    };
    match parent.metadata(name) {
        Ok(meta) if meta.is_file() => Ok(PathKind::File),
        Ok(meta) if meta.is_dir() => Ok(PathKind::Directory),
        Ok(_) => Ok(PathKind::Other),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PathKind::Missing),
        Err(err) => Err(err),
    }
}

/// Names of the regular files directly inside `dir`, in no particular order.
///
/// Subdirectories and other entry types are skipped.
pub fn list_regular_files(dir: &Utf8Path) -> io::Result<Vec<String>> {
    let handle = fs_utf8::Dir::open_ambient_dir(dir, ambient_authority())?;
    let mut names = Vec::new();
    for entry in handle.entries()? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name()?);
        }
    }
    Ok(names)
}

/// Create the parent directory of `path` and any missing ancestors.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(parent)?;
    if !relative.as_str().is_empty() {
        base_dir.create_dir_all(&relative)?;
    }
    Ok(())
}

/// Split a path into an ambient root handle and the remainder below it.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let base = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if base == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&base)
            .map_err(|_| io::Error::other(format!("failed to strip {base} from {path}")))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

/// An output file written under a temporary name and published on commit.
///
/// Dropping a staged file without committing removes it, leaving any
/// existing file at the destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    destination: Utf8PathBuf,
}

impl StagedFile {
    /// Stage a new file in the destination's directory, creating it if needed.
    pub fn new(destination: &Utf8Path) -> io::Result<Self> {
        ensure_parent_dir(destination)?;
        let temp = tempfile::Builder::new()
            .prefix(".refit-")
            .suffix(".partial")
            .tempfile_in(parent_or_current(destination))?;
        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    /// Final path the file is published to.
    #[must_use]
    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    /// A fresh write handle to the staged file.
    pub fn writer(&self) -> io::Result<std::fs::File> {
        self.temp.reopen()
    }

    /// Atomically move the staged file over the destination.
    pub fn commit(self) -> io::Result<()> {
        self.temp
            .persist(self.destination.as_std_path())
            .map(drop)
            .map_err(|err| err.error)
    }
}
