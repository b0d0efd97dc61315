//! Change directory discovery, classification and loading.
//!
//! Files are listed once, classified by extension into descriptors, and
//! sorted by name as raw bytes so application order does not depend on the
//! platform's directory iteration order.

use std::{collections::BTreeMap, fmt, io};

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use refit_core::{ChangeSource, Changeset, CodecError, Diagnostics, MergeFile, Warning};
use refit_fs::PathKind;
use thiserror::Error;

use crate::codec::{DataFormat, FileFormat, read_all, read_changes};

/// How a change file is applied to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeSemantics {
    /// Create, modify and delete operations patch the stream.
    Replace,
    /// Entities are appended after the stream.
    Merge,
}

impl fmt::Display for ChangeSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "changeset",
            Self::Merge => "merge",
        })
    }
}

/// Errors raised while locating or loading change files.
#[derive(Debug, Error)]
pub enum ChangeFileError {
    /// The change path exists but is not a directory.
    #[error("change path {path:?} is not a directory")]
    NotADirectory {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The directory could not be inspected or listed.
    #[error("failed to list change directory {path:?}")]
    List {
        /// Directory being listed.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A change file could not be parsed.
    #[error("failed to load change file {name}")]
    Load {
        /// File name within the directory.
        name: String,
        /// Decoding failure.
        #[source]
        source: CodecError,
    },
}

/// A classified file in the change directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFileDescriptor {
    name: String,
    path: Utf8PathBuf,
    format: FileFormat,
}

impl ChangeFileDescriptor {
    /// Classify `name` inside `dir`, returning `None` for files that are not
    /// change files.
    ///
    /// # Examples
    /// ```
    /// use camino::Utf8Path;
    /// use refit_data::{ChangeFileDescriptor, ChangeSemantics};
    ///
    /// let dir = Utf8Path::new("changes");
    /// let osc = ChangeFileDescriptor::classify(dir, "010-roads.osc").expect("osc is a change file");
    /// assert_eq!(osc.semantics(), ChangeSemantics::Replace);
    /// let opl = ChangeFileDescriptor::classify(dir, "020-extra.opl.bz2").expect("opl is a change file");
    /// assert_eq!(opl.semantics(), ChangeSemantics::Merge);
    /// assert!(ChangeFileDescriptor::classify(dir, "base.osm.pbf").is_none());
    /// ```
    #[must_use]
    pub fn classify(dir: &Utf8Path, name: &str) -> Option<Self> {
        let path = dir.join(name);
        let format = FileFormat::detect(&path)?;
        if format.data == DataFormat::Pbf {
            return None;
        }
        Some(Self {
            name: name.to_owned(),
            path,
            format,
        })
    }

    /// File name within the change directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Detected encoding.
    #[must_use]
    pub const fn format(&self) -> FileFormat {
        self.format
    }

    /// Application semantics implied by the encoding.
    #[must_use]
    pub fn semantics(&self) -> ChangeSemantics {
        if self.format.data == DataFormat::OsmChange {
            ChangeSemantics::Replace
        } else {
            ChangeSemantics::Merge
        }
    }

    /// Parse the file into a [`ChangeSource`].
    ///
    /// # Errors
    /// Returns [`ChangeFileError::Load`] if the file cannot be decoded.
    pub fn load(&self) -> Result<ChangeSource, ChangeFileError> {
        let wrap = |source| ChangeFileError::Load {
            name: self.name.clone(),
            source,
        };
        Ok(match self.semantics() {
            ChangeSemantics::Replace => {
                let operations = read_changes(&self.path).map_err(wrap)?;
                ChangeSource::Changeset(Changeset::new(self.name.clone(), operations))
            }
            ChangeSemantics::Merge => {
                let entities = read_all(&self.path).map_err(wrap)?;
                ChangeSource::Merge(MergeFile::new(self.name.clone(), entities))
            }
        })
    }
}

/// Sort descriptors by the raw bytes of their file names.
///
/// Upper-case names sort before lower-case ones.
pub fn sort_change_files(files: &mut [ChangeFileDescriptor]) {
    files.sort_by(|left, right| left.name.as_bytes().cmp(right.name.as_bytes()));
}

/// List and classify the change files in `dir`, in application order.
///
/// A missing directory yields no files and a
/// [`Warning::MissingChangeDirectory`]. Unrecognised files are reported as
/// [`Warning::SkippedFile`]; subdirectories are ignored.
///
/// # Errors
/// Returns [`ChangeFileError`] if `dir` is not a directory or cannot be
/// listed.
pub fn discover_change_files(
    dir: &Utf8Path,
    diagnostics: &Diagnostics,
) -> Result<Vec<ChangeFileDescriptor>, ChangeFileError> {
    let list_error = |source| ChangeFileError::List {
        path: dir.to_path_buf(),
        source,
    };
    match refit_fs::path_kind(dir).map_err(list_error)? {
        PathKind::Directory => {}
        PathKind::Missing => {
            warn!("Change files directory does not exist: {dir}");
            diagnostics.warn(Warning::MissingChangeDirectory {
                path: dir.to_string(),
            });
            return Ok(Vec::new());
        }
        PathKind::File | PathKind::Other => {
            return Err(ChangeFileError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
    }

    let mut files = Vec::new();
    for name in refit_fs::list_regular_files(dir).map_err(list_error)? {
        match ChangeFileDescriptor::classify(dir, &name) {
            Some(descriptor) => files.push(descriptor),
            None => diagnostics.warn(Warning::SkippedFile { file: name }),
        }
    }
    sort_change_files(&mut files);
    Ok(files)
}

fn log_file_counts(files: &[ChangeFileDescriptor]) {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for file in files {
        *counts.entry(file.format.data.label()).or_default() += 1;
    }
    info!("Found {} change file(s) to apply:", files.len());
    for (label, count) in counts {
        info!("  - {count} {label} file(s)");
    }
}

/// Discover and load every change file in `dir`, in application order.
///
/// All files are parsed before any stream processing begins, so a malformed
/// file aborts the run without touching the output.
///
/// # Errors
/// Propagates discovery failures and the first file that fails to load.
pub fn load_change_sources(
    dir: &Utf8Path,
    diagnostics: &Diagnostics,
) -> Result<Vec<ChangeSource>, ChangeFileError> {
    let files = discover_change_files(dir, diagnostics)?;
    if files.is_empty() {
        info!("No change files found in {dir}; input passes through unchanged");
        return Ok(Vec::new());
    }
    log_file_counts(&files);
    files.iter().map(ChangeFileDescriptor::load).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::open_for_write;
    use refit_core::test_support::{node, tags};
    use refit_core::{ChangeOperation, EntityKey};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct ChangeDir {
        dir: TempDir,
    }

    impl ChangeDir {
        fn path(&self) -> &Utf8Path {
            Utf8Path::from_path(self.dir.path()).expect("utf-8 temp path")
        }

        fn touch(&self, name: &str, contents: &str) {
            std::fs::write(self.path().join(name), contents).expect("write fixture");
        }
    }

    #[fixture]
    fn change_dir() -> ChangeDir {
        ChangeDir {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    fn names(files: &[ChangeFileDescriptor]) -> Vec<&str> {
        files.iter().map(ChangeFileDescriptor::name).collect()
    }

    #[rstest]
    fn sorts_names_bytewise(change_dir: ChangeDir) {
        for name in ["b.osc", "a.opl", "B.osm", "10-x.osc", "2-y.osc"] {
            change_dir.touch(name, "");
        }
        let files = discover_change_files(change_dir.path(), &Diagnostics::new())
            .expect("discovery succeeds");
        assert_eq!(names(&files), vec!["10-x.osc", "2-y.osc", "B.osm", "a.opl", "b.osc"]);
    }

    #[rstest]
    fn unrecognised_files_are_skipped_with_warnings(change_dir: ChangeDir) {
        change_dir.touch("notes.txt", "");
        change_dir.touch("base.osm.pbf", "");
        change_dir.touch("010.osc", "");
        std::fs::create_dir(change_dir.path().join("nested.osc")).expect("create subdirectory");
        let diagnostics = Diagnostics::new();

        let files =
            discover_change_files(change_dir.path(), &diagnostics).expect("discovery succeeds");

        assert_eq!(names(&files), vec!["010.osc"]);
        let mut skipped: Vec<Warning> = diagnostics.snapshot();
        skipped.sort_by_key(ToString::to_string);
        assert_eq!(
            skipped,
            vec![
                Warning::SkippedFile {
                    file: "base.osm.pbf".into()
                },
                Warning::SkippedFile {
                    file: "notes.txt".into()
                },
            ]
        );
    }

    #[rstest]
    fn missing_directory_is_an_empty_change_set(change_dir: ChangeDir) {
        let missing = change_dir.path().join("absent");
        let diagnostics = Diagnostics::new();
        let sources = load_change_sources(&missing, &diagnostics).expect("missing dir is not fatal");
        assert!(sources.is_empty());
        assert_eq!(
            diagnostics.snapshot(),
            vec![Warning::MissingChangeDirectory {
                path: missing.to_string()
            }]
        );
    }

    #[rstest]
    fn file_in_place_of_directory_is_rejected(change_dir: ChangeDir) {
        change_dir.touch("changes", "");
        let result = discover_change_files(&change_dir.path().join("changes"), &Diagnostics::new());
        assert!(matches!(result, Err(ChangeFileError::NotADirectory { .. })));
    }

    #[rstest]
    fn loads_sources_with_their_semantics(change_dir: ChangeDir) {
        change_dir.touch(
            "010-fix.osc",
            r#"<osmChange version="0.6"><delete><node id="3"/></delete></osmChange>"#,
        );
        let mut sink = open_for_write(&change_dir.path().join("020-extra.osm"))
            .expect("open merge file");
        sink.write(&node(40, 1.0, 2.0, tags([("amenity", "bench")])))
            .expect("write merge entity");
        sink.finish().expect("finish merge file");

        let sources =
            load_change_sources(change_dir.path(), &Diagnostics::new()).expect("sources load");

        match sources.as_slice() {
            [ChangeSource::Changeset(changeset), ChangeSource::Merge(merge)] => {
                assert_eq!(changeset.name(), "010-fix.osc");
                assert_eq!(
                    changeset.operations(),
                    &[ChangeOperation::Delete(EntityKey::node(3))]
                );
                assert_eq!(merge.name(), "020-extra.osm");
                assert_eq!(merge.entities().len(), 1);
            }
            other => panic!("unexpected sources: {other:?}"),
        }
    }

    #[rstest]
    fn malformed_change_files_name_the_file(change_dir: ChangeDir) {
        change_dir.touch("bad.osc", "<osmChange><modify><way/></modify></osmChange>");
        let err = load_change_sources(change_dir.path(), &Diagnostics::new())
            .expect_err("malformed file must fail");
        assert!(matches!(err, ChangeFileError::Load { ref name, .. } if name == "bad.osc"));
    }
}
