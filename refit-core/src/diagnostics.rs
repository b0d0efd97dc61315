//! Non-fatal findings collected while a pipeline runs.
//!
//! Stages push warnings as they discover them; the orchestrator reports the
//! accumulated list once the output has been published.

use std::{cell::RefCell, fmt, rc::Rc};

use log::debug;

use crate::EntityKey;

/// A non-fatal condition worth surfacing to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A changeset deletes an entity that never appeared in its input.
    UnresolvedDelete {
        /// Change file name.
        file: String,
        /// Missing delete target.
        key: EntityKey,
    },
    /// A changeset creates an entity whose id already exists upstream.
    ///
    /// Both copies are kept; the created one is appended as usual.
    CreateCollision {
        /// Change file name.
        file: String,
        /// Colliding identity.
        key: EntityKey,
    },
    /// An override rule targets an entity absent from the stream.
    UnmatchedRule {
        /// Target that was never observed.
        key: EntityKey,
    },
    /// A file in the change directory was not recognised and was skipped.
    SkippedFile {
        /// File name within the change directory.
        file: String,
    },
    /// The change directory does not exist; no change files were applied.
    MissingChangeDirectory {
        /// Directory that was looked up.
        path: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedDelete { file, key } => {
                write!(f, "{file}: delete of {key} skipped, entity not found")
            }
            Self::CreateCollision { file, key } => {
                write!(f, "{file}: create of {key} duplicates an existing id")
            }
            Self::UnmatchedRule { key } => {
                write!(f, "tag override targets {key}, which was not found")
            }
            Self::SkippedFile { file } => {
                write!(f, "skipped {file}: not a recognised change file")
            }
            Self::MissingChangeDirectory { path } => {
                write!(f, "change directory {path} does not exist")
            }
        }
    }
}

/// Shared, append-only warning collector.
///
/// Clones share the same backing list, so each stage can hold its own handle
/// while the orchestrator reads the combined result.
///
/// # Examples
/// ```
/// use refit_core::{Diagnostics, EntityKey, Warning};
///
/// let diagnostics = Diagnostics::new();
/// let stage_handle = diagnostics.clone();
/// stage_handle.warn(Warning::UnmatchedRule { key: EntityKey::way(1) });
/// assert_eq!(diagnostics.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Rc<RefCell<Vec<Warning>>>,
}

impl Diagnostics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&self, warning: Warning) {
        debug!("recorded warning: {warning}");
        self.warnings.borrow_mut().push(warning);
    }

    /// Number of warnings recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.borrow().len()
    }

    /// Whether no warnings were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.borrow().is_empty()
    }

    /// Copy of the warnings in recording order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }
}
