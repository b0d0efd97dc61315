//! Change file generation from two versions of an extract.

use camino::Utf8Path;
use log::info;
use refit_core::{EntityDiff, KindCounts};
use refit_fs::StagedFile;

use crate::{
    PipelineError,
    codec::{read_all, write_changes},
};

/// Per-section operation counts of a written change file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Entities present only in the modified extract.
    pub created: KindCounts,
    /// Entities whose content differs.
    pub modified: KindCounts,
    /// Entities present only in the original extract.
    pub deleted: KindCounts,
}

impl DiffReport {
    /// Total number of operations written.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created.total() + self.modified.total() + self.deleted.total()
    }
}

fn log_section(label: &str, counts: KindCounts) {
    info!(
        "  {label}: {} nodes, {} ways, {} relations",
        counts.nodes, counts.ways, counts.relations
    );
}

/// Compare `original` with `modified` and write the difference to `output`
/// as an OSM change file.
///
/// Both extracts are held in memory while comparing.
///
/// # Errors
/// Returns [`PipelineError`] if either extract cannot be read or the change
/// file cannot be written.
pub fn diff_files(
    original: &Utf8Path,
    modified: &Utf8Path,
    output: &Utf8Path,
) -> Result<DiffReport, PipelineError> {
    info!("Reading original extract {original}");
    let before = read_all(original)?;
    info!("Reading modified extract {modified}");
    let after = read_all(modified)?;

    let diff = EntityDiff::compute(before, after);
    let report = DiffReport {
        created: diff.created_counts(),
        modified: diff.modified_counts(),
        deleted: diff.deleted_counts(),
    };
    info!("Changes found:");
    log_section("Created", report.created);
    log_section("Modified", report.modified);
    log_section("Deleted", report.deleted);
    if diff.is_empty() {
        info!("Extracts are identical; writing an empty change file");
    }

    let output_error = |source| PipelineError::Output {
        path: output.to_path_buf(),
        source,
    };
    let staged = StagedFile::new(output).map_err(output_error)?;
    write_changes(
        output,
        staged.writer().map_err(output_error)?,
        &diff.into_operations(),
    )?;
    staged.commit().map_err(output_error)?;
    info!("Wrote {} change operation(s) to {output}", report.total());
    Ok(report)
}
