//! Export selected pages as standalone single-page PDFs.
//!
//! Pages are copied through untouched: no normalization, no re-encoding.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, StageFailure};
use crate::output::write_atomic;
use crate::pipeline::DestinationBuilder;
use crate::source::SourceDocument;

/// Write each of `indices` (0-based source pages) to
/// `dest_dir/{stem}_page_{n}.pdf`, where `n` is the 1-based page number.
/// Returns the written paths in the order given.
pub fn export_pages(
    source_bytes: &[u8],
    indices: &[usize],
    dest_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, EngineError> {
    let source = SourceDocument::open(source_bytes)?;
    if indices.is_empty() {
        return Err(EngineError::InvalidRequest(
            "no pages to export".to_string(),
        ));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i >= source.page_count()) {
        return Err(EngineError::InvalidRequest(format!(
            "cannot export page index {}, the document has {} pages",
            bad,
            source.page_count()
        )));
    }

    let mut written = Vec::with_capacity(indices.len());
    for &index in indices {
        let bytes = single_page(&source, index)
            .map_err(|e| EngineError::Source(format!("page {}: {}", index + 1, e)))?;

        let path = dest_dir.join(format!("{}_page_{}.pdf", stem, index + 1));
        write_atomic(&path, &bytes)?;
        log::info!("Exported page {} to {}", index + 1, path.display());
        written.push(path);
    }

    Ok(written)
}

fn single_page(source: &SourceDocument, index: usize) -> Result<Vec<u8>, StageFailure> {
    let mut builder = DestinationBuilder::new(source);
    builder.copy_page(index)?;
    builder.finish()
}
