pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::Path;

pub use config::Settings;
pub use error::{ConfigError, EngineError, PageFailure, StageFailure};
pub use export::export_pages;
pub use model::{CompressionProfile, PageOrder, Rotation, StampPlacement};
pub use pipeline::{
    BudgetController, CancelToken, CompressionReport, CompressionRequest, Outcome, StageReport,
};
pub use raster::{PdfiumRasterizer, Rasterizer};

/// High-level API for shrinking a PDF to a byte budget.
///
/// This is the recommended entry point for library consumers. It binds
/// PDFium (from `settings.pdfium_library`, or the system library), runs the
/// stages and writes the result to `output`.
///
/// # Arguments
///
/// * `input` - Bytes of the source PDF
/// * `output` - Where to write the result; replaced atomically
/// * `request` - Rotations, stamps, page order and the target size
/// * `settings` - Stage profiles and resource limits
///
/// # Returns
///
/// A report of what was written, or an EngineError when no valid output
/// could be produced.
///
/// # Example
///
/// ```no_run
/// use pdf_budget::{compress_to_target, CompressionRequest, Rotation, Settings};
///
/// let input = std::fs::read("scan.pdf").unwrap();
/// let request = CompressionRequest::new(3 * 1024 * 1024).with_rotation(0, Rotation::Cw90);
///
/// let report = compress_to_target(
///     &input,
///     std::path::Path::new("scan_small.pdf"),
///     &request,
///     &Settings::default(),
/// ).unwrap();
///
/// println!("{} ({} bytes)", report.outcome, report.final_size_bytes);
/// ```
pub fn compress_to_target(
    input: &[u8],
    output: &Path,
    request: &CompressionRequest,
    settings: &Settings,
) -> Result<CompressionReport, EngineError> {
    let rasterizer = PdfiumRasterizer::new(settings.pdfium_library.as_deref())?;
    BudgetController::new(settings, &rasterizer).run(input, request, output)
}
