//! Page rasterization and lossy encoding

pub mod compress;
pub mod pdfium;

pub use compress::{encode_jpeg, render_page, RenderedPage};
pub use pdfium::PdfiumRasterizer;

use image::RgbImage;

use crate::geometry::Matrix;
use crate::source::SourceDocument;

/// Turns one source page into pixels.
///
/// `transform` maps the page's raw rectangle (its `/Rotate` not yet applied)
/// to pixel space; it is always a quarter-turn rotation followed by a
/// uniform scale. Implementations render onto an opaque white background
/// with annotations and form fields burned in. Page tasks call this from
/// several worker threads at once.
pub trait Rasterizer: Sync {
    fn rasterize(
        &self,
        source: &SourceDocument,
        page_index: usize,
        transform: &Matrix,
    ) -> Result<RgbImage, String>;
}
