//! A4 fit for a single page.
//!
//! The visual box of a page is what a viewer shows: the raw page rectangle
//! turned by the page's own `/Rotate` and then by any caller-requested
//! rotation. The A4 canvas takes the orientation of that box, and the page
//! is scaled uniformly to fit inside it, centered, never cropped.

use super::matrix::{Matrix, Rect};
use crate::config::defaults::{A4_HEIGHT_PT, A4_WIDTH_PT, POINTS_PER_INCH};
use crate::model::Rotation;
use crate::source::PageInfo;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// A4 canvas size (width, height) in points for this orientation
    pub fn a4_size(self) -> (f64, f64) {
        match self {
            Orientation::Portrait => (A4_WIDTH_PT, A4_HEIGHT_PT),
            Orientation::Landscape => (A4_HEIGHT_PT, A4_WIDTH_PT),
        }
    }
}

/// Result of fitting one page onto an A4 canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub orientation: Orientation,
    pub target_width: f64,
    pub target_height: f64,
    /// Visual box of the page at 1:1 scale, in points
    pub visual_width: f64,
    pub visual_height: f64,
    /// Uniform scale that fits the visual box inside the canvas
    pub fit_scale: f64,
    /// Raster super-sampling factor (`dpi / 72`)
    pub dpi_multiplier: f64,
    /// Raw page space to raster pixel space
    pub transform: Matrix,
}

impl Normalized {
    fn identity() -> Self {
        let (target_width, target_height) = Orientation::Portrait.a4_size();
        Self {
            orientation: Orientation::Portrait,
            target_width,
            target_height,
            visual_width: 0.0,
            visual_height: 0.0,
            fit_scale: 1.0,
            dpi_multiplier: 1.0,
            transform: Matrix::IDENTITY,
        }
    }

    /// Canvas rectangle of a `width` x `height` point image centered on the
    /// A4 canvas; top-left origin
    pub fn centered(&self, width: f64, height: f64) -> Rect {
        Rect::from_origin(
            (self.target_width - width) / 2.0,
            (self.target_height - height) / 2.0,
            width,
            height,
        )
    }
}

/// Fit `page` onto A4 after applying `forced` on top of its own rotation,
/// rasterizing at `dpi`.
pub fn normalize(page: &PageInfo, forced: Rotation, dpi: u32) -> Normalized {
    let raw_width = page.raw_rect.width();
    let raw_height = page.raw_rect.height();
    if raw_width <= 0.0 || raw_height <= 0.0 || !raw_width.is_finite() || !raw_height.is_finite() {
        log::debug!(
            "Page {} has a degenerate {}x{} box, using identity transform",
            page.index + 1,
            raw_width,
            raw_height
        );
        return Normalized::identity();
    }

    // Source and forced rotation compound; the measured box is authoritative.
    let rotation = Matrix::rotate(page.rotation).concat(Matrix::rotate(forced));
    let visual = rotation.transform_rect(&Rect::from_size(raw_width, raw_height));
    let (visual_width, visual_height) = (visual.width(), visual.height());

    let orientation = if visual_width > visual_height {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    let (target_width, target_height) = orientation.a4_size();

    let fit_scale = (target_width / visual_width).min(target_height / visual_height);
    let dpi_multiplier = dpi as f64 / POINTS_PER_INCH;
    let final_scale = fit_scale * dpi_multiplier;
    let transform = rotation.concat(Matrix::scale(final_scale, final_scale));

    log::debug!(
        "Page {}: raw {:.1}x{:.1}, visual {:.1}x{:.1} ({} + {}), {:?} A4, fit {:.4}",
        page.index + 1,
        raw_width,
        raw_height,
        visual_width,
        visual_height,
        page.rotation,
        forced,
        orientation,
        fit_scale
    );

    Normalized {
        orientation,
        target_width,
        target_height,
        visual_width,
        visual_height,
        fit_scale,
        dpi_multiplier,
        transform,
    }
}
