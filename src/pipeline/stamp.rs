//! Stamp compositor: overlay raster stamps on a re-rendered page.

use super::canvas::{ImageXObject, PageCanvas};
use crate::error::PageFailure;
use crate::geometry::Rect;
use crate::model::StampPlacement;

/// Rectangle of `stamp` on the canvas, relative to the placed base image.
/// Both rectangles use a top-left origin.
pub fn stamp_rect(base: &Rect, stamp: &StampPlacement) -> Rect {
    let base_width = base.width();
    let base_height = base.height();
    Rect::from_origin(
        base.x0 + base_width * stamp.x_ratio,
        base.y0 + base_height * stamp.y_ratio,
        base_width * stamp.width_ratio,
        base_height * stamp.height_ratio,
    )
}

/// Draw `stamps` over the base image in list order. A stamp that cannot be
/// decoded or placed is logged and skipped; the failures are returned.
pub fn composite(
    canvas: &mut PageCanvas,
    base: &Rect,
    stamps: &[StampPlacement],
    page_number: usize,
) -> Vec<PageFailure> {
    let mut failures = Vec::new();

    for (i, stamp) in stamps.iter().enumerate() {
        match place(canvas, base, stamp) {
            Ok(rect) => log::debug!(
                "Page {}: stamp {} at ({:.1}, {:.1}) {:.1}x{:.1}",
                page_number,
                i + 1,
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height()
            ),
            Err(message) => {
                let failure = PageFailure::Stamp {
                    page: page_number,
                    stamp: i + 1,
                    message,
                };
                log::warn!("{}, skipping it", failure);
                failures.push(failure);
            }
        }
    }

    failures
}

fn place(canvas: &mut PageCanvas, base: &Rect, stamp: &StampPlacement) -> Result<Rect, String> {
    let rect = stamp_rect(base, stamp);
    let finite = [rect.x0, rect.y0, rect.x1, rect.y1]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return Err("stamp ratios are not finite".to_string());
    }
    if rect.is_empty() {
        return Err(format!(
            "stamp has no area ({:.2}x{:.2} pt)",
            rect.width(),
            rect.height()
        ));
    }

    let xobject = ImageXObject::decode(&stamp.image_bytes)?;
    canvas.draw_image(xobject, &rect);
    Ok(rect)
}
