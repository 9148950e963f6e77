/// A raster overlay positioned relative to the placed base image of a page.
///
/// All four ratios are fractions of the base image rectangle (origin at its
/// top-left corner, y growing downward), so a stamp keeps its position no
/// matter how the page ends up oriented on the A4 canvas. Ratios are not
/// clamped: values outside `[0, 1]` simply draw outside the visible area.
#[derive(Clone, PartialEq)]
pub struct StampPlacement {
    /// Encoded raster image (PNG, JPEG, ...)
    pub image_bytes: Vec<u8>,
    pub x_ratio: f64,
    pub y_ratio: f64,
    pub width_ratio: f64,
    pub height_ratio: f64,
}

impl StampPlacement {
    pub fn new(
        image_bytes: Vec<u8>,
        x_ratio: f64,
        y_ratio: f64,
        width_ratio: f64,
        height_ratio: f64,
    ) -> Self {
        Self {
            image_bytes,
            x_ratio,
            y_ratio,
            width_ratio,
            height_ratio,
        }
    }
}

impl std::fmt::Debug for StampPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StampPlacement")
            .field("image_bytes", &format_args!("<{} bytes>", self.image_bytes.len()))
            .field("x_ratio", &self.x_ratio)
            .field("y_ratio", &self.y_ratio)
            .field("width_ratio", &self.width_ratio)
            .field("height_ratio", &self.height_ratio)
            .finish()
    }
}
