//! Raster compressor: rasterize a page through its A4 transform and encode
//! the pixels as a progressive, Huffman-optimized, 4:2:0 subsampled JPEG.

use image::RgbImage;
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use super::Rasterizer;
use crate::error::PageFailure;
use crate::geometry::{Normalized, Rect};
use crate::model::PageDescriptor;
use crate::source::SourceDocument;

/// An encoded page image, ready to be placed on an A4 canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub encoded: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl RenderedPage {
    /// Point-space size of the image, undoing the raster super-sampling
    pub fn placed_size(&self, dpi_multiplier: f64) -> (f64, f64) {
        (
            self.pixel_width as f64 / dpi_multiplier,
            self.pixel_height as f64 / dpi_multiplier,
        )
    }

    /// Base image rectangle on the canvas, centered; top-left origin
    pub fn placement(&self, normalized: &Normalized) -> Rect {
        let (width, height) = self.placed_size(normalized.dpi_multiplier);
        normalized.centered(width, height)
    }
}

/// Rasterize the page described by `page` and encode it at `quality`.
pub fn render_page(
    rasterizer: &dyn Rasterizer,
    source: &SourceDocument,
    page: &PageDescriptor,
    normalized: &Normalized,
    quality: u8,
) -> Result<RenderedPage, PageFailure> {
    let pixels = rasterizer
        .rasterize(source, page.source_index, &normalized.transform)
        .map_err(|message| PageFailure::Rasterize {
            page: page.page_number(),
            message,
        })?;

    let (pixel_width, pixel_height) = pixels.dimensions();
    let encoded = encode_jpeg(&pixels, quality).map_err(|message| PageFailure::Encode {
        page: page.page_number(),
        message,
    })?;

    log::debug!(
        "Page {}: rendered {}x{} px, {} JPEG bytes at quality {}",
        page.page_number(),
        pixel_width,
        pixel_height,
        encoded.len(),
        quality
    );

    Ok(RenderedPage {
        encoded,
        pixel_width,
        pixel_height,
    })
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, String> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(format!("empty {}x{} raster", width, height));
    }
    let width = u16::try_from(width).map_err(|_| format!("raster width {} too large", width))?;
    let height =
        u16::try_from(height).map_err(|_| format!("raster height {} too large", height))?;

    let mut jpeg_bytes = Vec::new();
    let mut encoder = Encoder::new(&mut jpeg_bytes, quality.clamp(1, 100));
    encoder.set_sampling_factor(SamplingFactor::R_4_2_0);
    encoder.set_optimized_huffman_tables(true);
    encoder.set_progressive(true);
    encoder
        .encode(image.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| format!("Failed to encode JPEG: {}", e))?;

    Ok(jpeg_bytes)
}
