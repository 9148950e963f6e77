//! A re-rendered output page, built without touching the destination document.
//!
//! Page workers fill a `PageCanvas` in parallel; the controller later moves
//! its image XObjects and drawing operations into the destination document.

use lopdf::content::Operation;
use lopdf::{Dictionary, Object, Stream};

use crate::geometry::Rect;

/// An image XObject with an optional soft mask, not yet given object ids.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub image: Stream,
    pub soft_mask: Option<Stream>,
}

impl ImageXObject {
    /// Wrap already-encoded JPEG data
    pub fn jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        let dict = image_dict(width, height, "DeviceRGB", Some("DCTDecode"));
        Self {
            image: Stream::new(dict, bytes).with_compression(false),
            soft_mask: None,
        }
    }

    /// Decode a raster image (PNG, JPEG, ...) and store it losslessly.
    /// Transparency is kept as a soft mask when any pixel is not opaque.
    pub fn decode(encoded: &[u8]) -> Result<Self, String> {
        let decoded =
            image::load_from_memory(encoded).map_err(|e| format!("Failed to decode image: {}", e))?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(format!("empty {}x{} image", width, height));
        }

        let carries_alpha = decoded.color().has_alpha();
        let rgba = decoded.to_rgba8();
        let translucent = carries_alpha && rgba.pixels().any(|p| p.0[3] < 255);

        let pixel_count = (width as usize) * (height as usize);
        let mut rgb = Vec::with_capacity(pixel_count * 3);
        let mut alpha = Vec::with_capacity(if translucent { pixel_count } else { 0 });
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            if translucent {
                alpha.push(pixel.0[3]);
            }
        }

        let image = flate_stream(image_dict(width, height, "DeviceRGB", None), rgb)?;
        let soft_mask = if translucent {
            Some(flate_stream(
                image_dict(width, height, "DeviceGray", None),
                alpha,
            )?)
        } else {
            None
        };

        Ok(Self { image, soft_mask })
    }
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: Option<&str>) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    dict
}

fn flate_stream(dict: Dictionary, data: Vec<u8>) -> Result<Stream, String> {
    let mut stream = Stream::new(dict, data);
    stream
        .compress()
        .map_err(|e| format!("Failed to compress image data: {}", e))?;
    Ok(stream)
}

/// An A4 page under construction: images plus the operations that draw them.
#[derive(Debug, Clone)]
pub struct PageCanvas {
    width: f64,
    height: f64,
    operations: Vec<Operation>,
    images: Vec<(String, ImageXObject)>,
}

impl PageCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            operations: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn images(&self) -> &[(String, ImageXObject)] {
        &self.images
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Draw `xobject` into `rect`, given with a top-left origin as a viewer
    /// measures it. Later images paint over earlier ones. Returns the
    /// resource name the image is registered under.
    pub fn draw_image(&mut self, xobject: ImageXObject, rect: &Rect) -> String {
        let name = format!("Im{}", self.images.len());
        // PDF user space grows upward from the bottom-left corner.
        let bottom = self.height - rect.y1;

        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(rect.width() as f32),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(rect.height() as f32),
                Object::Real(rect.x0 as f32),
                Object::Real(bottom as f32),
            ],
        ));
        self.operations
            .push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
        self.operations.push(Operation::new("Q", vec![]));

        self.images.push((name.clone(), xobject));
        name
    }

    pub fn into_parts(self) -> (f64, f64, Vec<Operation>, Vec<(String, ImageXObject)>) {
        (self.width, self.height, self.operations, self.images)
    }
}
