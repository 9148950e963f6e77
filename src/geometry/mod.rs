//! Rotation algebra and A4 normalization

pub mod matrix;
pub mod normalize;

pub use matrix::{Matrix, Rect};
pub use normalize::{normalize, Normalized, Orientation};
