//! Source document access and page weight estimation

pub mod document;
pub mod estimate;

pub use document::{PageInfo, SourceDocument};
