//! The compression pipeline: per-page decisions, page assembly and the
//! stage controller that ties them together.

pub mod assemble;
pub mod canvas;
pub mod classify;
pub mod controller;
pub mod remap;
pub mod stage;
pub mod stamp;

pub use assemble::DestinationBuilder;
pub use canvas::{ImageXObject, PageCanvas};
pub use classify::{classify, PageAction};
pub use controller::{
    BudgetController, CancelToken, Compressed, CompressionReport, CompressionRequest, Outcome,
};
pub use remap::remap;
pub use stage::StageReport;
pub use stamp::{composite, stamp_rect};
