pub mod estimate;
pub mod order;
pub mod page;
pub mod profile;
pub mod rotation;
pub mod stamp;

pub use estimate::SizeEstimate;
pub use order::PageOrder;
pub use page::PageDescriptor;
pub use profile::CompressionProfile;
pub use rotation::Rotation;
pub use stamp::StampPlacement;
