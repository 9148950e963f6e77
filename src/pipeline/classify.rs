use crate::model::{CompressionProfile, PageDescriptor, SizeEstimate};

/// What a stage does with one output page
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PageAction {
    /// Transfer the source page objects unchanged
    CopyThrough,
    /// Rasterize onto an A4 canvas, then composite stamps
    ReRender,
}

/// Decide copy-through vs. re-render for one page under one profile.
///
/// Rules, first match wins:
/// 1. stamps need raster compositing: re-render
/// 2. a caller rotation cannot be expressed by copy-through: re-render
/// 3. pages lighter than the profile threshold: copy-through
/// 4. everything else: re-render
pub fn classify(
    page: &PageDescriptor,
    estimate: &SizeEstimate,
    profile: &CompressionProfile,
) -> PageAction {
    if page.has_stamps {
        return PageAction::ReRender;
    }
    if !page.rotation.is_none() {
        return PageAction::ReRender;
    }
    if estimate.total_bytes() < profile.size_threshold_kb.saturating_mul(1024) {
        return PageAction::CopyThrough;
    }
    PageAction::ReRender
}
