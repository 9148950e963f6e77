/// PDF user space units per inch
pub const POINTS_PER_INCH: f64 = 72.0;

/// A4 portrait width in points
pub const A4_WIDTH_PT: f64 = 595.2;

/// A4 portrait height in points
pub const A4_HEIGHT_PT: f64 = 841.8;

/// A4 width in inches, for raster memory estimates
pub const A4_WIDTH_IN: f64 = A4_WIDTH_PT / POINTS_PER_INCH;

/// A4 height in inches, for raster memory estimates
pub const A4_HEIGHT_IN: f64 = A4_HEIGHT_PT / POINTS_PER_INCH;

/// Stage 1: light touch, only heavy pages are re-rendered
pub const STAGE1_JPEG_QUALITY: u8 = 80;
pub const STAGE1_DPI: u32 = 150;
pub const STAGE1_THRESHOLD_KB: u64 = 300;

/// Stage 2: lower quality, medium pages become eligible too
pub const STAGE2_JPEG_QUALITY: u8 = 60;
pub const STAGE2_DPI: u32 = 120;
pub const STAGE2_THRESHOLD_KB: u64 = 100;

/// Stage 3: every page is re-rendered
pub const STAGE3_JPEG_QUALITY: u8 = 40;
pub const STAGE3_DPI: u32 = 96;
pub const STAGE3_THRESHOLD_KB: u64 = 0;

/// Raster memory the page worker pool may hold at once (1 GiB)
pub const DEFAULT_MEMORY_BUDGET: u64 = 1024 * 1024 * 1024;

/// Bytes held per raster pixel while a page is in flight:
/// the 4-byte renderer bitmap plus the 3-byte RGB copy handed to the encoder
pub const RASTER_BYTES_PER_PIXEL: u64 = 7;
