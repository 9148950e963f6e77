/// Cheap weight estimate of one source page. Font programs are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeEstimate {
    pub content_stream_bytes: u64,
    pub embedded_image_bytes: u64,
}

impl SizeEstimate {
    pub fn total_bytes(&self) -> u64 {
        self.content_stream_bytes + self.embedded_image_bytes
    }

    /// Whole kilobytes (1024-based), rounded down
    pub fn total_kb(&self) -> u64 {
        self.total_bytes() / 1024
    }
}
