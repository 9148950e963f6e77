use super::rotation::Rotation;

/// One output page as the pipeline sees it during a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Index of the page in the source document (0-based)
    pub source_index: usize,
    /// Position of the page in the output document (0-based)
    pub output_index: usize,
    /// Caller-requested rotation on top of the page's own `/Rotate`
    pub rotation: Rotation,
    pub has_stamps: bool,
}

impl PageDescriptor {
    pub fn new(source_index: usize, output_index: usize) -> Self {
        Self {
            source_index,
            output_index,
            rotation: Rotation::None,
            has_stamps: false,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_stamps(mut self, has_stamps: bool) -> Self {
        self.has_stamps = has_stamps;
        self
    }

    /// 1-based output page number, for log messages and failures
    pub fn page_number(&self) -> usize {
        self.output_index + 1
    }
}
