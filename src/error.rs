use std::path::PathBuf;

use thiserror::Error;

/// Failures that make producing any valid output impossible.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to open source PDF: {0}")]
    Source(String),

    #[error("Failed to write output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rasterizer unavailable: {0}")]
    RasterizerUnavailable(String),

    #[error("Compression cancelled")]
    Cancelled,
}

/// A single page (or a single stamp on it) could not be produced.
///
/// Page numbers are 1-based output page numbers, as a viewer shows them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageFailure {
    #[error("Failed to rasterize page {page}: {message}")]
    Rasterize { page: usize, message: String },

    #[error("Failed to encode page {page}: {message}")]
    Encode { page: usize, message: String },

    #[error("Failed to composite stamp {stamp} on page {page}: {message}")]
    Stamp {
        page: usize,
        stamp: usize,
        message: String,
    },
}

/// A whole stage produced nothing usable; the controller moves on to the next stage.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("Failed to build page worker pool: {0}")]
    Pool(String),

    #[error("Failed to assemble destination document: {0}")]
    Assemble(String),

    #[error("Destination document is unreadable: {0}")]
    Unreadable(String),

    #[error("Stage deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("Stage cancelled")]
    Cancelled,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid page list: {0}")]
    InvalidPageList(String),

    #[error("Invalid rotation: {0}")]
    InvalidRotation(String),

    #[error("Invalid stamp specification: {0}")]
    InvalidStamp(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid compression profile: {0}")]
    InvalidProfile(String),
}

impl From<lopdf::Error> for StageFailure {
    fn from(err: lopdf::Error) -> Self {
        StageFailure::Assemble(err.to_string())
    }
}
