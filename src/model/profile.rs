use std::fmt;

use crate::error::ConfigError;

/// Quality settings for one compression stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionProfile {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Raster resolution for re-rendered pages
    pub dpi: u32,
    /// Pages whose estimated weight is below this many KB are copied through
    pub size_threshold_kb: u64,
}

impl CompressionProfile {
    pub fn new(jpeg_quality: u8, dpi: u32, size_threshold_kb: u64) -> Result<Self, ConfigError> {
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::InvalidProfile(format!(
                "JPEG quality must be between 1 and 100, got {}",
                jpeg_quality
            )));
        }
        if dpi == 0 {
            return Err(ConfigError::InvalidProfile("DPI must be positive".to_string()));
        }
        Ok(Self {
            jpeg_quality,
            dpi,
            size_threshold_kb,
        })
    }

    /// Raster super-sampling factor relative to PDF points (72 per inch)
    pub fn dpi_multiplier(&self) -> f64 {
        self.dpi as f64 / 72.0
    }
}

impl fmt::Display for CompressionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quality {} @ {} dpi, threshold {} KB",
            self.jpeg_quality, self.dpi, self.size_threshold_kb
        )
    }
}
