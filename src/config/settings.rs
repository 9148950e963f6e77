use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;
use crate::model::CompressionProfile;

use super::defaults::*;

/// Runtime settings for one compression invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Stage profiles, tried in order
    pub profiles: Vec<CompressionProfile>,

    /// Raster memory the page worker pool may hold at once
    pub memory_budget_bytes: u64,
    /// Hard cap on page workers (None = CPU parallelism)
    pub max_workers: Option<usize>,
    /// A stage that runs longer than this is abandoned
    pub stage_deadline: Option<Duration>,

    /// PDFium shared library (None = system library)
    pub pdfium_library: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
            max_workers: None,
            stage_deadline: None,
            pdfium_library: None,
        }
    }
}

/// The three default stages: each lowers quality, resolution and the
/// copy-through threshold, so more pages are re-rendered as stages progress.
pub fn default_profiles() -> Vec<CompressionProfile> {
    vec![
        CompressionProfile {
            jpeg_quality: STAGE1_JPEG_QUALITY,
            dpi: STAGE1_DPI,
            size_threshold_kb: STAGE1_THRESHOLD_KB,
        },
        CompressionProfile {
            jpeg_quality: STAGE2_JPEG_QUALITY,
            dpi: STAGE2_DPI,
            size_threshold_kb: STAGE2_THRESHOLD_KB,
        },
        CompressionProfile {
            jpeg_quality: STAGE3_JPEG_QUALITY,
            dpi: STAGE3_DPI,
            size_threshold_kb: STAGE3_THRESHOLD_KB,
        },
    ]
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_args(args: &Args) -> Self {
        let defaults = Self::default();
        Self {
            profiles: if args.stages.is_empty() {
                defaults.profiles
            } else {
                args.stages.clone()
            },
            memory_budget_bytes: args.memory_budget.unwrap_or(defaults.memory_budget_bytes),
            max_workers: args.workers,
            stage_deadline: args.stage_deadline.map(Duration::from_secs),
            pdfium_library: args.pdfium_lib.clone(),
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<CompressionProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn with_stage_deadline(mut self, deadline: Duration) -> Self {
        self.stage_deadline = Some(deadline);
        self
    }

    /// Raster bytes one in-flight page needs at `dpi`: an A4 canvas is the
    /// largest image a normalized page can produce.
    pub fn raster_cost_bytes(dpi: u32) -> u64 {
        let px_w = (A4_WIDTH_IN * dpi as f64).ceil() as u64;
        let px_h = (A4_HEIGHT_IN * dpi as f64).ceil() as u64;
        px_w * px_h * RASTER_BYTES_PER_PIXEL
    }

    /// Page worker count for a stage: bounded by raster memory first, then
    /// by CPU parallelism and the configured cap. Always at least one.
    pub fn worker_count(&self, profile: &CompressionProfile) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let per_page = Self::raster_cost_bytes(profile.dpi).max(1);
        let by_memory = usize::try_from(self.memory_budget_bytes / per_page).unwrap_or(usize::MAX);

        by_memory
            .min(cpus)
            .min(self.max_workers.unwrap_or(usize::MAX))
            .max(1)
    }
}
