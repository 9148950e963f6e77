//! Multi-stage budget controller.
//!
//! Tries the original document first, then each stage profile in order,
//! and stops at the first result within the byte budget. When no stage
//! gets there the original bytes are written unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::remap::remap;
use super::stage::{StageContext, StageReport};
use crate::config::Settings;
use crate::error::{EngineError, StageFailure};
use crate::model::{PageOrder, Rotation, StampPlacement};
use crate::output::write_atomic;
use crate::raster::Rasterizer;
use crate::source::SourceDocument;

/// Cooperative cancellation shared between a caller and a running compression.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-supplied edits and the byte budget for one invocation.
///
/// Rotations and stamps are keyed by 0-based source page index.
#[derive(Debug, Clone, Default)]
pub struct CompressionRequest {
    pub rotations: BTreeMap<usize, Rotation>,
    pub stamps: BTreeMap<usize, Vec<StampPlacement>>,
    /// Output arrangement (None = source order)
    pub page_order: Option<PageOrder>,
    pub target_size_bytes: u64,
}

impl CompressionRequest {
    pub fn new(target_size_bytes: u64) -> Self {
        Self {
            target_size_bytes,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, source_index: usize, rotation: Rotation) -> Self {
        self.rotations.insert(source_index, rotation);
        self
    }

    pub fn with_stamp(mut self, source_index: usize, stamp: StampPlacement) -> Self {
        self.stamps.entry(source_index).or_default().push(stamp);
        self
    }

    pub fn with_page_order(mut self, order: PageOrder) -> Self {
        self.page_order = Some(order);
        self
    }

    /// True when the caller asked for something only a stage can produce.
    /// Edits keyed to pages that never reach the output do not count.
    fn needs_transformation(&self, order: &PageOrder, page_count: usize) -> bool {
        !order.is_identity(page_count)
            || remap(&self.rotations, order).values().any(|r| !r.is_none())
            || remap(&self.stamps, order).values().any(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The input already met the budget and needed no edits
    Original,
    /// Stage `stage` (1-based) met the budget
    Compressed { stage: usize },
    /// No stage met the budget; the input was written unchanged
    FallbackOriginal,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Original => write!(f, "original kept"),
            Outcome::Compressed { stage } => write!(f, "compressed at stage {}", stage),
            Outcome::FallbackOriginal => write!(f, "fell back to original"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionReport {
    pub outcome: Outcome,
    pub met_target: bool,
    pub original_size_bytes: u64,
    pub final_size_bytes: u64,
    pub output_page_count: usize,
    pub stages: Vec<StageReport>,
}

/// Result of a compression before it is written anywhere
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub report: CompressionReport,
}

#[derive(Debug)]
enum ControllerState {
    NotStarted,
    TryOriginal,
    /// 0-based index into the stage profiles
    TryStage(usize),
    Done(Outcome),
}

pub struct BudgetController<'a> {
    settings: &'a Settings,
    rasterizer: &'a dyn Rasterizer,
    cancel: CancelToken,
}

impl<'a> BudgetController<'a> {
    pub fn new(settings: &'a Settings, rasterizer: &'a dyn Rasterizer) -> Self {
        Self {
            settings,
            rasterizer,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Compress `input` and write the result to `output`. Nothing is written
    /// when the source is unreadable, the request is invalid or the run is
    /// cancelled.
    pub fn run(
        &self,
        input: &[u8],
        request: &CompressionRequest,
        output: &Path,
    ) -> Result<CompressionReport, EngineError> {
        let compressed = self.compress(input, request)?;
        write_atomic(output, &compressed.bytes)?;
        Ok(compressed.report)
    }

    /// Compress `input` in memory.
    pub fn compress(
        &self,
        input: &[u8],
        request: &CompressionRequest,
    ) -> Result<Compressed, EngineError> {
        let source = SourceDocument::open(input)?;
        let page_count = source.page_count();
        let order = request
            .page_order
            .clone()
            .unwrap_or_else(|| PageOrder::identity(page_count));
        order.validate(page_count)?;

        let original_size = source.size_bytes();
        let target = request.target_size_bytes;
        let context = StageContext {
            source: &source,
            rasterizer: self.rasterizer,
            settings: self.settings,
            request,
            order: &order,
            cancel: &self.cancel,
        };

        let mut stages = Vec::new();
        let mut stage_bytes = None;
        let mut state = ControllerState::NotStarted;

        let outcome = loop {
            state = match state {
                ControllerState::NotStarted => ControllerState::TryOriginal,
                ControllerState::TryOriginal => {
                    if original_size <= target
                        && !request.needs_transformation(&order, page_count)
                    {
                        ControllerState::Done(Outcome::Original)
                    } else {
                        log::info!(
                            "Original is {} bytes (target {}), running stages",
                            original_size,
                            target
                        );
                        ControllerState::TryStage(0)
                    }
                }
                ControllerState::TryStage(index) => match self.settings.profiles.get(index) {
                    None => {
                        log::warn!("No stage met the {} byte target", target);
                        ControllerState::Done(Outcome::FallbackOriginal)
                    }
                    Some(profile) => {
                        if self.cancel.is_cancelled() {
                            return Err(EngineError::Cancelled);
                        }

                        let stage = index + 1;
                        log::info!("Stage {}: {}", stage, profile);
                        let (report, result) = context.run(stage, profile);
                        log::info!("{}", report);
                        stages.push(report);

                        match result {
                            Ok(bytes) if bytes.len() as u64 <= target => {
                                stage_bytes = Some(bytes);
                                ControllerState::Done(Outcome::Compressed { stage })
                            }
                            Ok(_) => ControllerState::TryStage(index + 1),
                            Err(StageFailure::Cancelled) => return Err(EngineError::Cancelled),
                            Err(failure) => {
                                log::warn!("Stage {} failed: {}", stage, failure);
                                ControllerState::TryStage(index + 1)
                            }
                        }
                    }
                },
                ControllerState::Done(outcome) => break outcome,
            };
        };

        let (bytes, output_page_count) = match stage_bytes {
            Some(bytes) => (bytes, order.len()),
            None => (source.bytes().to_vec(), page_count),
        };
        let final_size = bytes.len() as u64;
        let report = CompressionReport {
            outcome,
            met_target: final_size <= target && outcome != Outcome::FallbackOriginal,
            original_size_bytes: original_size,
            final_size_bytes: final_size,
            output_page_count,
            stages,
        };
        log::info!(
            "{}: {} -> {} bytes",
            report.outcome,
            report.original_size_bytes,
            report.final_size_bytes
        );

        Ok(Compressed { bytes, report })
    }
}
