//! One stage pass: every output page is classified, re-rendered or copied
//! through on a bounded worker pool, then assembled in page order.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use rayon::prelude::*;

use super::assemble::DestinationBuilder;
use super::canvas::{ImageXObject, PageCanvas};
use super::classify::{classify, PageAction};
use super::controller::{CancelToken, CompressionRequest};
use super::remap::remap;
use super::stamp::composite;
use crate::config::Settings;
use crate::error::StageFailure;
use crate::geometry::normalize;
use crate::model::{CompressionProfile, PageDescriptor, PageOrder, Rotation, StampPlacement};
use crate::raster::{render_page, Rasterizer};
use crate::source::SourceDocument;

/// What happened in one stage, kept for the final report
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    /// 1-based stage number
    pub stage: usize,
    pub profile: CompressionProfile,
    pub rendered_pages: usize,
    pub copied_pages: usize,
    /// Pages meant for re-rendering that were copied through after a failure
    pub fallback_pages: usize,
    pub stamps_skipped: usize,
    /// Serialized size, when the stage produced a document
    pub size_bytes: Option<u64>,
    /// Why the stage produced nothing
    pub failure: Option<String>,
}

impl StageReport {
    fn new(stage: usize, profile: CompressionProfile) -> Self {
        Self {
            stage,
            profile,
            rendered_pages: 0,
            copied_pages: 0,
            fallback_pages: 0,
            stamps_skipped: 0,
            size_bytes: None,
            failure: None,
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage {} ({}): {} rendered, {} copied",
            self.stage, self.profile, self.rendered_pages, self.copied_pages
        )?;
        if self.fallback_pages > 0 {
            write!(f, ", {} fell back", self.fallback_pages)?;
        }
        match (&self.size_bytes, &self.failure) {
            (Some(size), _) => write!(f, ", {} bytes", size),
            (None, Some(failure)) => write!(f, ", failed: {}", failure),
            (None, None) => Ok(()),
        }
    }
}

/// Decision for one output page, produced by a page worker
enum PagePlan {
    Copy,
    Render {
        canvas: PageCanvas,
        stamps_skipped: usize,
    },
    /// Re-render failed; the page is copied through instead
    Fallback,
}

/// Everything a stage needs that does not change between stages
pub struct StageContext<'a> {
    pub source: &'a SourceDocument,
    pub rasterizer: &'a dyn Rasterizer,
    pub settings: &'a Settings,
    pub request: &'a CompressionRequest,
    pub order: &'a PageOrder,
    pub cancel: &'a CancelToken,
}

impl StageContext<'_> {
    /// Run stage `stage` (1-based) with `profile`. The report is filled in
    /// as far as the stage got, even when it fails.
    pub fn run(
        &self,
        stage: usize,
        profile: &CompressionProfile,
    ) -> (StageReport, Result<Vec<u8>, StageFailure>) {
        let mut report = StageReport::new(stage, *profile);
        let result = self.run_inner(profile, &mut report);
        match &result {
            Ok(bytes) => report.size_bytes = Some(bytes.len() as u64),
            Err(failure) => report.failure = Some(failure.to_string()),
        }
        (report, result)
    }

    fn run_inner(
        &self,
        profile: &CompressionProfile,
        report: &mut StageReport,
    ) -> Result<Vec<u8>, StageFailure> {
        let started = Instant::now();

        // Caller maps are keyed by source index; every stage consumes them by output position.
        let rotations = remap(&self.request.rotations, self.order);
        let stamps = remap(&self.request.stamps, self.order);
        let descriptors = describe_pages(self.order, &rotations, &stamps);

        let workers = self.settings.worker_count(profile);
        log::debug!(
            "Stage {}: {} pages on {} workers",
            report.stage,
            descriptors.len(),
            workers
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("page-worker-{}", i))
            .build()
            .map_err(|e| StageFailure::Pool(e.to_string()))?;

        let plans: Vec<PagePlan> = pool.install(|| {
            descriptors
                .par_iter()
                .map(|page| {
                    let page_stamps = stamps
                        .get(&page.output_index)
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    self.plan_page(page, page_stamps, profile, started)
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        if self.cancel.is_cancelled() {
            return Err(StageFailure::Cancelled);
        }

        let mut builder = DestinationBuilder::new(self.source);
        for (page, plan) in descriptors.iter().zip(plans) {
            match plan {
                PagePlan::Copy => {
                    builder.copy_page(page.source_index)?;
                    report.copied_pages += 1;
                }
                PagePlan::Fallback => {
                    builder.copy_page(page.source_index)?;
                    report.copied_pages += 1;
                    report.fallback_pages += 1;
                }
                PagePlan::Render {
                    canvas,
                    stamps_skipped,
                } => {
                    builder.add_canvas(page.source_index, canvas)?;
                    report.rendered_pages += 1;
                    report.stamps_skipped += stamps_skipped;
                }
            }
        }

        builder.finish()
    }

    fn plan_page(
        &self,
        page: &PageDescriptor,
        stamps: &[StampPlacement],
        profile: &CompressionProfile,
        started: Instant,
    ) -> Result<PagePlan, StageFailure> {
        if self.cancel.is_cancelled() {
            return Err(StageFailure::Cancelled);
        }
        if let Some(deadline) = self.settings.stage_deadline {
            if started.elapsed() > deadline {
                return Err(StageFailure::DeadlineExceeded(deadline));
            }
        }

        let estimate = self.source.estimate(page.source_index);
        let action = classify(page, &estimate, profile);
        log::debug!(
            "Page {} (source {}): {:?}, {} KB",
            page.page_number(),
            page.source_index + 1,
            action,
            estimate.total_kb()
        );
        if action == PageAction::CopyThrough {
            return Ok(PagePlan::Copy);
        }

        let Some(info) = self.source.page(page.source_index) else {
            return Ok(PagePlan::Copy);
        };
        let normalized = normalize(info, page.rotation, profile.dpi);

        let rendered = match render_page(
            self.rasterizer,
            self.source,
            page,
            &normalized,
            profile.jpeg_quality,
        ) {
            Ok(rendered) => rendered,
            Err(failure) => {
                log::warn!("{}, copying the page through", failure);
                return Ok(PagePlan::Fallback);
            }
        };

        let base = rendered.placement(&normalized);
        let mut canvas = PageCanvas::new(normalized.target_width, normalized.target_height);
        canvas.draw_image(
            ImageXObject::jpeg(
                rendered.encoded,
                rendered.pixel_width,
                rendered.pixel_height,
            ),
            &base,
        );
        let stamp_failures = composite(&mut canvas, &base, stamps, page.page_number());

        Ok(PagePlan::Render {
            canvas,
            stamps_skipped: stamp_failures.len(),
        })
    }
}

/// Output page descriptors, in output order, from remapped caller maps
pub fn describe_pages(
    order: &PageOrder,
    rotations: &BTreeMap<usize, Rotation>,
    stamps: &BTreeMap<usize, Vec<StampPlacement>>,
) -> Vec<PageDescriptor> {
    order
        .iter()
        .enumerate()
        .map(|(output_index, &source_index)| {
            PageDescriptor::new(source_index, output_index)
                .with_rotation(rotations.get(&output_index).copied().unwrap_or_default())
                .with_stamps(stamps.get(&output_index).is_some_and(|s| !s.is_empty()))
        })
        .collect()
}
