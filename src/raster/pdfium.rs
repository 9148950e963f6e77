//! PDFium-backed rasterizer.
//!
//! PDFium is not thread-safe, so a single renderer thread owns the library
//! binding and the loaded document; page workers send it render jobs over a
//! channel and block on the reply. Encoding, the expensive half of a page
//! task, still runs in parallel on the workers.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::RgbImage;
use pdfium_render::prelude::*;

use super::Rasterizer;
use crate::error::EngineError;
use crate::geometry::Matrix;
use crate::model::Rotation;
use crate::source::SourceDocument;

struct RenderJob {
    bytes: Arc<[u8]>,
    page_index: usize,
    /// Rotation to add on top of the page's own `/Rotate`
    rotation: Rotation,
    scale: f32,
    reply: Sender<Result<RgbImage, String>>,
}

pub struct PdfiumRasterizer {
    jobs: Option<Sender<RenderJob>>,
    worker: Option<JoinHandle<()>>,
}

impl PdfiumRasterizer {
    /// Bind PDFium (from `library`, or the system library) on a dedicated
    /// renderer thread.
    pub fn new(library: Option<&Path>) -> Result<Self, EngineError> {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let library = library.map(PathBuf::from);

        let worker = std::thread::Builder::new()
            .name("pdfium-renderer".to_string())
            .spawn(move || serve(library, ready_tx, jobs_rx))
            .map_err(|e| EngineError::RasterizerUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                jobs: Some(jobs_tx),
                worker: Some(worker),
            }),
            Ok(Err(message)) => {
                let _ = worker.join();
                Err(EngineError::RasterizerUnavailable(message))
            }
            Err(_) => {
                let _ = worker.join();
                Err(EngineError::RasterizerUnavailable(
                    "renderer thread exited during startup".to_string(),
                ))
            }
        }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        source: &SourceDocument,
        page_index: usize,
        transform: &Matrix,
    ) -> Result<RgbImage, String> {
        let page = source
            .page(page_index)
            .ok_or_else(|| format!("no page at index {}", page_index))?;
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| "renderer is shut down".to_string())?;

        // PDFium applies /Rotate itself; only the caller's extra turn is passed on.
        let rotation = Rotation::from_quarter_turns(
            transform.rotation().quarter_turns() - page.rotation.quarter_turns(),
        );

        let (reply_tx, reply_rx) = mpsc::channel();
        jobs.send(RenderJob {
            bytes: Arc::clone(source.bytes()),
            page_index,
            rotation,
            scale: transform.scale_factor() as f32,
            reply: reply_tx,
        })
        .map_err(|_| "renderer thread is gone".to_string())?;

        reply_rx
            .recv()
            .map_err(|_| "renderer thread dropped the job".to_string())?
    }
}

impl Drop for PdfiumRasterizer {
    fn drop(&mut self) {
        // Closing the channel ends the renderer loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn bind(library: Option<&Path>) -> Result<Pdfium, String> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| format!("failed to load PDFium: {}", e))?;
    Ok(Pdfium::new(bindings))
}

fn serve(
    library: Option<PathBuf>,
    ready: Sender<Result<(), String>>,
    jobs: Receiver<RenderJob>,
) {
    let pdfium = match bind(library.as_deref()) {
        Ok(pdfium) => pdfium,
        Err(message) => {
            let _ = ready.send(Err(message));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut loaded: Option<(Arc<[u8]>, PdfDocument<'_>)> = None;
    for job in jobs {
        let result = render(&pdfium, &mut loaded, &job);
        let _ = job.reply.send(result);
    }
}

fn render<'a>(
    pdfium: &'a Pdfium,
    loaded: &mut Option<(Arc<[u8]>, PdfDocument<'a>)>,
    job: &RenderJob,
) -> Result<RgbImage, String> {
    let cached = matches!(loaded, Some((bytes, _)) if Arc::ptr_eq(bytes, &job.bytes));
    if !cached {
        let document = pdfium
            .load_pdf_from_byte_vec(job.bytes.to_vec(), None)
            .map_err(|e| format!("failed to load document: {}", e))?;
        *loaded = Some((Arc::clone(&job.bytes), document));
    }
    let (_, document) = loaded
        .as_ref()
        .ok_or_else(|| "no document loaded".to_string())?;

    let index = u16::try_from(job.page_index)
        .map_err(|_| format!("page index {} out of range", job.page_index))?;
    let page = document
        .pages()
        .get(index)
        .map_err(|e| format!("failed to get page: {}", e))?;

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(job.scale)
        .rotate(pdfium_rotation(job.rotation), false)
        .set_clear_color(PdfColor::WHITE)
        .render_annotations(true)
        .render_form_data(true);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| format!("failed to render: {}", e))?;

    Ok(bitmap.as_image().to_rgb8())
}

fn pdfium_rotation(rotation: Rotation) -> PdfPageRenderRotation {
    match rotation {
        Rotation::None => PdfPageRenderRotation::None,
        Rotation::Cw90 => PdfPageRenderRotation::Degrees90,
        Rotation::Cw180 => PdfPageRenderRotation::Degrees180,
        Rotation::Cw270 => PdfPageRenderRotation::Degrees270,
    }
}
