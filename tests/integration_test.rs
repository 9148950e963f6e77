use std::fs;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use pdf_budget::geometry::{Matrix, Rect};
use pdf_budget::source::SourceDocument;
use pdf_budget::{
    export_pages, BudgetController, CancelToken, CompressionProfile, CompressionRequest,
    EngineError, Outcome, PageOrder, Rasterizer, Rotation, Settings, StampPlacement,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct PageSpec {
    width: f64,
    height: f64,
    rotate: Option<i64>,
    /// Side of an uncompressed RGB noise image drawn over the page
    image_side: Option<u32>,
}

impl PageSpec {
    fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            rotate: None,
            image_side: None,
        }
    }

    fn heavy(side: u32) -> Self {
        Self {
            image_side: Some(side),
            ..Self::letter()
        }
    }

    fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }
}

/// Deterministic pseudo-random bytes (64-bit LCG)
fn noise_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (i, spec) in pages.iter().enumerate() {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(24)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(72)]),
            Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
            Operation::new("ET", vec![]),
        ];
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };

        if let Some(side) = spec.image_side {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => side as i64,
                    "Height" => side as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                },
                noise_bytes((side * side * 3) as usize, i as u64),
            ));
            resources.set("XObject", dictionary! { "Img" => image_id });
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(spec.width as f32),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(spec.height as f32),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Img".to_vec())]),
                Operation::new("Q", vec![]),
            ]);
        }

        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(spec.width as f32),
                Object::Real(spec.height as f32),
            ],
            "Resources" => resources,
            "Contents" => content_id,
        };
        if let Some(degrees) = spec.rotate {
            page.set("Rotate", degrees);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn light_pdf(page_count: usize) -> Vec<u8> {
    build_pdf(&vec![PageSpec::letter(); page_count])
}

fn stamp_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_fn(32, 16, |x, _| Rgba([200, 0, 0, if x < 16 { 255 } else { 128 }]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn pixel_size(source: &SourceDocument, page_index: usize, transform: &Matrix) -> Result<(u32, u32), String> {
    let page = source
        .page(page_index)
        .ok_or_else(|| format!("no page {}", page_index))?;
    let rect = transform.transform_rect(&page.raw_rect);
    Ok((
        rect.width().round().max(1.0) as u32,
        rect.height().round().max(1.0) as u32,
    ))
}

/// Smooth gradient: compresses to almost nothing
struct GradientRasterizer;

impl Rasterizer for GradientRasterizer {
    fn rasterize(
        &self,
        source: &SourceDocument,
        page_index: usize,
        transform: &Matrix,
    ) -> Result<RgbImage, String> {
        let (width, height) = pixel_size(source, page_index, transform)?;
        Ok(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 160])
        }))
    }
}

/// Per-pixel noise: JPEG cannot get it small
struct NoiseRasterizer;

impl Rasterizer for NoiseRasterizer {
    fn rasterize(
        &self,
        source: &SourceDocument,
        page_index: usize,
        transform: &Matrix,
    ) -> Result<RgbImage, String> {
        let (width, height) = pixel_size(source, page_index, transform)?;
        let raw = noise_bytes((width * height * 3) as usize, page_index as u64 + 99);
        RgbImage::from_raw(width, height, raw).ok_or_else(|| "bad buffer".to_string())
    }
}

struct FailingRasterizer;

impl Rasterizer for FailingRasterizer {
    fn rasterize(&self, _: &SourceDocument, _: usize, _: &Matrix) -> Result<RgbImage, String> {
        Err("renderer crashed".to_string())
    }
}

fn load(path: &Path) -> Document {
    Document::load(path).expect("output should be a readable PDF")
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

fn media_box(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let values: Vec<f64> = page
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_float().unwrap() as f64)
        .collect();
    (values[2] - values[0], values[3] - values[1])
}

fn page_text(doc: &Document, page_id: ObjectId) -> String {
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// `cm` rectangles drawn on a page, converted back to top-left origin
fn drawn_rects(doc: &Document, page_id: ObjectId) -> Vec<Rect> {
    let (_, page_height) = media_box(doc, page_id);
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "cm")
        .map(|op| {
            let v: Vec<f64> = op
                .operands
                .iter()
                .map(|o| o.as_float().unwrap() as f64)
                .collect();
            Rect::from_origin(v[4], page_height - v[5] - v[3], v[0], v[3])
        })
        .collect()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.5
}

// ---------------------------------------------------------------------------
// Budget controller
// ---------------------------------------------------------------------------

#[test]
fn test_fast_path_writes_original_bytes() {
    let input = light_pdf(3);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();

    let report = BudgetController::new(&settings, &FailingRasterizer)
        .run(&input, &CompressionRequest::new(1024 * 1024), &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::Original);
    assert!(report.met_target);
    assert!(report.stages.is_empty());
    assert_eq!(fs::read(&output).unwrap(), input);
}

#[test]
fn test_edits_on_missing_pages_keep_fast_path() {
    let input = light_pdf(1);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let request = CompressionRequest::new(10 * 1024 * 1024)
        .with_rotation(5, Rotation::Cw90)
        .with_stamp(3, StampPlacement::new(stamp_png(), 0.1, 0.1, 0.2, 0.2));

    let report = BudgetController::new(&settings, &FailingRasterizer)
        .run(&input, &request, &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::Original);
    assert!(report.stages.is_empty());
    assert_eq!(fs::read(&output).unwrap(), input);
}

#[test]
fn test_heavy_pages_rerendered_at_first_stage() {
    // Ten pages, two of them carrying ~5 MB of raw image data.
    let mut pages = vec![PageSpec::letter(); 10];
    pages[3] = PageSpec::heavy(1400);
    pages[7] = PageSpec::heavy(1400);
    let input = build_pdf(&pages);
    assert!(input.len() > 10 * 1024 * 1024);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let target = 3 * 1024 * 1024;

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &CompressionRequest::new(target), &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::Compressed { stage: 1 });
    assert!(report.met_target);
    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].rendered_pages, 2);
    assert_eq!(report.stages[0].copied_pages, 8);
    assert!(report.final_size_bytes <= target);
    assert_eq!(fs::metadata(&output).unwrap().len(), report.final_size_bytes);

    let doc = load(&output);
    let ids = page_ids(&doc);
    assert_eq!(ids.len(), 10);
    // Re-rendered pages are A4; copied pages keep their letter size.
    let (w, h) = media_box(&doc, ids[3]);
    assert!(approx(w, 595.2) && approx(h, 841.8));
    let (w, h) = media_box(&doc, ids[0]);
    assert!(approx(w, 612.0) && approx(h, 792.0));
    assert!(page_text(&doc, ids[0]).contains("Page 1"));
}

#[test]
fn test_unreachable_target_falls_back_to_original() {
    let input = build_pdf(&[PageSpec::heavy(400), PageSpec::letter(), PageSpec::heavy(400)]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    // Same shape as the defaults at lower resolutions, to keep the test quick
    let settings = Settings::default().with_profiles(vec![
        CompressionProfile::new(80, 72, 300).unwrap(),
        CompressionProfile::new(60, 48, 100).unwrap(),
        CompressionProfile::new(40, 36, 0).unwrap(),
    ]);

    let report = BudgetController::new(&settings, &NoiseRasterizer)
        .run(&input, &CompressionRequest::new(10 * 1024), &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::FallbackOriginal);
    assert!(!report.met_target);
    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages[2].rendered_pages, 3);
    assert_eq!(fs::read(&output).unwrap(), input);
}

#[test]
fn test_repeated_runs_produce_same_size() {
    let input = build_pdf(&[PageSpec::letter(), PageSpec::heavy(500), PageSpec::letter()]);
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::default();
    let request = CompressionRequest::new(512 * 1024).with_rotation(0, Rotation::Cw90);
    let controller = BudgetController::new(&settings, &GradientRasterizer);

    let first = controller
        .run(&input, &request, &dir.path().join("a.pdf"))
        .unwrap();
    let second = controller
        .run(&input, &request, &dir.path().join("b.pdf"))
        .unwrap();

    assert_eq!(first.final_size_bytes, second.final_size_bytes);
    assert_eq!(first.outcome, second.outcome);
}

#[test]
fn test_page_order_drops_and_repeats_pages() {
    let input = light_pdf(4);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let request =
        CompressionRequest::new(1024 * 1024).with_page_order(PageOrder::new(vec![3, 1, 1]));

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &request, &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::Compressed { stage: 1 });
    assert_eq!(report.output_page_count, 3);

    let doc = load(&output);
    let ids = page_ids(&doc);
    assert_eq!(ids.len(), 3);
    assert!(page_text(&doc, ids[0]).contains("Page 4"));
    assert!(page_text(&doc, ids[1]).contains("Page 2"));
    assert!(page_text(&doc, ids[2]).contains("Page 2"));
}

#[test]
fn test_rotation_follows_reorder() {
    // Rotation is requested for source page 0, which ends up second.
    let input = light_pdf(3);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let request = CompressionRequest::new(1024 * 1024)
        .with_rotation(0, Rotation::Cw90)
        .with_page_order(PageOrder::new(vec![2, 0, 1]));

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &request, &output)
        .unwrap();
    assert_eq!(report.stages[0].rendered_pages, 1);

    let doc = load(&output);
    let ids = page_ids(&doc);
    let (w, h) = media_box(&doc, ids[1]);
    assert!(approx(w, 841.8) && approx(h, 595.2), "expected landscape A4, got {}x{}", w, h);
    let (w, h) = media_box(&doc, ids[0]);
    assert!(approx(w, 612.0) && approx(h, 792.0));
}

#[test]
fn test_source_and_forced_rotation_compound() {
    let input = build_pdf(&[
        PageSpec::heavy(400).rotated(90),
        PageSpec::letter().rotated(90),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    // Page 1: heavy, /Rotate 90 only. Page 2: /Rotate 90 plus another quarter turn.
    let request = CompressionRequest::new(200 * 1024).with_rotation(1, Rotation::Cw90);

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &request, &output)
        .unwrap();
    assert!(report.met_target);

    let doc = load(&output);
    let ids = page_ids(&doc);
    let (w, h) = media_box(&doc, ids[0]);
    assert!(w > h, "a 90° page should land on landscape A4");
    let (w, h) = media_box(&doc, ids[1]);
    assert!(h > w, "two quarter turns should land on portrait A4");
}

#[test]
fn test_stamp_lands_on_reordered_page_inside_base() {
    let input = light_pdf(3);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    // Stamp on source page 2, which is moved to the front.
    let request = CompressionRequest::new(1024 * 1024)
        .with_stamp(2, StampPlacement::new(stamp_png(), 0.6, 0.8, 0.3, 0.1))
        .with_page_order(PageOrder::new(vec![2, 0, 1]));

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &request, &output)
        .unwrap();

    // A light page is still re-rendered to take the stamp.
    assert_eq!(report.stages[0].rendered_pages, 1);
    assert_eq!(report.stages[0].copied_pages, 2);
    assert_eq!(report.stages[0].stamps_skipped, 0);

    let doc = load(&output);
    let ids = page_ids(&doc);
    let rects = drawn_rects(&doc, ids[0]);
    assert_eq!(rects.len(), 2, "base image plus one stamp");
    let (base, stamp) = (rects[0], rects[1]);
    assert!(base.contains(&stamp));
    assert!(approx(stamp.x0, base.x0 + base.width() * 0.6));
    assert!(approx(stamp.y0, base.y0 + base.height() * 0.8));
    assert!(approx(stamp.width(), base.width() * 0.3));
}

#[test]
fn test_bad_stamp_is_skipped_page_still_rendered() {
    let input = light_pdf(2);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let request = CompressionRequest::new(1024 * 1024)
        .with_stamp(1, StampPlacement::new(b"not an image".to_vec(), 0.1, 0.1, 0.2, 0.2))
        .with_stamp(1, StampPlacement::new(stamp_png(), 0.1, 0.5, 0.2, 0.2));

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &request, &output)
        .unwrap();

    assert_eq!(report.stages[0].stamps_skipped, 1);
    let doc = load(&output);
    let ids = page_ids(&doc);
    assert_eq!(drawn_rects(&doc, ids[1]).len(), 2);
}

#[test]
fn test_zero_size_page_gets_portrait_a4() {
    let mut zero = PageSpec::letter();
    zero.width = 0.0;
    zero.height = 0.0;
    let input = build_pdf(&[zero, PageSpec::letter()]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let request = CompressionRequest::new(1024 * 1024).with_rotation(0, Rotation::Cw90);

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &request, &output)
        .unwrap();
    assert!(report.met_target);

    let doc = load(&output);
    let (w, h) = media_box(&doc, page_ids(&doc)[0]);
    assert!(approx(w, 595.2) && approx(h, 841.8));
    for rect in drawn_rects(&doc, page_ids(&doc)[0]) {
        assert!(rect.x0.is_finite() && rect.y0.is_finite());
    }
}

#[test]
fn test_failing_rasterizer_copies_pages_through() {
    let input = build_pdf(&[PageSpec::heavy(600), PageSpec::letter(), PageSpec::letter()]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();

    let report = BudgetController::new(&settings, &FailingRasterizer)
        .run(&input, &CompressionRequest::new(500 * 1024), &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::FallbackOriginal);
    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages[0].fallback_pages, 1);
    assert_eq!(report.stages[2].fallback_pages, 3);
    assert!(report.stages.iter().all(|s| s.rendered_pages == 0));
    assert_eq!(fs::read(&output).unwrap(), input);
}

#[test]
fn test_expired_deadline_fails_every_stage() {
    let input = build_pdf(&[PageSpec::heavy(400), PageSpec::letter()]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default().with_stage_deadline(std::time::Duration::from_nanos(1));

    let report = BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &CompressionRequest::new(100 * 1024), &output)
        .unwrap();

    assert_eq!(report.outcome, Outcome::FallbackOriginal);
    assert_eq!(report.stages.len(), 3);
    for stage in &report.stages {
        assert!(stage.size_bytes.is_none());
        assert!(stage.failure.as_deref().unwrap().contains("deadline"));
    }
    assert_eq!(fs::read(&output).unwrap(), input);
}

#[test]
fn test_cancelled_run_writes_nothing() {
    let input = build_pdf(&[PageSpec::heavy(400)]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = BudgetController::new(&settings, &GradientRasterizer)
        .with_cancel(cancel)
        .run(&input, &CompressionRequest::new(1024), &output);

    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert!(!output.exists());
}

#[test]
fn test_unreadable_source_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();

    let result = BudgetController::new(&settings, &GradientRasterizer).run(
        b"%PDF-1.4 definitely not a document",
        &CompressionRequest::new(1024),
        &output,
    );

    assert!(matches!(result, Err(EngineError::Source(_))));
    assert!(!output.exists());
}

#[test]
fn test_out_of_range_order_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default();
    let request = CompressionRequest::new(1024).with_page_order(PageOrder::new(vec![0, 7]));

    let result =
        BudgetController::new(&settings, &GradientRasterizer).run(&light_pdf(2), &request, &output);

    assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
}

#[test]
fn test_single_worker_keeps_page_order() {
    let input = build_pdf(&[
        PageSpec::heavy(400),
        PageSpec::letter(),
        PageSpec::heavy(400),
        PageSpec::letter(),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let settings = Settings::default().with_max_workers(1);

    BudgetController::new(&settings, &GradientRasterizer)
        .run(&input, &CompressionRequest::new(400 * 1024), &output)
        .unwrap();

    let doc = load(&output);
    let ids = page_ids(&doc);
    assert_eq!(ids.len(), 4);
    assert!(page_text(&doc, ids[1]).contains("Page 2"));
    assert!(page_text(&doc, ids[3]).contains("Page 4"));
}

// ---------------------------------------------------------------------------
// Page export
// ---------------------------------------------------------------------------

#[test]
fn test_export_pages_untouched() {
    let input = build_pdf(&[PageSpec::letter(), PageSpec::heavy(300), PageSpec::letter()]);
    let dir = tempfile::tempdir().unwrap();

    let written = export_pages(&input, &[1], dir.path(), "report").unwrap();

    assert_eq!(written, vec![dir.path().join("report_page_2.pdf")]);
    let doc = load(&written[0]);
    let ids = page_ids(&doc);
    assert_eq!(ids.len(), 1);
    let (w, h) = media_box(&doc, ids[0]);
    assert!(approx(w, 612.0) && approx(h, 792.0));
    assert!(page_text(&doc, ids[0]).contains("Page 2"));
}
