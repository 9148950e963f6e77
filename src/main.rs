use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::fs;

use pdf_budget::cli::{parse_page_list, Args};
use pdf_budget::config::Settings;
use pdf_budget::model::{PageOrder, StampPlacement};
use pdf_budget::{export_pages, BudgetController, CompressionRequest, PdfiumRasterizer};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Read input file
    let input = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    // Export mode: copy pages out untouched and stop
    if let Some(ref list) = args.export {
        let pages = parse_page_list(list).map_err(|e| anyhow::anyhow!("Invalid export list: {}", e))?;
        let dir = args.export_dir();
        let written = export_pages(&input, &pages, &dir, &args.export_stem())
            .with_context(|| "Failed to export pages")?;
        for path in written {
            println!("Exported {}", path.display());
        }
        return Ok(());
    }

    let target = args
        .target
        .context("A target size is required unless --export is given")?;

    let mut stamps: BTreeMap<usize, Vec<StampPlacement>> = BTreeMap::new();
    for stamp in &args.stamps {
        let image_bytes = fs::read(&stamp.image)
            .with_context(|| format!("Failed to read stamp image: {}", stamp.image.display()))?;
        stamps.entry(stamp.page).or_default().push(StampPlacement::new(
            image_bytes,
            stamp.x_ratio,
            stamp.y_ratio,
            stamp.width_ratio,
            stamp.height_ratio,
        ));
    }

    let page_order = match args.order {
        Some(ref spec) => Some(PageOrder::new(
            parse_page_list(spec).map_err(|e| anyhow::anyhow!("Invalid page order: {}", e))?,
        )),
        None => None,
    };

    let request = CompressionRequest {
        rotations: args.rotations.iter().copied().collect(),
        stamps,
        page_order,
        target_size_bytes: target,
    };

    // Build settings from CLI args
    let settings = Settings::from_args(&args);
    let output_path = args.output_path();

    let rasterizer = PdfiumRasterizer::new(settings.pdfium_library.as_deref())
        .with_context(|| "Failed to initialize PDFium")?;
    let report = BudgetController::new(&settings, &rasterizer)
        .run(&input, &request, &output_path)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    println!(
        "Wrote {} ({} pages, {} -> {} bytes): {}",
        output_path.display(),
        report.output_page_count,
        report.original_size_bytes,
        report.final_size_bytes,
        report.outcome
    );
    if !report.met_target {
        println!("Warning: target of {} bytes was not met", target);
    }

    Ok(())
}
