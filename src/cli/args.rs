use clap::Parser;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::model::{CompressionProfile, Rotation};

#[derive(Parser, Debug)]
#[command(name = "pdf-budget")]
#[command(
    author,
    version,
    about = "Shrink a PDF to a byte budget, normalizing re-rendered pages to A4 and compositing stamps"
)]
pub struct Args {
    /// Input PDF file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output PDF file path (defaults to <input>_compressed.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target size of the output, e.g. "3MB", "500KB" or a byte count
    #[arg(short, long, value_parser = parse_size, required_unless_present = "export")]
    pub target: Option<u64>,

    /// Rotate a source page, as INDEX:DEGREES (e.g. "0:90"); repeatable
    #[arg(short, long = "rotate", value_parser = parse_rotation_arg)]
    pub rotations: Vec<(usize, Rotation)>,

    /// Stamp a source page, as INDEX:IMAGE@X,Y,W,H with ratios of the placed page; repeatable
    #[arg(short, long = "stamp", value_parser = parse_stamp_arg)]
    pub stamps: Vec<StampArg>,

    /// Output page order as source indices (e.g. "2,0,1" or "3-5,0")
    #[arg(long)]
    pub order: Option<String>,

    /// Replace the default stages, as QUALITY:DPI:THRESHOLD_KB; repeatable, tried in order
    #[arg(long = "stage", value_parser = parse_profile)]
    pub stages: Vec<CompressionProfile>,

    /// Maximum number of page workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Raster memory budget for the page workers, e.g. "512MB"
    #[arg(long, value_parser = parse_size)]
    pub memory_budget: Option<u64>,

    /// Give up on a stage after this many seconds
    #[arg(long)]
    pub stage_deadline: Option<u64>,

    /// Path to the PDFium shared library (defaults to the system library)
    #[arg(long)]
    pub pdfium_lib: Option<PathBuf>,

    /// Export the listed source pages untouched as single-page PDFs instead of compressing
    #[arg(long)]
    pub export: Option<String>,

    /// Directory for exported pages (defaults to the input's directory)
    #[arg(long, requires = "export")]
    pub export_dir: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// A `--stamp` argument before the image file is read
#[derive(Debug, Clone, PartialEq)]
pub struct StampArg {
    pub page: usize,
    pub image: PathBuf,
    pub x_ratio: f64,
    pub y_ratio: f64,
    pub width_ratio: f64,
    pub height_ratio: f64,
}

impl Args {
    /// Get the output path, defaulting to `<input>_compressed.pdf`
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            self.input.with_file_name(format!("{}_compressed.pdf", stem))
        })
    }

    /// Get the export directory, defaulting to the input's directory
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| {
            self.input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }

    /// File stem used for exported page names
    pub fn export_stem(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string())
    }
}

/// Parse a page list such as "0-3, 7, 5" into source indices, keeping order
pub fn parse_page_list(spec: &str) -> Result<Vec<usize>, ConfigError> {
    let mut pages = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ConfigError::InvalidPageList(format!("empty entry in '{}'", spec)));
        }

        if part.contains('-') {
            // Range: "0-3"
            let parts: Vec<&str> = part.split('-').collect();
            if parts.len() != 2 {
                return Err(ConfigError::InvalidPageList(format!("Invalid range: {}", part)));
            }

            let start: usize = parts[0]
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPageList(format!("Invalid number: {}", parts[0])))?;
            let end: usize = parts[1]
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPageList(format!("Invalid number: {}", parts[1])))?;

            if start > end {
                return Err(ConfigError::InvalidPageList(format!(
                    "Invalid range: {} > {}",
                    start, end
                )));
            }

            pages.extend(start..=end);
        } else {
            let num: usize = part
                .parse()
                .map_err(|_| ConfigError::InvalidPageList(format!("Invalid number: {}", part)))?;
            pages.push(num);
        }
    }

    Ok(pages)
}

/// Parse a size such as "3MB", "1.5 mb", "500KB" or "2048" into bytes (1024-based units)
pub fn parse_size(spec: &str) -> Result<u64, ConfigError> {
    let trimmed = spec.trim();
    let split_at = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split_at);

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSize(spec.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidSize(spec.to_string()));
    }

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        _ => return Err(ConfigError::InvalidSize(spec.to_string())),
    };

    Ok((value * multiplier as f64).round() as u64)
}

/// Parse "INDEX:DEGREES"
pub fn parse_rotation_arg(spec: &str) -> Result<(usize, Rotation), ConfigError> {
    let (index, degrees) = spec
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidRotation(format!("expected INDEX:DEGREES, got '{}'", spec)))?;
    let index: usize = index
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidRotation(format!("Invalid page index: {}", index)))?;
    let degrees: i64 = degrees
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidRotation(format!("Invalid angle: {}", degrees)))?;
    let rotation = Rotation::from_degrees(degrees).ok_or_else(|| {
        ConfigError::InvalidRotation(format!("{} is not a multiple of 90 degrees", degrees))
    })?;
    Ok((index, rotation))
}

/// Parse "INDEX:IMAGE@X,Y,W,H"
pub fn parse_stamp_arg(spec: &str) -> Result<StampArg, ConfigError> {
    let invalid = |msg: &str| ConfigError::InvalidStamp(format!("{} in '{}'", msg, spec));

    let (index, rest) = spec
        .split_once(':')
        .ok_or_else(|| invalid("expected INDEX:IMAGE@X,Y,W,H"))?;
    let page: usize = index.trim().parse().map_err(|_| invalid("invalid page index"))?;

    let (image, ratios) = rest.rsplit_once('@').ok_or_else(|| invalid("missing '@' before ratios"))?;
    if image.trim().is_empty() {
        return Err(invalid("missing image path"));
    }

    let ratios: Vec<f64> = ratios
        .split(',')
        .map(|r| r.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid("invalid ratio"))?;
    if ratios.len() != 4 || ratios.iter().any(|r| !r.is_finite()) {
        return Err(invalid("expected four ratios X,Y,W,H"));
    }

    Ok(StampArg {
        page,
        image: PathBuf::from(image.trim()),
        x_ratio: ratios[0],
        y_ratio: ratios[1],
        width_ratio: ratios[2],
        height_ratio: ratios[3],
    })
}

/// Parse "QUALITY:DPI:THRESHOLD_KB"
pub fn parse_profile(spec: &str) -> Result<CompressionProfile, ConfigError> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ConfigError::InvalidProfile(format!(
            "expected QUALITY:DPI:THRESHOLD_KB, got '{}'",
            spec
        )));
    }
    let number = |s: &str| {
        s.parse::<u64>()
            .map_err(|_| ConfigError::InvalidProfile(format!("Invalid number: {}", s)))
    };
    let quality = u8::try_from(number(parts[0])?)
        .map_err(|_| ConfigError::InvalidProfile(format!("Invalid quality: {}", parts[0])))?;
    let dpi = u32::try_from(number(parts[1])?)
        .map_err(|_| ConfigError::InvalidProfile(format!("Invalid DPI: {}", parts[1])))?;
    CompressionProfile::new(quality, dpi, number(parts[2])?)
}
