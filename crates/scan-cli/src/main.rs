//! CLI распознавания QR-кодов и штрих-кодов
//!
//! Режимы: одно изображение (--input) или пакетная обработка каталога
//! (--batch --input-dir). Результаты накапливаются и выгружаются в CSV
//! или JSON; визуализации сохраняются отдельными файлами.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use indicatif::ProgressBar;
use scan_core::report::{get_image_files, save_results_csv, save_results_json};
use scan_core::visualization::{create_output_filename, save_visualization};
use scan_core::{
    AppConfig, CodeScanner, DetectionRecord, DetectionType, ScanError, Visualizer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Qr,
    Barcode,
    Auto,
}

impl From<Mode> for DetectionType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Qr => DetectionType::Qr,
            Mode::Barcode => DetectionType::Barcode,
            Mode::Auto => DetectionType::Auto,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "code-scan",
    about = "QR Code and Barcode Detection & Decoding System",
    group(ArgGroup::new("mode").required(true).args(["input", "batch"]))
)]
struct Args {
    /// Input image path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Batch mode
    #[arg(short, long)]
    batch: bool,

    /// Input directory for batch mode
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Detection type
    #[arg(short = 't', long = "type", value_enum, default_value_t = Mode::Auto)]
    detection_type: Mode,

    /// Output file (.json selects JSON, anything else CSV)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output directory for visualizations
    #[arg(long, default_value = "outputs/visualizations")]
    output_dir: PathBuf,

    /// Enable visualization
    #[arg(short, long)]
    visualize: bool,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Конфигурация обязательна: без неё процесс не стартует
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    let filter = if args.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::new().parse_filters(filter).init();

    log::info!("Initializing detectors...");
    let scanner = CodeScanner::new(&config);
    let visualizer = if args.visualize {
        Some(Visualizer::new(config.visualization.clone()))
    } else {
        None
    };
    let detection_type = DetectionType::from(args.detection_type);

    let mut all_results: Vec<DetectionRecord> = Vec::new();

    if args.batch {
        let Some(input_dir) = &args.input_dir else {
            bail!("--input-dir is required for batch processing");
        };
        run_batch(
            &scanner,
            visualizer.as_ref(),
            input_dir,
            detection_type,
            &args.output_dir,
            &mut all_results,
        );
    } else if let Some(input) = &args.input {
        run_single(
            &scanner,
            visualizer.as_ref(),
            input,
            detection_type,
            &args.output_dir,
            &mut all_results,
        )?;
    }

    if let Some(output) = &args.output {
        if !all_results.is_empty() {
            let is_json = output
                .extension()
                .map(|ext| ext == "json")
                .unwrap_or(false);
            if is_json {
                save_results_json(&all_results, output)?;
            } else {
                save_results_csv(&all_results, output)?;
            }
            log::info!("Results saved to: {}", output.display());
        }
    }

    Ok(())
}

/// Пакетная обработка каталога
///
/// Ошибка одного изображения не прерывает пакет: нечитаемые изображения
/// считаются обработанными без детекций, прочие сбои только логируются.
fn run_batch(
    scanner: &CodeScanner,
    visualizer: Option<&Visualizer>,
    input_dir: &Path,
    detection_type: DetectionType,
    output_dir: &Path,
    all_results: &mut Vec<DetectionRecord>,
) {
    log::info!("Starting batch processing: {}", input_dir.display());
    let image_files = get_image_files(input_dir);
    log::info!("Found {} images", image_files.len());

    let mut processed_count = 0usize;
    let mut detected_count = 0usize;

    let progress = ProgressBar::new(image_files.len() as u64);
    for image_path in &image_files {
        match process_image(scanner, visualizer, image_path, detection_type, output_dir, false) {
            Ok(results) => {
                processed_count += 1;
                if !results.is_empty() {
                    detected_count += 1;
                    all_results.extend(results);
                }
            }
            Err(ScanError::ImageLoad(reason)) => {
                log::warn!("Skipping unreadable image: {}", reason);
                processed_count += 1;
            }
            Err(e) => {
                log::error!("Error processing {}: {}", image_path.display(), e);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    log::info!("Processed {} images", processed_count);
    log::info!("Detected codes in {} images", detected_count);
    log::info!("Total objects found: {}", all_results.len());
}

/// Обработка одного изображения с выводом найденного
fn run_single(
    scanner: &CodeScanner,
    visualizer: Option<&Visualizer>,
    input: &Path,
    detection_type: DetectionType,
    output_dir: &Path,
    all_results: &mut Vec<DetectionRecord>,
) -> Result<()> {
    log::info!("Processing single image: {}", input.display());

    let results = process_image(scanner, visualizer, input, detection_type, output_dir, true)
        .with_context(|| format!("error processing {}", input.display()))?;

    if results.is_empty() {
        log::info!("No codes found.");
    } else {
        log::info!("Found {} objects:", results.len());
        for record in &results {
            log::info!(
                "  [{}] Data: {} | Bbox: {:?}",
                record.kind.as_str().to_uppercase(),
                record.payload.as_deref().unwrap_or("N/A"),
                record.bbox
            );
        }
    }

    all_results.extend(results);
    Ok(())
}

/// Загрузка, сканирование и (опционально) визуализация одного изображения
fn process_image(
    scanner: &CodeScanner,
    visualizer: Option<&Visualizer>,
    image_path: &Path,
    detection_type: DetectionType,
    output_dir: &Path,
    visualize_empty: bool,
) -> Result<Vec<DetectionRecord>, ScanError> {
    let image = image::open(image_path)
        .map_err(|e| ScanError::ImageLoad(format!("{}: {}", image_path.display(), e)))?;

    let results = scanner.scan_image(&image, image_path, detection_type);

    if let Some(viz) = visualizer {
        if !results.is_empty() || visualize_empty {
            let canvas = viz.draw_detections(&image, &results);
            let output_name = create_output_filename(image_path, output_dir);
            save_visualization(&canvas, &output_name)?;
            log::info!("Visualization saved to: {}", output_name.display());
        }
    }

    Ok(results)
}
