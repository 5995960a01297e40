//! ocr-reading-order - command-line front end
//!
//! Reads detection files saved from an OCR engine, rebuilds right-to-left
//! reading order, and prints the text. With a single input and `--image`,
//! falls back to an image caption when no text survives.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ocr_reading_order::batch;
use ocr_reading_order::config::{self, AppConfig};
use ocr_reading_order::vision::{CaptionError, DetectionFileProvider, OllamaCaptioner, TextSource};
use ocr_reading_order::{ImageTextExtractor, ReadingOrderReconstructor, ReadingOutcome};

/// Exit status when an input could not be read
const EXIT_ERROR: u8 = 1;

/// Exit status when no text survived and no fallback produced one
const EXIT_NO_TEXT: u8 = 2;

/// Rebuild right-to-left reading order from OCR detections
#[derive(Parser, Debug)]
#[command(name = "ocr-reading-order")]
#[command(about = "Reconstruct right-to-left, top-to-bottom text from raw OCR detections")]
struct Args {
    /// Detection files (JSON arrays of EasyOCR-style results)
    #[arg(required_unless_present = "write_default_config")]
    detections: Vec<PathBuf>,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image to caption when no text survives (single input only)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Never call the captioning service
    #[arg(long)]
    no_fallback: bool,

    /// Print one JSON object per input
    #[arg(long)]
    json: bool,

    /// Write the default configuration file and exit
    #[arg(long)]
    write_default_config: bool,
}

/// JSON line emitted per input
#[derive(Serialize)]
struct Report<'a> {
    file: &'a Path,
    source: Option<TextSource>,
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<ExitCode> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if args.write_default_config {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => config::default_config_path()?,
        };
        config::save_config(&AppConfig::default(), &path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_or_create_config(args.config.as_deref())?;

    if args.image.is_some() && args.detections.len() > 1 {
        anyhow::bail!("--image can only be used with a single detection file");
    }

    if args.detections.len() == 1 {
        run_single(&args, config)
    } else {
        run_batch(&args, config)
    }
}

/// Load configuration from the given file, the default location, or defaults
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(path) = config::default_config_path() {
        if path.exists() {
            let config = config::load_config(&path)?;
            info!("Loaded configuration from {:?}", path);
            return Ok(config);
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// One detection file, with the captioning fallback when an image is given
fn run_single(args: &Args, config: AppConfig) -> Result<ExitCode> {
    let path = &args.detections[0];
    let reconstructor = ReadingOrderReconstructor::new(config.reading);
    let mut extractor = ImageTextExtractor::new(reconstructor, DetectionFileProvider::new(path));

    let image = match &args.image {
        Some(image_path) => std::fs::read(image_path)
            .with_context(|| format!("Failed to read image {:?}", image_path))?,
        None => Vec::new(),
    };

    if args.no_fallback || !config.caption.enabled {
        info!("Captioning fallback disabled");
    } else if args.image.is_none() {
        info!("No image given, captioning fallback unavailable");
    } else {
        extractor = extractor.with_captioner(OllamaCaptioner::from_settings(&config.caption));
    }

    match extractor.extract(&image) {
        Ok(extracted) => {
            emit(args, path, Some(extracted.source), Some(&extracted.text), None)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if matches!(e.downcast_ref::<CaptionError>(), Some(CaptionError::Disabled)) => {
            warn!("No text extracted from {:?}", path);
            emit(args, path, None, None, None)?;
            Ok(ExitCode::from(EXIT_NO_TEXT))
        }
        Err(e) => Err(e),
    }
}

/// Many detection files reconstructed in parallel, without fallback
fn run_batch(args: &Args, config: AppConfig) -> Result<ExitCode> {
    let reconstructor = ReadingOrderReconstructor::new(config.reading);
    let results = batch::reconstruct_files(&reconstructor, &args.detections, config.batch.workers);

    let mut missing = 0;
    let mut failed = 0;
    for (path, result) in args.detections.iter().zip(&results) {
        match result {
            Ok(ReadingOutcome::Text(text)) => emit(args, path, Some(TextSource::Ocr), Some(text), None)?,
            Ok(ReadingOutcome::NoText) => {
                missing += 1;
                emit(args, path, None, None, None)?;
            }
            Err(e) => {
                failed += 1;
                emit(args, path, None, None, Some(format!("{:#}", e)))?;
            }
        }
    }

    info!(
        "{} of {} inputs produced text, {} failed",
        results.len() - missing - failed,
        results.len(),
        failed
    );

    if failed > 0 {
        Ok(ExitCode::from(EXIT_ERROR))
    } else if missing > 0 {
        Ok(ExitCode::from(EXIT_NO_TEXT))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn emit(
    args: &Args,
    file: &Path,
    source: Option<TextSource>,
    text: Option<&str>,
    error: Option<String>,
) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string(&Report { file, source, text, error })?);
        return Ok(());
    }

    let body = match (&error, text) {
        (Some(_), _) => Some("(error)"),
        (None, text) => text,
    };
    if let Some(output) = render_plain(file, body, args.detections.len() > 1) {
        println!("{}", output);
    }
    Ok(())
}

/// Plain-text output for one input; a lone input without text prints nothing
fn render_plain(file: &Path, body: Option<&str>, multi: bool) -> Option<String> {
    if !multi {
        return body.map(str::to_string);
    }
    Some(format!("==> {} <==\n{}", file.display(), body.unwrap_or("(no text)")))
}
