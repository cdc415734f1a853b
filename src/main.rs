use anyhow::Context;
use cardcrop::{CardDetector, DetectionConfig, RawImage, ThresholdPolicy};
use clap::Parser;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cardcrop")]
#[command(about = "Detect and crop the playing cards laid out in a photo")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Write one PNG per detected card into this directory
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// JSON file overriding detection defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Use a fixed binarization threshold instead of Otsu
    #[arg(long, value_name = "LEVEL")]
    fixed_threshold: Option<u8>,

    /// Skip the local contrast equalization
    #[arg(long)]
    no_local_contrast: bool,

    /// Do not retry on a rotated image when nothing is found
    #[arg(long)]
    no_retry: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Decode the file and keep its EXIF orientation for the detector
fn load_image(path: &Path) -> anyhow::Result<RawImage> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .with_context(|| format!("Failed to open decoder for {}", path.display()))?;
    let orientation = decoder.orientation()?;
    let image = DynamicImage::from_decoder(decoder)
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;

    Ok(RawImage::new(image).with_orientation(orientation))
}

fn load_config(args: &Cli) -> anyhow::Result<DetectionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            DetectionConfig::from_json(&json)?
        }
        None => DetectionConfig::default(),
    };

    if let Some(level) = args.fixed_threshold {
        config.threshold = ThresholdPolicy::Fixed(level);
    }
    if args.no_local_contrast {
        config.local_contrast = false;
    }
    if args.no_retry {
        config.rotate_retry = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let raw = load_image(&args.image_path)?;
    tracing::info!(
        path = %args.image_path.display(),
        width = raw.width(),
        height = raw.height(),
        orientation = ?raw.orientation,
        "Image loaded"
    );

    let config = load_config(&args)?;
    let mut detector = CardDetector::new(config);
    if let Some(debug_dir) = args.debug_out.clone() {
        detector = detector.with_debug(debug_dir)?;
    }

    let detection = detector.detect(&raw).await?;

    println!("\n=== Card Detection Results ===");
    println!("Total cards: {}", detection.crops.len());
    if detection.rotated {
        println!("Found after rotating the image by 90°");
    }

    if detection.crops.is_empty() {
        println!("No cards detected.");
    } else {
        for crop in &detection.crops {
            let b = crop.bounds;
            println!("  Card {:2} at ({}, {}) {}x{}", crop.ordinal, b.x, b.y, b.width, b.height);
        }
    }

    if let Some(out_dir) = &args.out_dir {
        std::fs::create_dir_all(out_dir)?;
        for crop in &detection.crops {
            let path = out_dir.join(format!("card_{:02}.png", crop.ordinal));
            crop.image.save(&path)
                .map_err(|e| anyhow::anyhow!("Failed to save {}: {}", path.display(), e))?;
        }
        println!("Saved {} crops to {}", detection.crops.len(), out_dir.display());
    }

    println!(
        "\nTimings: init {:.1} ms, detect {:.1} ms ({} pass{})",
        detection.timings.init.as_secs_f64() * 1000.0,
        detection.timings.detect.as_secs_f64() * 1000.0,
        detection.attempts,
        if detection.attempts == 1 { "" } else { "es" }
    );

    Ok(())
}
