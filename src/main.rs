use clap::{Parser, ValueEnum};
use image::ImageReader;
use std::path::PathBuf;
use tracing::Level;

use barscan::{
    DetectionBox, FrameReport, FullFrame, MultiFormatDecoder, Pipeline, PipelineConfig,
    QrDecoder, RegionDetector, StaticBoxes,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DecoderKind {
    /// Linear and matrix symbologies
    Multi,
    /// QR codes only
    Qr,
}

#[derive(Parser)]
#[command(name = "barscan")]
#[command(about = "Decode rotated or low-contrast barcodes in an image")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Region to decode as xmin,ymin,xmax,ymax (repeatable; default: whole image)
    #[arg(long = "bbox", value_name = "BOX", value_parser = parse_bbox)]
    boxes: Vec<DetectionBox>,

    /// Symbol decoder to run
    #[arg(long, value_enum, default_value_t = DecoderKind::Multi)]
    decoder: DecoderKind,

    /// Pipeline settings as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

fn parse_bbox(value: &str) -> Result<DetectionBox, String> {
    let coords: Vec<u32> = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in {value:?}: {e}"))?;
    match coords.as_slice() {
        &[xmin, ymin, xmax, ymax] if xmin < xmax && ymin < ymax => {
            Ok(DetectionBox::new(xmin, ymin, xmax, ymax))
        }
        &[_, _, _, _] => Err(format!("box {value:?} has no area")),
        _ => Err(format!("expected xmin,ymin,xmax,ymax, got {value:?}")),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(path = %args.image_path.display(), "loading image");
    let img = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    tracing::debug!(width = img.width(), height = img.height(), "image loaded");

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let pipeline = match args.decoder {
        DecoderKind::Multi => Pipeline::new(MultiFormatDecoder::new()),
        DecoderKind::Qr => Pipeline::new(QrDecoder::new()),
    };
    let mut pipeline = pipeline.with_config(config)?;
    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let detector: Box<dyn RegionDetector> = if args.boxes.is_empty() {
        Box::new(FullFrame)
    } else {
        Box::new(StaticBoxes(args.boxes))
    };
    let boxes = detector.detect(&img);

    let results = pipeline.process_frame(&img, &boxes)?;
    let report = FrameReport::from_results(&results);
    tracing::info!(
        detections = report.detections.len(),
        barcodes = report.barcodes.len(),
        "frame processed"
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_argument_parsing() {
        assert_eq!(parse_bbox("1, 2,30,40"), Ok(DetectionBox::new(1, 2, 30, 40)));
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("5,5,5,9").is_err());
        assert!(parse_bbox("a,2,3,4").is_err());
    }

    #[test]
    fn multi_format_decoder_is_the_default() {
        let cli = Cli::try_parse_from(["barscan", "shelf.jpg"]).unwrap();
        assert_eq!(cli.decoder, DecoderKind::Multi);

        let cli = Cli::try_parse_from(["barscan", "shelf.jpg", "--decoder", "qr"]).unwrap();
        assert_eq!(cli.decoder, DecoderKind::Qr);
    }
}
