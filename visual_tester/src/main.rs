use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use pixel_lab::core_modules::utils::image_helper;
use pixel_lab::{
    FaceDetection, FaceFilter, FixedDetector, ParallelPipeline, PipelineConfig, ViewImage, latest_slot,
    spawn_detector_loop,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Renders every view of the pixel pipeline for one still image.
#[derive(Parser, Debug)]
#[command(name = "visual_tester", version, about)]
struct Args {
    /// Image to treat as the captured frame.
    input: PathBuf,

    /// Directory that receives one PNG per view.
    output_dir: PathBuf,

    /// JSON file with pipeline parameters.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Face box in detector coordinates, as `x,y,width,height`. Repeatable.
    #[arg(long = "face", value_parser = parse_face)]
    faces: Vec<FaceDetection>,

    /// Overrides the single-face filter from the config.
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,

    /// Skip face detection entirely.
    #[arg(long)]
    no_faces: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    None,
    Grayscale,
    Blur,
    Hsv,
    Pixelate,
}

impl From<FilterArg> for FaceFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::None => FaceFilter::None,
            FilterArg::Grayscale => FaceFilter::Grayscale,
            FilterArg::Blur => FaceFilter::Blur,
            FilterArg::Hsv => FaceFilter::Hsv,
            FilterArg::Pixelate => FaceFilter::Pixelate,
        }
    }
}

fn parse_face(s: &str) -> std::result::Result<FaceDetection, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("`{p}`: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        &[x, y, width, height] => Ok(FaceDetection::new(x, y, width, height)),
        _ => Err(format!("expected x,y,width,height, got `{s}`")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = Args::parse();

    // --- 1. Configuration ---
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(filter) = args.filter {
        config.face_filter = filter.into();
    }
    if args.no_faces {
        config.face_detection_enabled = false;
    }

    // --- 2. Capture ---
    // The still image stands in for a camera frame at detector resolution.
    let capture = image_helper::load(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?
        .resize(config.detector_width, config.detector_height)?;
    info!(
        width = capture.width(),
        height = capture.height(),
        "capture frame ready"
    );

    // --- 3. Face Detection ---
    let (frame_tx, frame_rx) = watch::channel(None);
    let (_enabled_tx, enabled_rx) = watch::channel(config.face_detection_enabled);
    let (publisher, reader) = latest_slot();
    let detector = spawn_detector_loop(FixedDetector::new(args.faces), frame_rx, enabled_rx, publisher);
    frame_tx.send_replace(Some(Arc::new(capture.clone())));
    drop(frame_tx);
    detector.await.context("face detector task panicked")?;
    info!(faces = reader.latest().len(), "face detection finished");

    // --- 4. Pipeline ---
    let pipeline = ParallelPipeline::new(config)?.with_detections(reader);
    info!(workers = pipeline.worker_count(), "rendering views");
    let report = pipeline.process_capture(&capture).await?;

    // --- 5. Output ---
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let mut written = 0;
    for (view, result) in &report.views {
        match result {
            Ok(ViewImage::Rendered(buffer)) => {
                let path = args.output_dir.join(format!("{}.png", view.slug()));
                image_helper::save_png(&path, buffer)
                    .with_context(|| format!("writing {}", path.display()))?;
                written += 1;
            }
            Ok(ViewImage::Blank) => info!(view = %view.caption(pipeline.config()), "nothing to show"),
            Err(err) => warn!(view = %view.caption(pipeline.config()), error = %err, "view failed"),
        }
    }

    if written == 0 {
        bail!("no view rendered for {}", args.input.display());
    }
    info!(
        written,
        failures = report.failures(),
        output = %args.output_dir.display(),
        "processing complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_boxes_parse_from_four_numbers() {
        let face = parse_face("10, 20.5,30,40").unwrap();
        assert_eq!(face, FaceDetection::new(10.0, 20.5, 30.0, 40.0));
        assert!(parse_face("1,2,3").is_err());
        assert!(parse_face("a,b,c,d").is_err());
    }

    #[test]
    fn cli_collects_repeated_faces() {
        let args = Args::try_parse_from([
            "visual_tester",
            "in.png",
            "out",
            "--face",
            "0,0,10,10",
            "--face",
            "20,20,10,10",
            "--filter",
            "pixelate",
        ])
        .unwrap();
        assert_eq!(args.faces.len(), 2);
        assert!(matches!(args.filter, Some(FilterArg::Pixelate)));
        assert!(!args.no_faces);
    }
}
