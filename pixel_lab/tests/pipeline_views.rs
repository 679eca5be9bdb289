use pixel_lab::core_modules::color_space::rgb_to_hsv;
use pixel_lab::core_modules::pixel_buffer::Rgba;
use pixel_lab::{
    FaceDetection, FaceFilter, FixedDetector, ParallelPipeline, PipelineConfig, PixelBuffer, Region, View,
    ViewImage, VisionPipeline, latest_slot, spawn_detector_loop,
};
use std::sync::Arc;
use tokio::sync::watch;

const RED: Rgba = [255, 0, 0, 255];
const GREEN: Rgba = [0, 255, 0, 255];
const BLUE: Rgba = [0, 0, 255, 255];
const GREY: Rgba = [60, 60, 60, 255];

fn paint(buffer: PixelBuffer, patches: &[(Region, Rgba)]) -> PixelBuffer {
    let (width, height) = buffer.dimensions();
    let mut data = buffer.into_bytes();
    for (region, color) in patches {
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let i = ((y * width + x) * 4) as usize;
                data[i..i + 4].copy_from_slice(color);
            }
        }
    }
    PixelBuffer::new(width, height, data).unwrap()
}

fn uniform(region: &Region, buffer: &PixelBuffer, color: Rgba) -> bool {
    (region.y..region.y + region.height)
        .all(|y| (region.x..region.x + region.width).all(|x| buffer.pixel(x, y) == Some(color)))
}

/// Region in a 160x120 base, and the same box in 640x480 detector space.
fn face(x: u32, y: u32, size: u32) -> (Region, FaceDetection) {
    (
        Region::new(x, y, size, size),
        FaceDetection::new((x * 4) as f32, (y * 4) as f32, (size * 4) as f32, (size * 4) as f32),
    )
}

fn rendered(result: &pixel_lab::Result<ViewImage>) -> &PixelBuffer {
    match result {
        Ok(ViewImage::Rendered(buffer)) => buffer,
        other => panic!("expected a rendered view, got {other:?}"),
    }
}

#[test]
fn two_faces_trade_places() {
    let (a, det_a) = face(10, 10, 20);
    let (b, det_b) = face(100, 60, 20);
    let base = paint(PixelBuffer::filled(160, 120, GREY).unwrap(), &[(a, RED), (b, BLUE)]);

    let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();
    let out = pipeline.render(View::Face, &base, &[det_a, det_b]).unwrap();
    let out = out.buffer().unwrap();

    assert!(uniform(&a, out, BLUE));
    assert!(uniform(&b, out, RED));
    assert_eq!(out.pixel(60, 40), Some(GREY));
}

#[test]
fn three_faces_rotate_cyclically() {
    let (a, det_a) = face(5, 5, 16);
    let (b, det_b) = face(60, 40, 16);
    let (c, det_c) = face(120, 90, 16);
    let base = paint(
        PixelBuffer::filled(160, 120, GREY).unwrap(),
        &[(a, RED), (b, GREEN), (c, BLUE)],
    );

    let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();
    let out = pipeline.render(View::Face, &base, &[det_a, det_b, det_c]).unwrap();
    let out = out.buffer().unwrap();

    // Face i lands in region (i + 1) mod 3.
    assert!(uniform(&b, out, RED));
    assert!(uniform(&c, out, GREEN));
    assert!(uniform(&a, out, BLUE));
}

#[test]
fn single_face_fills_the_cell_with_the_chosen_filter() {
    let (a, det_a) = face(40, 30, 30);
    let base = paint(PixelBuffer::filled(160, 120, GREY).unwrap(), &[(a, [200, 100, 0, 255])]);
    let config = PipelineConfig {
        face_filter: FaceFilter::Grayscale,
        ..PipelineConfig::default()
    };
    let pipeline = VisionPipeline::new(config).unwrap();

    let out = pipeline.render(View::Face, &base, &[det_a]).unwrap();
    let out = out.buffer().unwrap();
    assert_eq!(out.dimensions(), (160, 120));
    assert!(out.pixels().all(|p| p == [100, 100, 100, 255]));
}

#[test]
fn pixelate_filter_is_wired_through_the_config() {
    let (a, det_a) = face(40, 30, 30);
    let left = Region::new(40, 30, 15, 30);
    let base = paint(
        PixelBuffer::filled(160, 120, GREY).unwrap(),
        &[(a, [0, 0, 0, 255]), (left, [240, 240, 240, 255])],
    );
    let config = PipelineConfig {
        face_filter: FaceFilter::Pixelate,
        ..PipelineConfig::default()
    };
    let pipeline = VisionPipeline::new(config).unwrap();

    let out = pipeline.render(View::Face, &base, &[det_a]).unwrap();
    let out = out.buffer().unwrap();
    assert_eq!(out.dimensions(), (160, 120));
    assert_eq!(out.pixel(0, 0), Some([240, 240, 240, 255]));
    assert_eq!(out.pixel(159, 119), Some([0, 0, 0, 255]));
    // The upscaled edge is soft, yet every 5x5 block is a single gray level.
    for y in 0..120 {
        for x in 0..160 {
            let p = out.pixel(x, y).unwrap();
            assert_eq!(Some(p), out.pixel(x - x % 5, y - y % 5), "({x}, {y})");
            assert!(p[0] == p[1] && p[1] == p[2]);
        }
    }
}

#[test]
fn hsv_filter_recolours_the_single_face() {
    let (a, det_a) = face(40, 30, 30);
    let base = paint(PixelBuffer::filled(160, 120, GREY).unwrap(), &[(a, [200, 100, 50, 255])]);
    let config = PipelineConfig {
        face_filter: FaceFilter::Hsv,
        ..PipelineConfig::default()
    };
    let pipeline = VisionPipeline::new(config).unwrap();

    let out = pipeline.render(View::Face, &base, &[det_a]).unwrap();
    let expected = rgb_to_hsv(200, 100, 50).to_rgba();
    assert!(out.buffer().unwrap().pixels().all(|p| p == expected));
}

#[test]
fn low_confidence_faces_stay_hidden() {
    let (a, det_a) = face(10, 10, 20);
    let (b, det_b) = face(100, 60, 20);
    let base = paint(PixelBuffer::filled(160, 120, GREY).unwrap(), &[(a, RED), (b, BLUE)]);
    let weak_b = FaceDetection { confidence: 0.2, ..det_b };

    let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();
    // Only one face survives, so this is the single-face view of A, not a swap.
    let out = pipeline.render(View::Face, &base, &[det_a, weak_b]).unwrap();
    assert!(out.buffer().unwrap().pixels().all(|p| p == RED));
}

#[test]
fn face_view_on_a_larger_base_uses_its_own_scale() {
    let region = Region::new(20, 20, 40, 40);
    let base = paint(PixelBuffer::filled(320, 240, GREY).unwrap(), &[(region, GREEN)]);
    let detection = FaceDetection::new(40.0, 40.0, 80.0, 80.0);

    let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();
    let out = pipeline.render(View::Face, &base, &[detection]).unwrap();
    assert!(out.buffer().unwrap().pixels().all(|p| p == GREEN));
}

#[test]
fn views_follow_their_alpha_contracts() {
    let base = PixelBuffer::filled(160, 120, [120, 80, 40, 100]).unwrap();
    let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline.render_all(&base, &[]);
    assert_eq!(report.failures(), 0);

    let alpha_at = |view: View, x: u32, y: u32| rendered(report.get(view).unwrap()).pixel(x, y).unwrap()[3];

    for view in [View::Webcam, View::GrayBright, View::Red, View::Green, View::Blue] {
        assert_eq!(alpha_at(view, 50, 50), 100, "{view:?}");
    }
    for view in [
        View::RedThreshold,
        View::HsvThreshold,
        View::Hsv,
        View::YCbCr,
        View::Lab,
        View::Otsu,
    ] {
        assert_eq!(alpha_at(view, 50, 50), 255, "{view:?}");
    }
    for view in [View::Sobel, View::Morphology] {
        assert_eq!(alpha_at(view, 50, 50), 255, "{view:?}");
        assert_eq!(alpha_at(view, 0, 0), 0, "{view:?}");
        assert_eq!(alpha_at(view, 159, 119), 0, "{view:?}");
    }
}

#[test]
fn otsu_view_splits_dark_and_bright_halves() {
    let mut data = Vec::with_capacity(160 * 120 * 4);
    for _y in 0..120u32 {
        for x in 0..160u32 {
            let v = if x < 80 { 20 + (x % 5) as u8 } else { 180 + (x % 5) as u8 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let base = PixelBuffer::new(160, 120, data).unwrap();
    let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();

    let out = pipeline.render(View::Otsu, &base, &[]).unwrap();
    let out = out.buffer().unwrap();
    for y in 0..120 {
        assert_eq!(out.pixel(0, y), Some([0, 0, 0, 255]));
        for x in 80..160 {
            assert_eq!(out.pixel(x, y), Some([255, 255, 255, 255]));
        }
    }
}

#[test]
fn config_loads_from_a_json_file() {
    let path = std::env::temp_dir().join(format!("pixel_lab_config_{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "red_threshold": 40, "face_filter": "blur", "morph_iterations": 2 }"#).unwrap();
    let config = PipelineConfig::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.red_threshold, 40);
    assert_eq!(config.face_filter, FaceFilter::Blur);
    assert_eq!(config.morph_iterations, 2);
    assert_eq!(config.cell_width, 160);
}

#[test]
fn config_file_with_bad_values_is_rejected() {
    let path = std::env::temp_dir().join(format!("pixel_lab_bad_config_{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "cell_height": 0 }"#).unwrap();
    let result = PipelineConfig::from_json_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(pixel_lab::PipelineError::InvalidConfig(_))));
}

#[tokio::test]
async fn detector_loop_feeds_the_parallel_pipeline() {
    let (a, det_a) = face(10, 10, 20);
    let (b, det_b) = face(100, 60, 20);
    let base = paint(PixelBuffer::filled(160, 120, GREY).unwrap(), &[(a, RED), (b, BLUE)]);
    let capture = base.resize(640, 480).unwrap();

    let (frame_tx, frame_rx) = watch::channel(None);
    let (_enabled_tx, enabled_rx) = watch::channel(true);
    let (publisher, mut reader) = latest_slot();
    let detector = spawn_detector_loop(
        FixedDetector::new(vec![det_a, det_b]),
        frame_rx,
        enabled_rx,
        publisher,
    );
    frame_tx.send_replace(Some(Arc::new(capture)));
    assert!(reader.changed().await);

    let pipeline = ParallelPipeline::with_workers(PipelineConfig::default(), 2).unwrap();
    let report = pipeline.process_frame(Arc::new(base), reader.latest()).await;
    let swapped = rendered(report.get(View::Face).unwrap());
    assert!(uniform(&a, swapped, BLUE));
    assert!(uniform(&b, swapped, RED));

    // Outlines are drawn in red over the untouched base.
    let outline = rendered(report.get(View::FaceOutline).unwrap());
    assert_eq!(outline.pixel(100, 60), Some(RED));
    assert_eq!(outline.pixel(119, 79), Some(RED));
    assert_eq!(outline.pixel(110, 70), Some(BLUE));
    assert_eq!(outline.pixel(60, 40), Some(GREY));

    drop(frame_tx);
    detector.await.unwrap();
}
