use image::{Rgb, RgbImage};

use canopy::app::config::{OfflineConfig, TilingConfig};
use canopy::pipeline::{
    detect_trees, process_large_image, Detection, Detections, ProcessingMethod, TreeModel,
};
use canopy::Error;

fn tiling() -> TilingConfig {
    TilingConfig {
        tile_size: 1024,
        overlap: 100,
        min_extent: 100,
        max_single_pass: 2048,
    }
}

fn offline() -> OfflineConfig {
    OfflineConfig {
        tile_size: 512,
        overlap: 100,
        min_extent: 100,
    }
}

/// Deterministic stand-in for the detector: reports one box spanning all
/// bright pixels in the frame it is given, in that frame's own pixel
/// space.
struct BrightSpotModel;

impl TreeModel for BrightSpotModel {
    fn infer(&mut self, image: &RgbImage, _confidence: f32, _iou: f32) -> canopy::Result<Detections> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[0] > 200 {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
                });
            }
        }
        Ok(match bounds {
            None => vec![],
            Some((x1, y1, x2, y2)) => vec![Detection {
                bbox: [x1 as f32, y1 as f32, (x2 + 1) as f32, (y2 + 1) as f32],
                score: 0.9,
                class: "tree".to_string(),
            }],
        })
    }
}

/// Fails on the nth inference call, succeeds (empty) otherwise.
struct FailNthModel {
    calls: usize,
    fail_at: usize,
}

impl TreeModel for FailNthModel {
    fn infer(&mut self, _image: &RgbImage, _confidence: f32, _iou: f32) -> canopy::Result<Detections> {
        self.calls += 1;
        if self.calls == self.fail_at {
            Err(Error::Inference("interpreter invoke failed".to_string()))
        } else {
            Ok(vec![])
        }
    }
}

fn image_with_spot(width: u32, height: u32, x1: u32, y1: u32, x2: u32, y2: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for y in y1..y2 {
        for x in x1..x2 {
            image.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    image
}

#[test]
fn small_image_runs_single_pass() {
    let image = image_with_spot(600, 400, 100, 100, 140, 140);
    let outcome =
        detect_trees(&mut BrightSpotModel, &image, &tiling(), 0.2, 0.45, false).unwrap();

    assert_eq!(outcome.method, ProcessingMethod::Single);
    assert_eq!(outcome.tiles_processed, None);
    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].bbox, [100.0, 100.0, 140.0, 140.0]);
}

#[test]
fn force_flag_tiles_a_small_image() {
    let image = image_with_spot(600, 400, 100, 100, 140, 140);
    let outcome = detect_trees(&mut BrightSpotModel, &image, &tiling(), 0.2, 0.45, true).unwrap();
    assert_eq!(outcome.method, ProcessingMethod::Tiled);
    assert_eq!(outcome.tiles_processed, Some(1));
    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].bbox, [100.0, 100.0, 140.0, 140.0]);
}

#[test]
fn object_inside_one_tile_is_reported_once_at_true_position() {
    // 3000x3000 forces tiling; the spot sits wholly inside the tile at
    // (924, 924) and inside no other tile's extent
    let image = image_with_spot(3000, 3000, 1500, 1500, 1560, 1560);
    let outcome =
        detect_trees(&mut BrightSpotModel, &image, &tiling(), 0.2, 0.45, false).unwrap();

    assert_eq!(outcome.method, ProcessingMethod::Tiled);
    assert_eq!(outcome.tiles_processed, Some(16));
    assert_eq!(outcome.detections.len(), 1);

    let expected = [1500.0, 1500.0, 1560.0, 1560.0];
    for (got, want) in outcome.detections[0].bbox.iter().zip(expected.iter()) {
        assert!((got - want).abs() <= 2.0, "got {got}, want {want}");
    }
}

#[test]
fn pipeline_is_idempotent_under_a_deterministic_model() {
    let image = image_with_spot(3000, 3000, 1500, 1500, 1560, 1560);
    let first =
        detect_trees(&mut BrightSpotModel, &image, &tiling(), 0.2, 0.45, false).unwrap();
    let second =
        detect_trees(&mut BrightSpotModel, &image, &tiling(), 0.2, 0.45, false).unwrap();

    assert_eq!(first.detections, second.detections);
    assert_eq!(first.tiles_processed, second.tiles_processed);
}

#[test]
fn server_path_fails_whole_request_on_tile_error() {
    let image = RgbImage::new(3000, 3000);
    let mut model = FailNthModel { calls: 0, fail_at: 3 };
    let result = detect_trees(&mut model, &image, &tiling(), 0.2, 0.45, false);
    assert!(matches!(result, Err(Error::Inference(_))));
}

#[test]
fn offline_path_records_tile_failure_and_continues() {
    let image = RgbImage::new(2000, 2000);
    let mut model = FailNthModel { calls: 0, fail_at: 3 };
    let report = process_large_image(&mut model, &image, &offline(), 0.25, 0.45).unwrap();

    // 2000px with 512px tiles stepping 412: positions 0,412,824,1236,1648
    assert_eq!(report.tiles_processed + report.tiles_failed, 25);
    assert_eq!(report.tiles_failed, 1);
    assert_eq!(report.total_tree_count, 0);
}

#[test]
fn offline_path_errors_when_no_tiles_survive() {
    // below min_extent in both dimensions: every candidate tile is skipped
    let image = RgbImage::new(80, 80);
    let result = process_large_image(&mut BrightSpotModel, &image, &offline(), 0.25, 0.45);
    assert!(matches!(result, Err(Error::InvalidImage(_))));
}

#[test]
fn zero_dimension_image_is_rejected() {
    let image = RgbImage::new(0, 0);
    let result = detect_trees(&mut BrightSpotModel, &image, &tiling(), 0.2, 0.45, false);
    assert!(matches!(result, Err(Error::InvalidImage(_))));
}
