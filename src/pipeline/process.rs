use image::RgbImage;

use crate::app::config::TilingConfig;
use crate::error::{Error, Result};
use crate::pipeline::{
    choose_method, merge_tile_detections, tile_grid, Detections, ProcessingMethod, TreeModel,
};

pub struct PipelineOutcome {
    pub detections: Detections,
    pub method: ProcessingMethod,
    pub tiles_processed: Option<usize>,
}

/// Runs the synchronous detection pipeline: route on size, then either a
/// single inference pass or the tile loop plus merge. Any per-tile
/// inference error fails the whole request; partial results are never
/// returned from this path.
pub fn detect_trees(
    model: &mut dyn TreeModel,
    image: &RgbImage,
    tiling: &TilingConfig,
    confidence: f32,
    iou: f32,
    force_tiling: bool,
) -> Result<PipelineOutcome> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::InvalidImage("zero-dimension image".to_string()));
    }

    let method = choose_method(width, height, force_tiling, tiling.max_single_pass);
    match method {
        ProcessingMethod::Single => {
            let detections = model.infer(image, confidence, iou)?;
            Ok(PipelineOutcome {
                detections,
                method,
                tiles_processed: None,
            })
        }
        ProcessingMethod::Tiled => {
            tracing::info!(width, height, "large image, using tiling");
            let tiles = tile_grid(image, tiling.tile_size, tiling.overlap, tiling.min_extent)?;
            let total = tiles.len();

            let mut per_tile = Vec::with_capacity(total);
            for (index, tile) in tiles.iter().enumerate() {
                tracing::debug!(
                    tile = index + 1,
                    total,
                    position = ?tile.position,
                    "processing tile"
                );
                let detections = model.infer(&tile.pixels, confidence, iou)?;
                per_tile.push((detections, tile.position));
            }

            let detections = merge_tile_detections(&per_tile, width, height);
            Ok(PipelineOutcome {
                detections,
                method,
                tiles_processed: Some(total),
            })
        }
    }
}
