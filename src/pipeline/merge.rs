use crate::pipeline::{Detection, Detections};

/// Translates per-tile detections into original-image coordinates and
/// keeps only boxes that land fully inside the image: all four
/// coordinates in `[0, dim)`, upper bound exclusive. Boxes touching the
/// outer edge are dropped, not clamped.
///
/// Overlapping tiles may report the same physical tree twice; no
/// cross-tile suppression happens here. The overlap only exists so a
/// tree straddling a seam is seen whole by at least one tile.
pub fn merge_tile_detections(
    per_tile: &[(Detections, (u32, u32))],
    width: u32,
    height: u32,
) -> Detections {
    let mut merged = Detections::new();

    for (detections, (tile_x, tile_y)) in per_tile {
        let (dx, dy) = (*tile_x as f32, *tile_y as f32);
        for det in detections {
            let [x1, y1, x2, y2] = det.bbox;
            let bbox = [x1 + dx, y1 + dy, x2 + dx, y2 + dy];
            if fully_inside(bbox, width as f32, height as f32) {
                merged.push(Detection {
                    bbox,
                    score: det.score,
                    class: det.class.clone(),
                });
            } else {
                tracing::trace!(?bbox, "dropping out-of-bounds detection");
            }
        }
    }

    merged
}

fn fully_inside(bbox: [f32; 4], width: f32, height: f32) -> bool {
    let [x1, y1, x2, y2] = bbox;
    x1 >= 0.0
        && x2 >= 0.0
        && y1 >= 0.0
        && y2 >= 0.0
        && x1 < width
        && x2 < width
        && y1 < height
        && y2 < height
}
