use image::{GenericImage, RgbImage};

use crate::error::{Error, Result};

/// A fixed-size block cut from a larger image. `pixels` is always
/// `tile_size` square; anything past `extent` is zero padding and must
/// not be reported as real content.
pub struct Tile {
    pub pixels: RgbImage,
    pub position: (u32, u32), // top-left corner in original image coords
    pub extent: (u32, u32),   // pre-padding (width, height)
}

/// Cuts `image` into overlapping `tile_size` square tiles, row-major.
/// Clipped edge regions below `min_extent` in either dimension are
/// skipped; the rest are zero-padded bottom/right up to `tile_size`.
pub fn tile_grid(
    image: &RgbImage,
    tile_size: u32,
    overlap: u32,
    min_extent: u32,
) -> Result<Vec<Tile>> {
    if tile_size == 0 || overlap >= tile_size {
        return Err(Error::MisconfiguredTiling(format!(
            "tile size {} with overlap {} leaves no forward step",
            tile_size, overlap
        )));
    }
    let step = tile_size - overlap;
    let (width, height) = image.dimensions();

    let mut tiles = Vec::new();
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let w = (x + tile_size).min(width) - x;
            let h = (y + tile_size).min(height) - y;

            if w < min_extent || h < min_extent {
                tracing::debug!(x, y, w, h, "skipping undersized tile");
                x += step;
                continue;
            }

            let region = image::imageops::crop_imm(image, x, y, w, h).to_image();
            let mut pixels = RgbImage::new(tile_size, tile_size);
            pixels.copy_from(&region, 0, 0)?;

            tiles.push(Tile {
                pixels,
                position: (x, y),
                extent: (w, h),
            });
            x += step;
        }
        y += step;
    }

    tracing::debug!(count = tiles.len(), width, height, "tile grid built");
    Ok(tiles)
}
