use std::fmt;
use std::path::Path;

use serde::Deserialize;

use config::{Config, ConfigError};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub server: Server,
    pub model: ModelConfig,
    pub tiling: TilingConfig,
    pub offline: OfflineConfig,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model_path: String,
    pub label_path: String,
    pub input_size: u32,
    pub iou_threshold: f32,
    /// Threshold for the full-image / tiled batch path.
    pub batch_confidence: f32,
    /// Threshold for the ad-hoc single-tile endpoint. Deliberately
    /// separate from `batch_confidence`; the two paths have always used
    /// different values.
    pub tile_confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TilingConfig {
    pub tile_size: u32,
    pub overlap: u32,
    pub min_extent: u32,
    pub max_single_pass: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
    pub tile_size: u32,
    pub overlap: u32,
    pub min_extent: u32,
}

impl fmt::Display for TilingConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}px tiles, {}px overlap, min extent {}px, single pass up to {}px",
            self.tile_size, self.overlap, self.min_extent, self.max_single_pass
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: Server {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            model: ModelConfig {
                model_path: "models/tree_detect.tflite".to_string(),
                label_path: "models/tree_labels.txt".to_string(),
                input_size: 640,
                iou_threshold: 0.45,
                batch_confidence: 0.2,
                tile_confidence: 0.25,
            },
            tiling: TilingConfig {
                tile_size: 1024,
                overlap: 100,
                min_extent: 100,
                max_single_pass: 2048,
            },
            offline: OfflineConfig {
                tile_size: 512,
                overlap: 100,
                min_extent: 100,
            },
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("canopy"))
            .build()?
            .try_deserialize()
    }

    /// Fails fast on settings that would make the tile loop degenerate.
    pub fn validate(&self) -> Result<()> {
        validate_step("tiling", self.tiling.tile_size, self.tiling.overlap)?;
        validate_step("offline", self.offline.tile_size, self.offline.overlap)?;
        if self.tiling.max_single_pass == 0 {
            return Err(Error::MisconfiguredTiling(
                "max_single_pass must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_step(section: &str, tile_size: u32, overlap: u32) -> Result<()> {
    if tile_size == 0 {
        return Err(Error::MisconfiguredTiling(format!(
            "{section}: tile size must be positive"
        )));
    }
    if overlap >= tile_size {
        return Err(Error::MisconfiguredTiling(format!(
            "{section}: overlap {overlap} >= tile size {tile_size}"
        )));
    }
    Ok(())
}
