use std::sync::{Arc, Mutex};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One predicted tree instance, in the pixel space of whatever image
/// was handed to the model (tile-local until the merger translates it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2]
    pub score: f32,
    pub class: String,
}

pub type Detections = Vec<Detection>;

/// The detection model boundary. Implementations own their preprocessing
/// resize and must return boxes scaled back to the dimensions of `image`.
pub trait TreeModel {
    fn infer(&mut self, image: &RgbImage, confidence: f32, iou: f32) -> Result<Detections>;
}

/// Process-wide model handle, constructed once at startup. The interpreter
/// mutates scratch buffers during invoke, so calls are serialized behind
/// the mutex.
pub type SharedModel = Arc<Mutex<dyn TreeModel + Send>>;
