use std::collections::HashMap;
use std::fs::read_to_string;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tflite::ops::builtin::BuiltinOpResolver;
use tflite::{FlatBufferModel, Interpreter, InterpreterBuilder};

use crate::app::config::ModelConfig;
use crate::error::{Error, Result};
use crate::pipeline::{Detection, Detections, TreeModel};

/// TFLite-backed tree detector. Owns the preprocessing resize to the
/// model's fixed input resolution and scales the normalized output boxes
/// back to the pixel space of whatever image was passed in.
pub struct TfliteModel<'a> {
    interpreter: Interpreter<'a, BuiltinOpResolver>,
    labels: LabelMap,
    input_size: u32,
}

// The interpreter holds raw pointers into the C runtime; it is only ever
// touched behind the shared mutex.
unsafe impl Send for TfliteModel<'_> {}

struct LabelMap {
    labels: HashMap<i32, String>,
}

impl LabelMap {
    fn from_file(path: &str) -> Result<Self> {
        Self::parse(&read_to_string(path)?)
    }

    fn parse(text: &str) -> Result<Self> {
        let mut labels = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let id = parts
                .next()
                .and_then(|p| p.parse::<i32>().ok())
                .ok_or_else(|| Error::Labels(format!("bad label line: {line:?}")))?;
            let name = parts
                .next()
                .ok_or_else(|| Error::Labels(format!("label line missing name: {line:?}")))?;
            labels.insert(id, name.to_string());
        }
        Ok(Self { labels })
    }

    fn lookup(&self, id: i32) -> Option<&String> {
        self.labels.get(&id)
    }
}

impl<'a> TfliteModel<'a> {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model = FlatBufferModel::build_from_file(&config.model_path)
            .map_err(|e| Error::ModelLoad(e.to_string()))?;
        let resolver = BuiltinOpResolver::default();
        let builder = InterpreterBuilder::new(model, resolver)
            .map_err(|e| Error::ModelLoad(e.to_string()))?;
        let mut interpreter = builder
            .build()
            .map_err(|e| Error::ModelLoad(e.to_string()))?;
        interpreter
            .allocate_tensors()
            .map_err(|e| Error::ModelLoad(e.to_string()))?;

        let inputs = interpreter.inputs().to_vec();
        if inputs.len() != 1 {
            return Err(Error::ModelLoad(format!(
                "expected one input tensor, found {}",
                inputs.len()
            )));
        }
        let details = interpreter
            .get_input_details()
            .map_err(|e| Error::ModelLoad(e.to_string()))?;
        let expected_height = details[0].dims[1] as u32;
        let expected_width = details[0].dims[2] as u32;
        if expected_width != config.input_size || expected_height != config.input_size {
            return Err(Error::ModelLoad(format!(
                "model wants {}x{} input, config says {}",
                expected_width, expected_height, config.input_size
            )));
        }

        let outputs = interpreter.outputs().to_vec();
        if outputs.len() != 4 {
            return Err(Error::ModelLoad(format!(
                "expected the 4-tensor detection postprocess output, found {}",
                outputs.len()
            )));
        }

        let labels = LabelMap::from_file(&config.label_path)?;
        tracing::info!(model = %config.model_path, input_size = config.input_size, "model loaded");

        Ok(Self {
            interpreter,
            labels,
            input_size: config.input_size,
        })
    }
}

impl TreeModel for TfliteModel<'_> {
    fn infer(&mut self, image: &RgbImage, confidence: f32, iou: f32) -> Result<Detections> {
        // NMS runs inside the detection postprocess graph with a threshold
        // fixed at export time; the configured value is only logged.
        tracing::trace!(confidence, iou, "running tflite inference");

        let (width, height) = image.dimensions();
        let resized = imageops::resize(image, self.input_size, self.input_size, FilterType::Triangle);

        let inputs = self.interpreter.inputs().to_vec();
        let input = self
            .interpreter
            .tensor_data_mut(inputs[0])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let raw = resized.as_raw();
        if input.len() != raw.len() {
            return Err(Error::Inference(format!(
                "input tensor holds {} bytes, frame has {}",
                input.len(),
                raw.len()
            )));
        }
        input.copy_from_slice(raw);

        self.interpreter
            .invoke()
            .map_err(|e| Error::Inference(e.to_string()))?;

        let outputs = self.interpreter.outputs().to_vec();
        let locations: &[f32] = self
            .interpreter
            .tensor_data(outputs[0])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let classes: &[f32] = self
            .interpreter
            .tensor_data(outputs[1])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let scores: &[f32] = self
            .interpreter
            .tensor_data(outputs[2])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let counts: &[f32] = self
            .interpreter
            .tensor_data(outputs[3])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let count = counts[0] as usize;

        let (width, height) = (width as f32, height as f32);
        let mut detections = Detections::new();
        for index in 0..count {
            let score = scores[index];
            if score <= confidence {
                continue;
            }
            // normalized [ymin, xmin, ymax, xmax], clipped to the frame
            let y1 = (height * locations[4 * index]).max(0.0);
            let x1 = (width * locations[4 * index + 1]).max(0.0);
            let y2 = (height * locations[4 * index + 2]).min(height - 1.0);
            let x2 = (width * locations[4 * index + 3]).min(width - 1.0);

            let class_id = classes[index] as i32;
            let class = self
                .labels
                .lookup(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{class_id}"));

            tracing::trace!(class_id, score, x1, y1, x2, y2, "detection");
            detections.push(Detection {
                bbox: [x1, y1, x2, y2],
                score,
                class,
            });
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_map_parses_id_name_pairs() {
        let labels = LabelMap::parse("0 tree\n1 shrub\n\n").unwrap();
        assert_eq!(labels.lookup(0), Some(&"tree".to_string()));
        assert_eq!(labels.lookup(1), Some(&"shrub".to_string()));
        assert_eq!(labels.lookup(2), None);
    }

    #[test]
    fn label_map_rejects_garbage() {
        assert!(matches!(LabelMap::parse("tree 0"), Err(Error::Labels(_))));
        assert!(matches!(LabelMap::parse("0"), Err(Error::Labels(_))));
    }
}
