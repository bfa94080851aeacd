use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::prelude::*;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::sys_stats::SysStats;
use crate::app::AppContext;
use crate::error::Error;
use crate::pipeline::{detect_trees, summarize_detections, Detection, ProcessingMethod};

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::InvalidImage(_) | Error::MisconfiguredTiling(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub tree_count: usize,
    pub confidence: f32,
    pub processing_time: f64,
    pub detections: Vec<DetectionPayload>,
    pub processing_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles_processed: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DetectionPayload {
    pub confidence: f32,
    pub bbox: BboxPayload,
}

#[derive(Debug, Serialize)]
pub struct BboxPayload {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<&Detection> for DetectionPayload {
    fn from(det: &Detection) -> Self {
        let [x1, y1, x2, y2] = det.bbox;
        DetectionPayload {
            confidence: round2(det.score * 100.0),
            bbox: BboxPayload {
                x: x1 as i32,
                y: y1 as i32,
                width: (x2 - x1) as i32,
                height: (y2 - y1) as i32,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DetectParams {
    /// Explicitly request the tiling pipeline regardless of image size.
    #[serde(default)]
    pub tiling: bool,
}

#[derive(Debug, Deserialize)]
pub struct TileRequest {
    pub image_data: String,
    #[serde(default)]
    pub tile_position: (u32, u32),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileResponse {
    pub tree_count: usize,
    pub confidence: f32,
    pub processing_time: f64,
    pub tile_position: (u32, u32),
    pub detections: Vec<DetectionPayload>,
}

pub async fn root(State(_ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Tree Detection API is running",
        "model_loaded": true,
    }))
}

pub async fn health(State(_ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let stats = tokio::task::spawn_blocking(SysStats::snapshot).await.ok();
    Json(json!({
        "status": "healthy",
        "model_loaded": true,
        "system": stats,
    }))
}

/// POST /api/detect-trees — multipart image upload, routed through the
/// fail-fast pipeline.
pub async fn detect(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<DetectParams>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, AppError> {
    let started = Instant::now();

    let mut image_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(format!("failed to read upload: {e}")))?;
            image_bytes = Some(data.to_vec());
            break;
        }
    }
    let image_bytes =
        image_bytes.ok_or_else(|| AppError::bad_request("no file field in request"))?;

    let model = ctx.model.clone();
    let tiling = ctx.config.tiling.clone();
    let confidence = ctx.config.model.batch_confidence;
    let iou = ctx.config.model.iou_threshold;

    let outcome = tokio::task::spawn_blocking(move || {
        let image = decode_rgb(&image_bytes)?;
        let mut model = model
            .lock()
            .map_err(|_| Error::Inference("model mutex poisoned".to_string()))?;
        detect_trees(&mut *model, &image, &tiling, confidence, iou, params.tiling)
    })
    .await
    .map_err(|e| AppError::internal(format!("detection task failed: {e}")))??;

    let summary = summarize_detections(
        &outcome.detections,
        started.elapsed(),
        outcome.method,
        outcome.tiles_processed,
    );
    tracing::info!(
        trees = summary.tree_count,
        method = outcome.method.as_str(),
        seconds = summary.processing_time,
        "detection complete"
    );

    Ok(Json(DetectResponse {
        tree_count: summary.tree_count,
        confidence: summary.confidence,
        processing_time: summary.processing_time,
        detections: outcome.detections.iter().map(Into::into).collect(),
        processing_method: outcome.method.as_str(),
        tiles_processed: summary.tiles_processed,
    }))
}

/// POST /api/detect-trees-tile — single pre-cut tile as base64, inferred
/// at the tile endpoint's own confidence threshold.
pub async fn detect_tile(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<TileRequest>,
) -> Result<Json<TileResponse>, AppError> {
    let started = Instant::now();

    if request.image_data.is_empty() {
        return Err(AppError::bad_request("no image data provided"));
    }
    let image_bytes = decode_image_data(&request.image_data)?;

    let model = ctx.model.clone();
    let confidence = ctx.config.model.tile_confidence;
    let iou = ctx.config.model.iou_threshold;

    let detections = tokio::task::spawn_blocking(move || {
        let image = decode_rgb(&image_bytes)?;
        let mut model = model
            .lock()
            .map_err(|_| Error::Inference("model mutex poisoned".to_string()))?;
        model.infer(&image, confidence, iou)
    })
    .await
    .map_err(|e| AppError::internal(format!("detection task failed: {e}")))??;

    let summary = summarize_detections(
        &detections,
        started.elapsed(),
        ProcessingMethod::Single,
        None,
    );

    Ok(Json(TileResponse {
        tree_count: summary.tree_count,
        confidence: summary.confidence,
        processing_time: summary.processing_time,
        tile_position: request.tile_position,
        detections: detections.iter().map(Into::into).collect(),
    }))
}

/// Strips an optional data-URL prefix and decodes the base64 body.
fn decode_image_data(data: &str) -> Result<Vec<u8>, Error> {
    let encoded = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| Error::InvalidImage("malformed data url".to_string()))?,
        None => data,
    };
    BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidImage(format!("bad base64 image data: {e}")))
}

/// The single decoded-image boundary: bytes in, RGB frame out.
fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, Error> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::InvalidImage(e.to_string()))?
        .to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidImage("zero-dimension image".to_string()));
    }
    Ok(image)
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let bytes = png_bytes(4, 4);
        let encoded = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(&bytes));
        let decoded = decode_image_data(&encoded).unwrap();
        assert_eq!(decoded, bytes);
        // bare base64 works too
        let decoded = decode_image_data(&BASE64_STANDARD.encode(&bytes)).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn garbage_base64_is_invalid_image() {
        assert!(matches!(
            decode_image_data("data:image/png;base64,!!!"),
            Err(Error::InvalidImage(_))
        ));
        assert!(matches!(
            decode_image_data("data:image/png_no_comma"),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn decode_rgb_round_trips_dimensions() {
        let image = decode_rgb(&png_bytes(6, 3)).unwrap();
        assert_eq!(image.dimensions(), (6, 3));
    }

    #[test]
    fn undecodable_bytes_are_invalid_image() {
        assert!(matches!(
            decode_rgb(b"not an image"),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn response_payload_uses_wire_names() {
        let det = Detection {
            bbox: [10.0, 20.0, 50.0, 80.0],
            score: 0.876,
            class: "tree".to_string(),
        };
        let response = DetectResponse {
            tree_count: 1,
            confidence: 87.6,
            processing_time: 0.42,
            detections: vec![(&det).into()],
            processing_method: "tiled",
            tiles_processed: Some(9),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["treeCount"], 1);
        assert_eq!(value["processingMethod"], "tiled");
        assert_eq!(value["tilesProcessed"], 9);
        assert_eq!(value["detections"][0]["confidence"], 87.6);
        assert_eq!(value["detections"][0]["bbox"]["x"], 10);
        assert_eq!(value["detections"][0]["bbox"]["width"], 40);
        assert_eq!(value["detections"][0]["bbox"]["height"], 60);
    }

    #[test]
    fn single_pass_response_omits_tile_count() {
        let response = DetectResponse {
            tree_count: 0,
            confidence: 0.0,
            processing_time: 0.1,
            detections: vec![],
            processing_method: "single",
            tiles_processed: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("tilesProcessed").is_none());
    }
}
