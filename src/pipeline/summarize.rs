use std::time::Duration;

use crate::pipeline::Detections;
use crate::pipeline::ProcessingMethod;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSummary {
    pub tree_count: usize,
    pub confidence: f32, // mean score as a percentage, one decimal
    pub processing_time: f64, // seconds, two decimals
    pub method: ProcessingMethod,
    pub tiles_processed: Option<usize>,
}

pub fn summarize_detections(
    detections: &Detections,
    elapsed: Duration,
    method: ProcessingMethod,
    tiles_processed: Option<usize>,
) -> DetectionSummary {
    DetectionSummary {
        tree_count: detections.len(),
        confidence: mean_confidence_pct(detections),
        processing_time: round2(elapsed.as_secs_f64()),
        method,
        tiles_processed,
    }
}

/// Mean confidence as a percentage rounded to one decimal; `0.0` for an
/// empty list rather than a division by zero.
pub fn mean_confidence_pct(detections: &Detections) -> f32 {
    if detections.is_empty() {
        return 0.0;
    }
    let sum: f32 = detections.iter().map(|d| d.score).sum();
    round1(sum / detections.len() as f32 * 100.0)
}

fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Detection;

    fn det(score: f32) -> Detection {
        Detection {
            bbox: [0.0, 0.0, 10.0, 10.0],
            score,
            class: "tree".to_string(),
        }
    }

    #[test]
    fn empty_list_means_zero_confidence() {
        let summary = summarize_detections(
            &Detections::new(),
            Duration::from_millis(1234),
            ProcessingMethod::Single,
            None,
        );
        assert_eq!(summary.tree_count, 0);
        assert_eq!(summary.confidence, 0.0);
        assert_eq!(summary.processing_time, 1.23);
        assert_eq!(summary.tiles_processed, None);
    }

    #[test]
    fn mean_confidence_rounds_to_one_decimal() {
        assert_eq!(mean_confidence_pct(&vec![det(0.5), det(0.25)]), 37.5);
        assert_eq!(mean_confidence_pct(&vec![det(0.333), det(0.333)]), 33.3);
        assert_eq!(mean_confidence_pct(&vec![det(0.999)]), 99.9);
    }

    #[test]
    fn tiled_summary_carries_tile_count() {
        let summary = summarize_detections(
            &vec![det(0.6), det(0.8)],
            Duration::from_secs(3),
            ProcessingMethod::Tiled,
            Some(9),
        );
        assert_eq!(summary.tree_count, 2);
        assert_eq!(summary.confidence, 70.0);
        assert_eq!(summary.method, ProcessingMethod::Tiled);
        assert_eq!(summary.tiles_processed, Some(9));
    }
}
