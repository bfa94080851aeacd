mod model;
pub use model::Detection;
pub use model::Detections;
pub use model::SharedModel;
pub use model::TreeModel;

mod tile;
pub use tile::tile_grid;
pub use tile::Tile;

mod route;
pub use route::choose_method;
pub use route::ProcessingMethod;

mod merge;
pub use merge::merge_tile_detections;

mod summarize;
pub use summarize::mean_confidence_pct;
pub use summarize::summarize_detections;
pub use summarize::DetectionSummary;

mod process;
pub use process::detect_trees;
pub use process::PipelineOutcome;

mod offline;
pub use offline::process_large_image;
pub use offline::OfflineReport;

mod tflite;
pub use tflite::TfliteModel;
