//! Ingredient dataset auto-labeler
//!
//! This library turns per-class folders of ingredient photos into a YOLO
//! object-detection dataset: detections are normalized, deduplicated per
//! ingredient category, split into train/val/test with a fixed seed, and
//! written as label files plus a `data.yaml` manifest. A separate refinement
//! pass regroups labeled trees and exports COCO annotations, and labels can
//! be drawn onto sample images for inspection.

pub mod coco;
pub mod config;
pub mod conversion;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod io;
pub mod ontology;
pub mod refiner;
pub mod split;
pub mod types;
pub mod utils;
pub mod visualize;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use config::{Args, LabelerConfig, RefineArgs, RefineConfig, VisualizeArgs, VisualizeConfig};
pub use dedup::{deduplicate, is_single_instance, DedupPolicy};
pub use detector::{Detector, JsonDetector, RawDetection};
pub use error::{LabelError, Result};
pub use geometry::{iou, to_center_normalized, to_corners, CenterBox, CornerBox, PixelBox};
pub use io::{create_dataset_yaml, setup_output_directories, write_label, Manifest};
pub use ontology::Ontology;
pub use split::{plan_split, SplitRatios};
pub use types::{ClassVocabulary, DatasetSplit, Detection, ProcessingStats};
pub use yolo_dataset::{process_dataset, AutoLabeler, PipelineState};

// COCO-specific exports
pub use coco::{CocoFile, CocoWriter};
pub use refiner::{refine_dataset, Refiner};
pub use visualize::{visualize_dataset, LabelVisualizer};
