use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dedup::DEFAULT_NMS_IOU_THRESHOLD;
use crate::error::Result;
use crate::split::{SplitRatios, DEFAULT_SEED};
use crate::types::DatasetSplit;

/// Auto-label per-class ingredient image folders into a YOLO dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing one image folder per ingredient class
    #[arg(short = 's', long = "source_dir", default_value = "dataset/imgs")]
    pub source_dir: PathBuf,

    /// Root of the generated dataset
    #[arg(short = 'o', long = "output_dir", default_value = "dataset/ingredients_dataset")]
    pub output_dir: PathBuf,

    /// Newline-delimited list of class names
    #[arg(short = 'c', long = "classes_file", default_value = "ingredients/out/classes.txt")]
    pub classes_file: PathBuf,

    /// Proportion of each class folder used for training
    #[arg(long = "train_size", default_value_t = 0.8, value_parser = validate_size)]
    pub train_size: f64,

    /// Proportion of each class folder used for validation
    #[arg(long = "val_size", default_value_t = 0.15, value_parser = validate_size)]
    pub val_size: f64,

    /// Proportion of each class folder used for testing
    #[arg(long = "test_size", default_value_t = 0.05, value_parser = validate_size)]
    pub test_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// IoU above which overlapping boxes are suppressed
    #[arg(long = "nms_iou", default_value_t = DEFAULT_NMS_IOU_THRESHOLD, value_parser = validate_size)]
    pub nms_iou: f64,

    /// Detector box threshold; weaker detections are ignored
    #[arg(long = "box_threshold", default_value_t = 0.35, value_parser = validate_size)]
    pub box_threshold: f64,

    /// Optional confidence floor applied before deduplication
    #[arg(long = "min_confidence", value_parser = validate_size)]
    pub min_confidence: Option<f64>,

    /// Number of worker threads (defaults to the number of cores)
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<usize>,
}

impl Args {
    /// Validate the arguments and freeze them into the labeler configuration.
    pub fn to_labeler_config(&self) -> Result<LabelerConfig> {
        Ok(LabelerConfig {
            source_dir: self.source_dir.clone(),
            output_dir: self.output_dir.clone(),
            classes_file: self.classes_file.clone(),
            ratios: SplitRatios::new(self.train_size, self.val_size, self.test_size)?,
            seed: self.seed,
            nms_iou_threshold: self.nms_iou,
            min_confidence: self.min_confidence,
            workers: self.workers,
        })
    }
}

/// Everything the labeling pipeline reads. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelerConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub classes_file: PathBuf,
    pub ratios: SplitRatios,
    pub seed: u64,
    pub nms_iou_threshold: f64,
    pub min_confidence: Option<f64>,
    pub workers: Option<usize>,
}

impl LabelerConfig {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        classes_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            classes_file: classes_file.into(),
            ratios: SplitRatios::default(),
            seed: DEFAULT_SEED,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
            min_confidence: None,
            workers: None,
        }
    }
}

/// Regroup a labeled image tree into train/val and export COCO annotations.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct RefineArgs {
    /// Directory of labeled images, possibly nested per class
    #[arg(short = 'i', long = "images_dir", default_value = "dataset/imgs")]
    pub images_dir: PathBuf,

    /// Directory of YOLO label files mirroring the image tree
    #[arg(short = 'l', long = "labels_dir", default_value = "dataset/labels")]
    pub labels_dir: PathBuf,

    /// Newline-delimited list of class names
    #[arg(short = 'c', long = "classes_file", default_value = "ingredients/out/classes.txt")]
    pub classes_file: PathBuf,

    /// Proportion of images placed in the train split
    #[arg(long = "train_size", default_value_t = 0.8, value_parser = validate_size)]
    pub train_size: f64,

    /// Where to write the dataset manifest (defaults to <images_dir>/../dataset.yaml)
    #[arg(long = "yaml_output")]
    pub yaml_output: Option<PathBuf>,

    /// Where to write the COCO export (defaults to <images_dir>/../annotations.json)
    #[arg(long = "coco_output")]
    pub coco_output: Option<PathBuf>,

    /// JSON file of per-box scores; low-scoring boxes are removed from the labels first
    #[arg(long = "confidence_file")]
    pub confidence_file: Option<PathBuf>,

    /// Score a box needs to survive the confidence filter
    #[arg(long = "min_confidence", default_value_t = 0.5, value_parser = validate_size)]
    pub min_confidence: f64,

    /// Do not regroup images into train/val
    #[arg(long = "skip_split")]
    pub skip_split: bool,

    /// Do not write the COCO export
    #[arg(long = "skip_coco")]
    pub skip_coco: bool,
}

impl RefineArgs {
    pub fn to_refine_config(&self) -> RefineConfig {
        let dataset_dir = dataset_dir_of(&self.images_dir);
        RefineConfig {
            images_dir: self.images_dir.clone(),
            labels_dir: self.labels_dir.clone(),
            classes_file: self.classes_file.clone(),
            train_size: self.train_size,
            yaml_output: self
                .yaml_output
                .clone()
                .unwrap_or_else(|| dataset_dir.join("dataset.yaml")),
            coco_output: self
                .coco_output
                .clone()
                .unwrap_or_else(|| dataset_dir.join("annotations.json")),
            confidence_file: self.confidence_file.clone(),
            min_confidence: self.min_confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineConfig {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub classes_file: PathBuf,
    pub train_size: f64,
    pub yaml_output: PathBuf,
    pub coco_output: PathBuf,
    pub confidence_file: Option<PathBuf>,
    pub min_confidence: f64,
}

/// Draw the labels of a sample of dataset images and save the results.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct VisualizeArgs {
    /// Root of a YOLO dataset with train/val/test splits
    #[arg(short = 'd', long = "dataset", default_value = "dataset/ingredients_dataset")]
    pub dataset_dir: PathBuf,

    /// Split to sample from
    #[arg(long = "split", value_enum, default_value_t = DatasetSplit::Train)]
    pub split: DatasetSplit,

    /// Number of images to render
    #[arg(short = 'n', long = "num_samples", default_value_t = 5)]
    pub num_samples: usize,

    /// Where the rendered images are saved
    #[arg(short = 'o', long = "output_dir", default_value = "labeled_images")]
    pub output_dir: PathBuf,

    /// Class names file (defaults to the names in the dataset's data.yaml)
    #[arg(short = 'c', long = "classes_file")]
    pub classes_file: Option<PathBuf>,

    /// TrueType/OpenType font for class names; boxes only when omitted
    #[arg(long = "font")]
    pub font: Option<PathBuf>,

    /// Seed for sampling
    #[arg(long = "seed", default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

impl VisualizeArgs {
    pub fn to_visualize_config(&self) -> VisualizeConfig {
        VisualizeConfig {
            dataset_dir: self.dataset_dir.clone(),
            split: self.split,
            num_samples: self.num_samples,
            output_dir: self.output_dir.clone(),
            classes_file: self.classes_file.clone(),
            font: self.font.clone(),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizeConfig {
    pub dataset_dir: PathBuf,
    pub split: DatasetSplit,
    pub num_samples: usize,
    pub output_dir: PathBuf,
    pub classes_file: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub seed: u64,
}

/// Parent of the images directory, where the regrouped splits are placed.
pub fn dataset_dir_of(images_dir: &Path) -> PathBuf {
    match images_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// Validate that the size is between 0.0 and 1.0
fn validate_size(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LabelError;

    #[test]
    fn test_validate_size() {
        assert!(validate_size("0.5").is_ok());
        assert!(validate_size("1.0").is_ok());
        assert!(validate_size("0.0").is_ok());
        assert!(validate_size("-0.1").is_err());
        assert!(validate_size("1.1").is_err());
        assert!(validate_size("abc").is_err());
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["autolabel"]);
        let config = args.to_labeler_config().unwrap();
        assert_eq!(config.source_dir, PathBuf::from("dataset/imgs"));
        assert_eq!(config.ratios, SplitRatios::default());
        assert_eq!(config.seed, 42);
        assert_eq!(config.nms_iou_threshold, 0.45);
        assert_eq!(config.min_confidence, None);
    }

    #[test]
    fn test_invalid_split_fails_fast() {
        let args = Args::parse_from(["autolabel", "--train_size", "0.9", "--val_size", "0.2"]);
        assert!(matches!(
            args.to_labeler_config(),
            Err(LabelError::InvalidSplit { .. })
        ));
    }

    #[test]
    fn test_refine_defaults_next_to_images() {
        let args = RefineArgs::parse_from(["refine-dataset", "-i", "data/imgs"]);
        let config = args.to_refine_config();
        assert_eq!(config.yaml_output, PathBuf::from("data/dataset.yaml"));
        assert_eq!(config.coco_output, PathBuf::from("data/annotations.json"));
        assert_eq!(config.confidence_file, None);
        assert_eq!(config.min_confidence, 0.5);

        let args = RefineArgs::parse_from(["refine-dataset", "-i", "imgs"]);
        assert_eq!(args.to_refine_config().yaml_output, PathBuf::from("./dataset.yaml"));
    }

    #[test]
    fn test_visualize_args() {
        let args = VisualizeArgs::parse_from(["visualize-labels", "--split", "val", "-n", "3"]);
        let config = args.to_visualize_config();
        assert_eq!(config.split, DatasetSplit::Val);
        assert_eq!(config.num_samples, 3);
        assert_eq!(config.dataset_dir, PathBuf::from("dataset/ingredients_dataset"));
        assert_eq!(config.classes_file, None);
        assert!(VisualizeArgs::try_parse_from(["visualize-labels", "--split", "all"]).is_err());
    }
}
