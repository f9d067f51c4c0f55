use log::debug;
use std::path::Path;

use crate::config::LabelerConfig;
use crate::dedup::{deduplicate, DedupPolicy};
use crate::detector::{Detector, RawDetection};
use crate::error::Result;
use crate::geometry::to_center_normalized;
use crate::ontology::Ontology;
use crate::types::Detection;

/// Convert raw pixel detections to normalized boxes of class `class_idx`.
///
/// Images come from a folder named after their class, so the folder decides
/// the label regardless of which prompt fired.
pub fn normalize_detections(
    raw: &[RawDetection],
    image_width: u32,
    image_height: u32,
    class_idx: usize,
) -> Vec<Detection> {
    let (w, h) = (image_width as f64, image_height as f64);
    raw.iter()
        .map(|det| Detection::new(to_center_normalized(&det.bbox, w, h), det.confidence, class_idx))
        .collect()
}

/// Drop detections whose confidence is below `min_confidence`.
pub fn filter_min_confidence(detections: Vec<Detection>, min_confidence: f64) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|det| det.confidence >= min_confidence)
        .collect()
}

/// What the labeler needs to turn one image into label lines.
pub struct LabelingContext<'a> {
    pub detector: &'a dyn Detector,
    pub ontology: &'a Ontology,
    pub config: &'a LabelerConfig,
}

impl LabelingContext<'_> {
    /// Detect, normalize, and deduplicate the boxes for one image of
    /// `class_name`. An empty result means the image should be skipped.
    pub fn label_single_image(
        &self,
        image_path: &Path,
        class_name: &str,
        class_idx: usize,
    ) -> Result<Vec<Detection>> {
        let raw = self.detector.detect(image_path, self.ontology)?;
        if raw.is_empty() {
            debug!("No detections for {}", image_path.display());
            return Ok(Vec::new());
        }

        let (image_width, image_height) = self.detector.image_dimensions(image_path)?;
        let mut detections = normalize_detections(&raw, image_width, image_height, class_idx);

        if let Some(min_confidence) = self.config.min_confidence {
            detections = filter_min_confidence(detections, min_confidence);
        }

        Ok(deduplicate(
            detections,
            DedupPolicy::for_class(class_name),
            self.config.nms_iou_threshold,
        ))
    }
}
