//! The boundary to the object detector.
//!
//! The pipeline only needs "give me boxes for this image". Any backend that
//! implements [`Detector`] can be plugged into the labeler; [`JsonDetector`]
//! reads detections that were produced ahead of time and stored next to each
//! image.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{LabelError, Result};
use crate::geometry::CornerBox;
use crate::ontology::Ontology;
use crate::utils::read_image_dimensions;

/// A detector output before normalization and deduplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    /// Pixel corners.
    pub bbox: CornerBox,
    pub confidence: f64,
    pub class_idx: usize,
}

pub trait Detector: Sync {
    /// Detect objects in one image. An empty vector means nothing was found.
    fn detect(&self, image_path: &Path, ontology: &Ontology) -> Result<Vec<RawDetection>>;

    /// Image width and height, read independently of detection.
    fn image_dimensions(&self, image_path: &Path) -> Result<(u32, u32)> {
        read_image_dimensions(image_path)
    }
}

#[derive(Debug, Deserialize)]
struct SidecarDetection {
    bbox: [f64; 4],
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    class_id: Option<usize>,
    #[serde(default)]
    prompt: Option<String>,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SidecarFile {
    List(Vec<SidecarDetection>),
    Wrapped { detections: Vec<SidecarDetection> },
}

impl SidecarFile {
    fn into_detections(self) -> Vec<SidecarDetection> {
        match self {
            SidecarFile::List(detections) | SidecarFile::Wrapped { detections } => detections,
        }
    }
}

/// Reads precomputed detections from `<image stem>.json` beside each image.
///
/// Each entry holds a pixel `bbox` as `[x1, y1, x2, y2]`, a `confidence`, and
/// either a `class_id` or the `prompt` that fired. Entries scoring below
/// `box_threshold` are dropped.
#[derive(Debug, Clone)]
pub struct JsonDetector {
    pub box_threshold: f64,
}

impl JsonDetector {
    pub fn new(box_threshold: f64) -> Self {
        Self { box_threshold }
    }

    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        image_path.with_extension("json")
    }
}

impl Detector for JsonDetector {
    fn detect(&self, image_path: &Path, ontology: &Ontology) -> Result<Vec<RawDetection>> {
        let sidecar = Self::sidecar_path(image_path);
        let file = File::open(&sidecar).map_err(|e| LabelError::io(&sidecar, e))?;
        let parsed: SidecarFile = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            LabelError::DetectionParse {
                path: sidecar.clone(),
                source,
            }
        })?;

        let mut detections = Vec::new();
        for det in parsed.into_detections() {
            if det.confidence < self.box_threshold {
                continue;
            }
            let class_idx = match &det.prompt {
                Some(prompt) => match ontology.class_for_prompt(prompt) {
                    Some(idx) => idx,
                    None => {
                        debug!(
                            "Ignoring detection for unknown prompt {:?} in {}",
                            prompt,
                            sidecar.display()
                        );
                        continue;
                    }
                },
                None => det.class_id.unwrap_or(0),
            };
            let [x1, y1, x2, y2] = det.bbox;
            detections.push(RawDetection {
                bbox: CornerBox::new(x1, y1, x2, y2),
                confidence: det.confidence,
                class_idx,
            });
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassVocabulary;
    use std::fs;

    fn ontology() -> Ontology {
        Ontology::build(&ClassVocabulary::from_names(["tomato", "onion"]).unwrap())
    }

    #[test]
    fn test_reads_list_sidecar_and_applies_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        fs::write(
            dir.path().join("a.json"),
            r#"[
                {"bbox": [30, 40, 10, 20], "confidence": 0.9, "class_id": 1},
                {"bbox": [0, 0, 5, 5], "confidence": 0.1}
            ]"#,
        )
        .unwrap();

        let dets = JsonDetector::new(0.35).detect(&image, &ontology()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, CornerBox::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(dets[0].class_idx, 1);
    }

    #[test]
    fn test_reads_wrapped_sidecar_with_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("b.png");
        fs::write(
            dir.path().join("b.json"),
            r#"{"detections": [
                {"bbox": [1, 1, 2, 2], "prompt": "fresh onion"},
                {"bbox": [1, 1, 2, 2], "prompt": "garlic"}
            ]}"#,
        )
        .unwrap();

        let dets = JsonDetector::new(0.35).detect(&image, &ontology()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_idx, 1);
        assert_eq!(dets[0].confidence, 1.0);
    }

    #[test]
    fn test_missing_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonDetector::new(0.35)
            .detect(&dir.path().join("missing.jpg"), &ontology())
            .unwrap_err();
        assert!(matches!(err, LabelError::Io { .. }));
    }

    #[test]
    fn test_malformed_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("c.json"), "{not json").unwrap();
        let err = JsonDetector::new(0.35)
            .detect(&dir.path().join("c.jpg"), &ontology())
            .unwrap_err();
        assert!(matches!(err, LabelError::DetectionParse { .. }));
    }
}
