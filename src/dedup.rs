//! Category-aware deduplication of the detections found in one image.
//!
//! Packaged goods (a bottle of oil, a box of powder) are photographed as a
//! single product, so only the largest box is kept. Everything else goes
//! through greedy non-maximum suppression.

use std::cmp::Ordering;

use crate::geometry::iou;
use crate::types::Detection;

pub const DEFAULT_NMS_IOU_THRESHOLD: f64 = 0.45;

/// Substrings marking an ingredient as a single packaged product.
pub const PACKAGED_KEYWORDS: &[&str] = &[
    "powder",
    "mix",
    "sauce",
    "paste",
    "oil",
    "extract",
    "bouillon",
    "stock",
    "seasoning",
    "half and half",
    "cream",
    "milk",
    "vinegar",
    "juice",
    "ketchup",
];

/// Case-insensitive substring match of `name` against any of `keywords`.
pub fn contains_keyword(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// Whether an ingredient class should keep at most one box per image.
pub fn is_single_instance(class_name: &str) -> bool {
    contains_keyword(class_name, PACKAGED_KEYWORDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Keep only the largest box.
    SingleInstance,
    /// Greedy NMS.
    MultiInstance,
}

impl DedupPolicy {
    pub fn for_class(class_name: &str) -> Self {
        if is_single_instance(class_name) {
            DedupPolicy::SingleInstance
        } else {
            DedupPolicy::MultiInstance
        }
    }
}

/// Apply the policy to the detections of one image.
pub fn deduplicate(
    detections: Vec<Detection>,
    policy: DedupPolicy,
    iou_threshold: f64,
) -> Vec<Detection> {
    if detections.len() <= 1 {
        return detections;
    }
    match policy {
        DedupPolicy::SingleInstance => largest_box_only(detections),
        DedupPolicy::MultiInstance => non_max_suppression(detections, iou_threshold),
    }
}

/// Keep the detection with the largest area; the first one wins on ties.
pub fn largest_box_only(detections: Vec<Detection>) -> Vec<Detection> {
    let mut largest: Option<Detection> = None;
    for det in detections {
        match &largest {
            Some(best) if det.bbox.area() <= best.bbox.area() => {}
            _ => largest = Some(det),
        }
    }
    largest.into_iter().collect()
}

/// Greedy NMS. Output is sorted by confidence, highest first; equal
/// confidences keep their input order.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    if detections.len() <= 1 {
        return detections;
    }

    // sort_by is stable
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let corners: Vec<_> = detections
        .iter()
        .map(|d| d.bbox.to_normalized_corners())
        .collect();
    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::with_capacity(detections.len());

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i]);
        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&corners[i], &corners[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CenterBox;

    fn det(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Detection {
        Detection::new(CenterBox::new(x, y, w, h), confidence, 0)
    }

    #[test]
    fn test_packaged_keywords() {
        assert!(is_single_instance("Soy Sauce"));
        assert!(is_single_instance("coconut milk"));
        assert!(is_single_instance("half and half"));
        assert!(!is_single_instance("basil"));
        assert!(!is_single_instance("tomato"));
        assert_eq!(DedupPolicy::for_class("chili powder"), DedupPolicy::SingleInstance);
        assert_eq!(DedupPolicy::for_class("carrot"), DedupPolicy::MultiInstance);
    }

    #[test]
    fn test_single_element_unchanged() {
        let input = vec![det(0.5, 0.5, 0.1, 0.1, 0.2)];
        assert_eq!(deduplicate(input.clone(), DedupPolicy::MultiInstance, 0.45), input);
        assert_eq!(deduplicate(input.clone(), DedupPolicy::SingleInstance, 0.45), input);
    }

    #[test]
    fn test_largest_box_independent_of_order() {
        // areas 5, 9, 3 (in hundredths)
        let a = det(0.5, 0.5, 0.05, 1.0, 0.9);
        let b = det(0.5, 0.5, 0.09, 1.0, 0.1);
        let c = det(0.5, 0.5, 0.03, 1.0, 0.5);
        for order in [[a, b, c], [c, a, b], [b, c, a], [c, b, a]] {
            let kept = deduplicate(order.to_vec(), DedupPolicy::SingleInstance, 0.45);
            assert_eq!(kept, vec![b]);
        }
    }

    #[test]
    fn test_largest_box_tie_keeps_first() {
        let a = Detection::new(CenterBox::new(0.2, 0.2, 0.2, 0.2), 0.3, 0);
        let b = Detection::new(CenterBox::new(0.7, 0.7, 0.2, 0.2), 0.9, 0);
        assert_eq!(largest_box_only(vec![a, b]), vec![a]);
    }

    #[test]
    fn test_nms_drops_overlapping_lower_confidence() {
        let low = det(0.5, 0.5, 0.4, 0.4, 0.6);
        let high = det(0.52, 0.5, 0.4, 0.4, 0.9);
        let far = det(0.1, 0.1, 0.1, 0.1, 0.3);
        let kept = non_max_suppression(vec![low, high, far], 0.45);
        assert_eq!(kept, vec![high, far]);
    }

    #[test]
    fn test_nms_keeps_low_overlap_boxes() {
        // two 0.2x0.2 boxes offset so IoU is well below the threshold
        let a = det(0.3, 0.5, 0.2, 0.2, 0.9);
        let b = det(0.45, 0.5, 0.2, 0.2, 0.8);
        let kept = non_max_suppression(vec![a, b], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_stable_for_equal_confidence() {
        let a = det(0.1, 0.1, 0.1, 0.1, 0.5);
        let b = det(0.5, 0.5, 0.1, 0.1, 0.5);
        let c = det(0.9, 0.9, 0.1, 0.1, 0.5);
        assert_eq!(non_max_suppression(vec![a, b, c], 0.45), vec![a, b, c]);
    }

    #[test]
    fn test_nms_idempotent() {
        let input = vec![
            det(0.5, 0.5, 0.4, 0.4, 0.6),
            det(0.52, 0.5, 0.4, 0.4, 0.9),
            det(0.55, 0.55, 0.3, 0.3, 0.7),
            det(0.1, 0.1, 0.1, 0.1, 0.3),
            det(0.12, 0.1, 0.1, 0.1, 0.35),
        ];
        let once = non_max_suppression(input, 0.45);
        let twice = non_max_suppression(once.clone(), 0.45);
        assert_eq!(once, twice);
    }
}
