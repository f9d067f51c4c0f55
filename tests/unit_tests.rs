#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ingredient_autolabel::dedup::non_max_suppression;
    use ingredient_autolabel::io::format_label_lines;
    use ingredient_autolabel::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn det(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Detection {
        Detection::new(CenterBox::new(x, y, w, h), confidence, 0)
    }

    #[test]
    fn test_iou_symmetry_over_box_pairs() {
        let boxes = [
            CornerBox::new(0.0, 0.0, 10.0, 10.0),
            CornerBox::new(5.0, 5.0, 15.0, 15.0),
            CornerBox::new(2.0, 3.0, 4.0, 20.0),
            CornerBox::new(100.0, 100.0, 101.0, 101.0),
            CornerBox::new(-5.0, -5.0, 50.0, 2.0),
        ];
        for a in &boxes {
            assert_abs_diff_eq!(iou(a, a), 1.0, epsilon = 1e-5);
            for b in &boxes {
                assert_eq!(iou(a, b), iou(b, a));
                assert!((0.0..=1.0).contains(&iou(a, b)));
            }
        }
    }

    #[test]
    fn test_center_corner_round_trip() {
        let samples = [
            CenterBox::new(0.5, 0.5, 1.0, 1.0),
            CenterBox::new(0.1, 0.9, 0.2, 0.2),
            CenterBox::new(0.33, 0.66, 0.05, 0.4),
        ];
        for b in samples {
            for (w, h) in [(1.0, 1.0), (640.0, 480.0), (1920.0, 1080.0)] {
                let back = to_center_normalized(&to_corners(&b, w, h), w, h);
                assert_abs_diff_eq!(back.x_center, b.x_center, epsilon = 1e-9);
                assert_abs_diff_eq!(back.y_center, b.y_center, epsilon = 1e-9);
                assert_abs_diff_eq!(back.width, b.width, epsilon = 1e-9);
                assert_abs_diff_eq!(back.height, b.height, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_nms_twice_removes_nothing_more() {
        let input: Vec<Detection> = (0..20)
            .map(|i| {
                let f = i as f64;
                det(0.2 + 0.03 * f, 0.5, 0.2, 0.2, 0.5 + 0.02 * (f % 7.0))
            })
            .collect();
        let once = non_max_suppression(input, 0.45);
        assert_eq!(non_max_suppression(once.clone(), 0.45), once);
    }

    #[test]
    fn test_single_instance_keeps_largest_area() {
        let small = det(0.5, 0.5, 0.5, 0.1, 0.99); // 5
        let large = det(0.5, 0.5, 0.9, 0.1, 0.10); // 9
        let tiny = det(0.5, 0.5, 0.3, 0.1, 0.50); // 3
        let policy = DedupPolicy::for_class("sesame oil");
        assert_eq!(policy, DedupPolicy::SingleInstance);
        assert_eq!(deduplicate(vec![small, large, tiny], policy, 0.45), vec![large]);
        assert_eq!(deduplicate(vec![tiny, small, large], policy, 0.45), vec![large]);
    }

    #[test]
    fn test_split_planner_reproducible() {
        let items: Vec<PathBuf> = (0..100)
            .map(|i| PathBuf::from(format!("img_{i:03}.jpg")))
            .collect();
        let ratios = SplitRatios::new(0.8, 0.15, 0.05).unwrap();

        let a = plan_split(&items, &ratios, 42);
        let b = plan_split(&items, &ratios, 42);
        let as_set = |v: &[PathBuf]| v.iter().cloned().collect::<HashSet<_>>();

        assert_eq!(as_set(&a.train), as_set(&b.train));
        assert_eq!(as_set(&a.val), as_set(&b.val));
        assert_eq!(as_set(&a.test), as_set(&b.test));
        assert_eq!((a.train.len(), a.val.len(), a.test.len()), (80, 15, 5));
    }

    #[test]
    fn test_split_changes_with_seed() {
        let items: Vec<usize> = (0..100).collect();
        let ratios = SplitRatios::default();
        assert_ne!(plan_split(&items, &ratios, 42), plan_split(&items, &ratios, 43));
    }

    #[test]
    fn test_label_line_format() {
        let yolo_data = format_label_lines(&[Detection::new(
            CenterBox::new(0.15, 0.15, 0.1, 0.1),
            0.9,
            4,
        )]);
        assert_eq!(yolo_data, "4 0.150000 0.150000 0.100000 0.100000\n");
    }
}
