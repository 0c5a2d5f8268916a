//! Randomized invariants of the mapping and suppression stages.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use yolopost::lowlevel::{iou, nms_per_class, CenterBox};
use yolopost::{
    BBox, CoordinateMapper, Detection, ImageShape, NmsMethod, NonMaxSuppressor,
};

fn random_detections(rng: &mut StdRng, count: usize, classes: usize) -> Vec<Detection> {
    (0..count)
        .map(|_| {
            let x0 = rng.random_range(0.0f32..200.0);
            let y0 = rng.random_range(0.0f32..200.0);
            let w = rng.random_range(5.0f32..60.0);
            let h = rng.random_range(5.0f32..60.0);
            Detection {
                bbox: BBox::new(x0, y0, x0 + w, y0 + h),
                score: rng.random_range(0.26f32..1.0),
                class_id: rng.random_range(0..classes),
            }
        })
        .collect()
}

#[test]
fn mapping_is_identity_without_letterbox() {
    let mut rng = StdRng::seed_from_u64(7);
    let mapper = CoordinateMapper::new(ImageShape::new(416, 416).unwrap(), 416);
    for _ in 0..500 {
        let center = CenterBox {
            cx: rng.random_range(-50.0f32..466.0),
            cy: rng.random_range(-50.0f32..466.0),
            w: rng.random_range(1.0f32..200.0),
            h: rng.random_range(1.0f32..200.0),
        };
        let raw = mapper.unletterbox(center);
        assert_eq!(raw.x_min, center.cx - center.w * 0.5);
        assert_eq!(raw.y_min, center.cy - center.h * 0.5);
        assert_eq!(raw.x_max, center.cx + center.w * 0.5);
        assert_eq!(raw.y_max, center.cy + center.h * 0.5);
    }
}

#[test]
fn mapped_boxes_stay_inside_the_image_or_are_zeroed() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let height = rng.random_range(1..2000usize);
        let width = rng.random_range(1..2000usize);
        let mapper = CoordinateMapper::new(ImageShape::new(height, width).unwrap(), 416);
        let max_x = width as f32 - 1.0;
        let max_y = height as f32 - 1.0;
        for _ in 0..200 {
            let center = CenterBox {
                cx: rng.random_range(-100.0f32..516.0),
                cy: rng.random_range(-100.0f32..516.0),
                w: rng.random_range(0.0f32..300.0),
                h: rng.random_range(0.0f32..300.0),
            };
            let b = mapper.map(center);
            if b == BBox::default() {
                continue;
            }
            assert!(0.0 <= b.x_min && b.x_min <= b.x_max && b.x_max <= max_x, "{b:?}");
            assert!(0.0 <= b.y_min && b.y_min <= b.y_max && b.y_max <= max_y, "{b:?}");
        }
    }
}

#[test]
fn hard_nms_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(3);
    let nms = NonMaxSuppressor::default();
    for _ in 0..30 {
        let dets = random_detections(&mut rng, 80, 4);
        let once = nms.suppress(&dets);
        let twice = nms.suppress(&once);
        assert_eq!(once, twice);
    }
}

#[test]
fn hard_nms_output_has_no_overlapping_same_class_pairs() {
    let mut rng = StdRng::seed_from_u64(5);
    let nms = NonMaxSuppressor::default();
    let dets = random_detections(&mut rng, 200, 3);
    let kept = nms.suppress(&dets);
    assert!(!kept.is_empty() && kept.len() < dets.len());
    for (i, a) in kept.iter().enumerate() {
        for b in &kept[i + 1..] {
            if a.class_id == b.class_id {
                assert!(iou(&a.bbox, &b.bbox) <= nms.iou_threshold);
            }
        }
    }
}

#[test]
fn different_classes_never_suppress_each_other() {
    let bbox = BBox::new(10.0, 10.0, 50.0, 50.0);
    let dets = [
        Detection {
            bbox,
            score: 0.9,
            class_id: 0,
        },
        Detection {
            bbox,
            score: 0.8,
            class_id: 1,
        },
    ];
    let kept = nms_per_class(&dets, &NonMaxSuppressor::default());
    assert_eq!(kept.len(), 2);
}

#[test]
fn same_class_duplicates_collapse_to_one() {
    let bbox = BBox::new(10.0, 10.0, 50.0, 50.0);
    let dets = [
        Detection {
            bbox,
            score: 0.8,
            class_id: 2,
        },
        Detection {
            bbox,
            score: 0.9,
            class_id: 2,
        },
    ];
    let kept = NonMaxSuppressor::default().suppress(&dets);
    assert_eq!(kept, vec![dets[1]]);
}

#[test]
fn soft_nms_keeps_every_box_with_non_increasing_scores() {
    let mut rng = StdRng::seed_from_u64(9);
    let dets = random_detections(&mut rng, 60, 2);
    let nms = NonMaxSuppressor {
        method: NmsMethod::Soft,
        ..NonMaxSuppressor::default()
    };
    let kept = nms.suppress(&dets);
    assert_eq!(kept.len(), dets.len());
    for det in &kept {
        let original = dets
            .iter()
            .find(|d| d.bbox == det.bbox && d.class_id == det.class_id)
            .unwrap();
        assert!(det.score <= original.score);
        assert!(det.score > 0.0);
    }
}
