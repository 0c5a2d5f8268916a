//! Intersection-over-Union for corner-form boxes.

use crate::candidate::detection::BBox;

/// Lower bound applied to every IoU value.
pub const IOU_FLOOR: f32 = f32::EPSILON;

/// IoU of two boxes, floored at [`IOU_FLOOR`].
///
/// Areas use `(x_max - x_min) * (y_max - y_min)` without a +1 pixel term. A
/// zero union yields the floor instead of a division by zero.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let inter_w = (a.x_max.min(b.x_max) - a.x_min.max(b.x_min)).max(0.0);
    let inter_h = (a.y_max.min(b.y_max) - a.y_min.max(b.y_min)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return IOU_FLOOR;
    }
    (inter / union).max(IOU_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::{iou, IOU_FLOOR};
    use crate::candidate::detection::BBox;

    #[test]
    fn identical_boxes_have_unit_iou() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn half_overlap_matches_closed_form() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_and_degenerate_boxes_hit_the_floor() {
        let a = BBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BBox::new(5.0, 5.0, 6.0, 6.0);
        assert_eq!(iou(&a, &b), IOU_FLOOR);
        let z = BBox::default();
        assert_eq!(iou(&z, &z), IOU_FLOOR);
    }
}
