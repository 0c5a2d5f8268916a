//! Letterbox inversion from network-input to original-image coordinates.
//!
//! The network input is a square of side `input_size` holding the original
//! image scaled by `ratio = min(input / width, input / height)` and centered
//! with padding `(dw, dh)`. Mapping back subtracts the padding, divides by the
//! ratio and clips to `[0, width - 1] x [0, height - 1]`.

use crate::candidate::detection::BBox;
use crate::decode::CenterBox;
use crate::tensor::ImageShape;

/// Inverse letterbox transform for one original image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CoordinateMapper {
    ratio: f32,
    dw: f32,
    dh: f32,
    max_x: f32,
    max_y: f32,
}

impl CoordinateMapper {
    /// Builds the transform for an image letterboxed into `input_size`.
    pub fn new(shape: ImageShape, input_size: usize) -> Self {
        let input = input_size as f32;
        let width = shape.width as f32;
        let height = shape.height as f32;
        let ratio = (input / width).min(input / height);
        Self {
            ratio,
            dw: (input - ratio * width) / 2.0,
            dh: (input - ratio * height) / 2.0,
            max_x: width - 1.0,
            max_y: height - 1.0,
        }
    }

    /// Returns the letterbox scale factor.
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Returns the horizontal and vertical padding in input pixels.
    pub fn padding(&self) -> (f32, f32) {
        (self.dw, self.dh)
    }

    /// Converts a center-form input box into corner form without clipping.
    pub fn unletterbox(&self, center: CenterBox) -> BBox {
        let half_w = center.w * 0.5;
        let half_h = center.h * 0.5;
        BBox {
            x_min: (center.cx - half_w - self.dw) / self.ratio,
            y_min: (center.cy - half_h - self.dh) / self.ratio,
            x_max: (center.cx + half_w - self.dw) / self.ratio,
            y_max: (center.cy + half_h - self.dh) / self.ratio,
        }
    }

    /// Maps, clips and validates a box.
    ///
    /// A box with a non-finite corner, or whose corners cross after
    /// clipping, is returned as all zeros so the zero-area check downstream
    /// discards it. `f32::max`/`min` would otherwise clip a NaN into a valid
    /// image edge.
    pub fn map(&self, center: CenterBox) -> BBox {
        let raw = self.unletterbox(center);
        if !raw.to_array().iter().all(|v| v.is_finite()) {
            return BBox::default();
        }
        let clipped = BBox {
            x_min: raw.x_min.max(0.0),
            y_min: raw.y_min.max(0.0),
            x_max: raw.x_max.min(self.max_x),
            y_max: raw.y_max.min(self.max_y),
        };
        if clipped.x_min > clipped.x_max || clipped.y_min > clipped.y_max {
            return BBox::default();
        }
        clipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center(cx: f32, cy: f32, w: f32, h: f32) -> CenterBox {
        CenterBox { cx, cy, w, h }
    }

    #[test]
    fn square_input_is_identity_before_clipping() {
        let mapper = CoordinateMapper::new(ImageShape::new(416, 416).unwrap(), 416);
        assert_eq!(mapper.ratio(), 1.0);
        assert_eq!(mapper.padding(), (0.0, 0.0));
        let b = mapper.map(center(100.0, 120.0, 40.0, 20.0));
        assert_eq!(b, BBox::new(80.0, 110.0, 120.0, 130.0));
    }

    #[test]
    fn wide_image_removes_vertical_padding() {
        // 832x416 scales by 0.5 into a 416x208 band padded by 104 rows.
        let mapper = CoordinateMapper::new(ImageShape::new(416, 832).unwrap(), 416);
        assert_eq!(mapper.ratio(), 0.5);
        assert_eq!(mapper.padding(), (0.0, 104.0));
        let b = mapper.map(center(208.0, 208.0, 20.0, 10.0));
        assert_eq!(b, BBox::new(396.0, 198.0, 436.0, 218.0));
    }

    #[test]
    fn clips_to_image_bounds() {
        let mapper = CoordinateMapper::new(ImageShape::new(100, 100).unwrap(), 100);
        let b = mapper.map(center(95.0, 5.0, 20.0, 20.0));
        assert_eq!(b, BBox::new(85.0, 0.0, 99.0, 15.0));
    }

    #[test]
    fn boxes_outside_the_image_are_zeroed() {
        // Everything lands in the bottom padding band of a wide image.
        let mapper = CoordinateMapper::new(ImageShape::new(416, 832).unwrap(), 416);
        let b = mapper.map(center(200.0, 400.0, 10.0, 10.0));
        assert_eq!(b, BBox::default());
    }

    #[test]
    fn non_finite_boxes_are_zeroed() {
        let mapper = CoordinateMapper::new(ImageShape::new(416, 416).unwrap(), 416);
        assert_eq!(mapper.map(center(f32::NAN, 100.0, 20.0, 20.0)), BBox::default());
        assert_eq!(mapper.map(center(100.0, 100.0, f32::INFINITY, 20.0)), BBox::default());
        assert_eq!(mapper.map(center(100.0, f32::NEG_INFINITY, 20.0, 20.0)), BBox::default());
    }
}
