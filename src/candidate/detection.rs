//! Corner-form boxes and scored detections.

/// Axis-aligned box in corner form, in original-image pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BBox {
    /// Left edge.
    pub x_min: f32,
    /// Top edge.
    pub y_min: f32,
    /// Right edge.
    pub x_max: f32,
    /// Bottom edge.
    pub y_max: f32,
}

impl BBox {
    /// Creates a box from its corners.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Box width; negative for inverted boxes.
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    /// Box height; negative for inverted boxes.
    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Signed area (`width * height`).
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Returns the corners as `[x_min, y_min, x_max, y_max]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

/// A scored, classified box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Detection {
    /// Box in original-image pixels.
    pub bbox: BBox,
    /// Objectness times best class probability.
    pub score: f32,
    /// Index of the best class.
    pub class_id: usize,
}

impl Detection {
    /// Output row `[x_min, y_min, x_max, y_max, score]`.
    pub fn to_row(&self) -> [f32; 5] {
        let [x0, y0, x1, y1] = self.bbox.to_array();
        [x0, y0, x1, y1, self.score]
    }
}
