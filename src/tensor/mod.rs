//! Borrowed views over raw detection-head tensors.
//!
//! A `PredictionView` wraps one scale's output for one image: a row-major
//! buffer of shape `[grid_h, grid_w, anchors, attrs]` where each attribute
//! vector is `(tx, ty, tw, th, objectness, class_0, ..., class_{n-1})`.

use crate::util::{YoloPostError, YoloPostResult};

/// Number of leading non-class attributes per anchor slot.
pub const BOX_ATTRS: usize = 5;

/// Borrowed `[grid_h, grid_w, anchors, attrs]` prediction tensor.
#[derive(Copy, Clone, Debug)]
pub struct PredictionView<'a> {
    data: &'a [f32],
    grid_h: usize,
    grid_w: usize,
    anchors: usize,
    attrs: usize,
}

impl<'a> PredictionView<'a> {
    /// Creates a view, checking that `data` holds exactly the declared shape.
    pub fn new(
        data: &'a [f32],
        grid_h: usize,
        grid_w: usize,
        anchors: usize,
        attrs: usize,
    ) -> YoloPostResult<Self> {
        if grid_h == 0 || grid_w == 0 || anchors == 0 || attrs <= BOX_ATTRS {
            return Err(YoloPostError::InvalidShape {
                grid_h,
                grid_w,
                anchors,
                attrs,
            });
        }
        let needed = grid_h
            .checked_mul(grid_w)
            .and_then(|v| v.checked_mul(anchors))
            .and_then(|v| v.checked_mul(attrs))
            .ok_or(YoloPostError::InvalidShape {
                grid_h,
                grid_w,
                anchors,
                attrs,
            })?;
        if data.len() != needed {
            return Err(YoloPostError::BufferSize {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            grid_h,
            grid_w,
            anchors,
            attrs,
        })
    }

    /// Creates a view from a `[grid_h, grid_w, anchors, attrs]` shape array.
    pub fn from_shape(data: &'a [f32], shape: [usize; 4]) -> YoloPostResult<Self> {
        Self::new(data, shape[0], shape[1], shape[2], shape[3])
    }

    /// Returns the grid height (rows).
    pub fn grid_h(&self) -> usize {
        self.grid_h
    }

    /// Returns the grid width (columns).
    pub fn grid_w(&self) -> usize {
        self.grid_w
    }

    /// Returns the number of anchor slots per cell.
    pub fn anchors(&self) -> usize {
        self.anchors
    }

    /// Returns the attribute vector length (`5 + num_classes`).
    pub fn attrs(&self) -> usize {
        self.attrs
    }

    /// Returns the number of class probabilities per slot.
    pub fn num_classes(&self) -> usize {
        self.attrs - BOX_ATTRS
    }

    /// Returns the number of candidate boxes (`grid_h * grid_w * anchors`).
    pub fn num_candidates(&self) -> usize {
        self.grid_h * self.grid_w * self.anchors
    }

    /// Returns the backing slice.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns the attribute vector for cell `(gy, gx)` and anchor `slot`.
    pub fn slot(&self, gy: usize, gx: usize, slot: usize) -> Option<&'a [f32]> {
        if gy >= self.grid_h || gx >= self.grid_w || slot >= self.anchors {
            return None;
        }
        let start = ((gy * self.grid_w + gx) * self.anchors + slot) * self.attrs;
        self.data.get(start..start + self.attrs)
    }

    /// Iterates attribute vectors in cell row-major, then slot order.
    pub fn slots(&self) -> std::slice::ChunksExact<'a, f32> {
        self.data.chunks_exact(self.attrs)
    }

    /// Returns the offset of the first non-finite value, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.data.iter().position(|v| !v.is_finite())
    }
}

/// Original image size before letterboxing, in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageShape {
    /// Image height in pixels.
    pub height: usize,
    /// Image width in pixels.
    pub width: usize,
}

impl ImageShape {
    /// Creates a shape, rejecting empty images.
    pub fn new(height: usize, width: usize) -> YoloPostResult<Self> {
        if height == 0 || width == 0 {
            return Err(YoloPostError::InvalidImageShape { height, width });
        }
        Ok(Self { height, width })
    }
}

/// One image's worth of inputs: a prediction per scale plus its source size.
#[derive(Clone, Debug)]
pub struct ImageInput<'a> {
    /// Prediction tensors in scale order (finest stride first).
    pub predictions: Vec<PredictionView<'a>>,
    /// Size of the image the network input was letterboxed from.
    pub original_shape: ImageShape,
}

impl<'a> ImageInput<'a> {
    /// Bundles per-scale predictions with the original image shape.
    pub fn new(predictions: Vec<PredictionView<'a>>, original_shape: ImageShape) -> Self {
        Self {
            predictions,
            original_shape,
        }
    }
}
