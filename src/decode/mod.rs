//! Anchor-based decoding of raw detection-head tensors.
//!
//! Each anchor slot of each grid cell predicts `(tx, ty, tw, th)`. The decoded
//! center is `(sigmoid(t) * xy_scale - 0.5 * (xy_scale - 1) + cell) * stride`
//! and the decoded size is `exp(t) * anchor`. Candidates are flattened in
//! scale order, then cell row-major order, then anchor-slot order; downstream
//! tie-breaking relies on that order.

mod grid;

pub use grid::GridOffsets;

use crate::anchors::{Anchor, AnchorSet};
use crate::tensor::{PredictionView, BOX_ATTRS};
use crate::trace::trace_event;
use crate::util::math::sigmoid;
use crate::util::{YoloPostError, YoloPostResult};
use grid::GridBank;

/// Stride and center correction for one detection scale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScaleConfig {
    /// Input pixels per grid cell.
    pub stride: usize,
    /// Grid-sensitivity factor applied to the sigmoid center offset.
    pub xy_scale: f32,
}

impl ScaleConfig {
    /// YOLOv4 defaults: strides 8/16/32 with xy_scale 1.2/1.1/1.05.
    pub fn yolov4() -> Vec<ScaleConfig> {
        vec![
            ScaleConfig {
                stride: 8,
                xy_scale: 1.2,
            },
            ScaleConfig {
                stride: 16,
                xy_scale: 1.1,
            },
            ScaleConfig {
                stride: 32,
                xy_scale: 1.05,
            },
        ]
    }
}

/// Box in center form, in network-input pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CenterBox {
    /// Center x.
    pub cx: f32,
    /// Center y.
    pub cy: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

/// Flat decoded candidates for one image.
///
/// Stored as parallel arrays; class scores are a dense
/// `len() x num_classes` row-major block.
#[derive(Clone, Debug, Default)]
pub struct DecodedPredictions {
    boxes: Vec<CenterBox>,
    objectness: Vec<f32>,
    class_probs: Vec<f32>,
    num_classes: usize,
}

/// Borrowed view of one decoded candidate.
#[derive(Copy, Clone, Debug)]
pub struct DecodedCandidate<'a> {
    /// Decoded box in network-input pixels.
    pub center: CenterBox,
    /// Objectness value as emitted by the network.
    pub objectness: f32,
    /// Per-class values as emitted by the network.
    pub class_probs: &'a [f32],
}

impl DecodedPredictions {
    fn with_capacity(capacity: usize, num_classes: usize) -> Self {
        Self {
            boxes: Vec::with_capacity(capacity),
            objectness: Vec::with_capacity(capacity),
            class_probs: Vec::with_capacity(capacity * num_classes),
            num_classes,
        }
    }

    /// Assembles decoded candidates produced outside [`AnchorDecoder`].
    ///
    /// `class_probs` must hold `boxes.len() * num_classes` values.
    pub fn from_parts(
        boxes: Vec<CenterBox>,
        objectness: Vec<f32>,
        class_probs: Vec<f32>,
        num_classes: usize,
    ) -> YoloPostResult<Self> {
        if objectness.len() != boxes.len() {
            return Err(YoloPostError::BufferSize {
                needed: boxes.len(),
                got: objectness.len(),
            });
        }
        let needed = boxes.len() * num_classes;
        if num_classes == 0 || class_probs.len() != needed {
            return Err(YoloPostError::BufferSize {
                needed,
                got: class_probs.len(),
            });
        }
        Ok(Self {
            boxes,
            objectness,
            class_probs,
            num_classes,
        })
    }

    /// Returns the number of candidates.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true when there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Returns the number of classes per candidate.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns candidate `idx`, if present.
    pub fn get(&self, idx: usize) -> Option<DecodedCandidate<'_>> {
        let center = *self.boxes.get(idx)?;
        let start = idx * self.num_classes;
        Some(DecodedCandidate {
            center,
            objectness: self.objectness[idx],
            class_probs: &self.class_probs[start..start + self.num_classes],
        })
    }

    /// Iterates candidates in flattened order.
    pub fn iter(&self) -> impl Iterator<Item = DecodedCandidate<'_>> + '_ {
        (0..self.len()).filter_map(move |idx| self.get(idx))
    }
}

/// Decodes per-scale predictions into absolute network-input boxes.
pub struct AnchorDecoder {
    anchors: AnchorSet,
    scales: Vec<ScaleConfig>,
    input_size: usize,
    grids: GridBank,
}

impl AnchorDecoder {
    /// Creates a decoder for a square network input of side `input_size`.
    pub fn new(
        anchors: AnchorSet,
        scales: Vec<ScaleConfig>,
        input_size: usize,
    ) -> YoloPostResult<Self> {
        if scales.len() != anchors.num_scales() {
            return Err(YoloPostError::ScaleCount {
                expected: anchors.num_scales(),
                got: scales.len(),
            });
        }
        if input_size == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "input_size must be > 0",
            });
        }
        for scale in &scales {
            if scale.stride == 0 || input_size % scale.stride != 0 {
                return Err(YoloPostError::InvalidConfig {
                    reason: "each stride must be > 0 and divide input_size",
                });
            }
            if !scale.xy_scale.is_finite() || scale.xy_scale <= 0.0 {
                return Err(YoloPostError::InvalidConfig {
                    reason: "xy_scale must be positive and finite",
                });
            }
        }
        let grids = GridBank::new(scales.len());
        Ok(Self {
            anchors,
            scales,
            input_size,
            grids,
        })
    }

    /// Returns the anchor priors.
    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    /// Returns the per-scale configuration.
    pub fn scales(&self) -> &[ScaleConfig] {
        &self.scales
    }

    /// Returns the network input side length.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns the expected grid side for `scale`.
    pub fn grid_size(&self, scale: usize) -> Option<usize> {
        self.scales.get(scale).map(|s| self.input_size / s.stride)
    }

    /// Returns the memoized grid offsets for `scale`.
    pub fn grid_offsets(&self, scale: usize) -> Option<&GridOffsets> {
        let cfg = self.scales.get(scale)?;
        let side = self.input_size / cfg.stride;
        self.grids.get(scale, side, side, cfg.xy_scale)
    }

    /// Checks one image's predictions against the model geometry.
    ///
    /// Returns the shared class count.
    pub fn validate(&self, predictions: &[PredictionView<'_>]) -> YoloPostResult<usize> {
        if predictions.len() != self.scales.len() {
            return Err(YoloPostError::ScaleCount {
                expected: self.scales.len(),
                got: predictions.len(),
            });
        }
        let num_classes = predictions
            .first()
            .map(PredictionView::num_classes)
            .unwrap_or(0);
        for (scale, pred) in predictions.iter().enumerate() {
            let side = self.input_size / self.scales[scale].stride;
            let checks = [
                ("grid height", side, pred.grid_h()),
                ("grid width", side, pred.grid_w()),
                ("anchor slots", self.anchors.anchors_per_scale(), pred.anchors()),
                ("attribute length", num_classes + BOX_ATTRS, pred.attrs()),
            ];
            for (context, expected, got) in checks {
                if expected != got {
                    return Err(YoloPostError::ShapeMismatch {
                        scale,
                        context,
                        expected,
                        got,
                    });
                }
            }
        }
        Ok(num_classes)
    }

    /// Decodes all scales of one image into a flat candidate list.
    pub fn decode(&self, predictions: &[PredictionView<'_>]) -> YoloPostResult<DecodedPredictions> {
        let num_classes = self.validate(predictions)?;
        let total = predictions.iter().map(PredictionView::num_candidates).sum();
        let mut out = DecodedPredictions::with_capacity(total, num_classes);

        for (scale, pred) in predictions.iter().enumerate() {
            let cfg = self.scales[scale];
            let anchors = self
                .anchors
                .scale(scale)
                .ok_or(YoloPostError::ScaleCount {
                    expected: self.anchors.num_scales(),
                    got: scale + 1,
                })?;
            let grid = self
                .grids
                .get(scale, pred.grid_h(), pred.grid_w(), cfg.xy_scale)
                .ok_or(YoloPostError::ScaleCount {
                    expected: self.scales.len(),
                    got: scale + 1,
                })?;
            decode_scale(*pred, cfg, anchors, grid, &mut out);
        }

        trace_event!("decoded_candidates", count = out.len());
        Ok(out)
    }
}

fn decode_scale(
    pred: PredictionView<'_>,
    cfg: ScaleConfig,
    anchors: &[Anchor],
    grid: &GridOffsets,
    out: &mut DecodedPredictions,
) {
    let stride = cfg.stride as f64;
    let xy_scale = cfg.xy_scale as f64;
    let slots_per_cell = pred.anchors();

    for (idx, attrs) in pred.slots().enumerate() {
        let cell = idx / slots_per_cell;
        let anchor = anchors[idx % slots_per_cell];
        let (off_x, off_y) = grid.at(cell);

        let cx = (sigmoid(attrs[0] as f64) * xy_scale + off_x) * stride;
        let cy = (sigmoid(attrs[1] as f64) * xy_scale + off_y) * stride;
        let w = (attrs[2] as f64).exp() * anchor.width as f64;
        let h = (attrs[3] as f64).exp() * anchor.height as f64;

        out.boxes.push(CenterBox {
            cx: cx as f32,
            cy: cy as f32,
            w: w as f32,
            h: h as f32,
        });
        out.objectness.push(attrs[4]);
        out.class_probs.extend_from_slice(&attrs[BOX_ATTRS..]);
    }
}
