//! Postprocessing configuration with YOLOv4 reference defaults.

use crate::batch::OutputSelection;
use crate::candidate::nms::{NmsMethod, NonMaxSuppressor};
use crate::decode::ScaleConfig;
use crate::filter::{DetectionFilter, ScoreActivation};
use crate::util::{YoloPostError, YoloPostResult};

/// What to do when one image of a batch fails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the error of the first failing image for the whole batch.
    #[default]
    FailBatch,
    /// Replace the failing image's result with sentinel padding and report
    /// its index in [`BatchOutput::failed`](crate::BatchOutput::failed).
    SentinelImage,
}

/// Configuration for [`Postprocessor`](crate::Postprocessor).
#[derive(Clone, Debug, PartialEq)]
pub struct PostprocessConfig {
    /// Side length of the square network input.
    pub input_size: usize,
    /// Stride and xy-scale per detection scale, finest first.
    pub scales: Vec<ScaleConfig>,
    /// Minimum (exclusive) `objectness * class_prob` to keep a box.
    pub score_threshold: f32,
    /// IoU above which hard NMS suppresses a box.
    pub iou_threshold: f32,
    /// Hard or soft suppression.
    pub nms_method: NmsMethod,
    /// Gaussian width for soft suppression.
    pub soft_sigma: f32,
    /// Activation applied to objectness and class values.
    pub score_activation: ScoreActivation,
    /// Reject tensors containing NaN or infinite values.
    pub validate_finite: bool,
    /// Per-image failure handling inside a batch.
    pub failure_policy: FailurePolicy,
    /// Output arrays to build.
    pub outputs: OutputSelection,
    /// Process images of a batch in parallel (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            input_size: 416,
            scales: ScaleConfig::yolov4(),
            score_threshold: 0.25,
            iou_threshold: 0.213,
            nms_method: NmsMethod::Hard,
            soft_sigma: 0.3,
            score_activation: ScoreActivation::Identity,
            validate_finite: false,
            failure_policy: FailurePolicy::FailBatch,
            outputs: OutputSelection::default(),
            parallel: false,
        }
    }
}

impl PostprocessConfig {
    /// Returns the filter stage parameters.
    pub fn filter(&self) -> DetectionFilter {
        DetectionFilter {
            score_threshold: self.score_threshold,
            activation: self.score_activation,
        }
    }

    /// Returns the suppression stage parameters.
    pub fn suppressor(&self) -> NonMaxSuppressor {
        NonMaxSuppressor {
            iou_threshold: self.iou_threshold,
            method: self.nms_method,
            sigma: self.soft_sigma,
        }
    }

    /// Checks value ranges. Geometry against the anchors is checked when the
    /// decoder is built.
    pub fn validate(&self) -> YoloPostResult<()> {
        if self.scales.is_empty() {
            return Err(YoloPostError::InvalidConfig {
                reason: "at least one scale is required",
            });
        }
        self.filter().validate()?;
        self.suppressor().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = PostprocessConfig::default();
        assert_eq!(cfg.input_size, 416);
        let strides: Vec<usize> = cfg.scales.iter().map(|s| s.stride).collect();
        assert_eq!(strides, [8, 16, 32]);
        let xy: Vec<f32> = cfg.scales.iter().map(|s| s.xy_scale).collect();
        assert_eq!(xy, [1.2, 1.1, 1.05]);
        assert_eq!(cfg.nms_method, NmsMethod::Hard);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_iou_threshold() {
        let cfg = PostprocessConfig {
            iou_threshold: -0.1,
            ..PostprocessConfig::default()
        };
        assert_eq!(
            cfg.validate().unwrap_err(),
            YoloPostError::InvalidConfig {
                reason: "iou_threshold must be in [0, 1]",
            }
        );
    }
}
