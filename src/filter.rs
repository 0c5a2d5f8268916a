//! Score and extent filtering of decoded candidates.

use crate::candidate::detection::Detection;
use crate::decode::DecodedPredictions;
use crate::mapping::CoordinateMapper;
use crate::trace::trace_event;
use crate::util::math::{argmax_first, sigmoid};
use crate::util::{YoloPostError, YoloPostResult};

/// How objectness and class values are turned into probabilities.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ScoreActivation {
    /// Values are already probabilities (the exported YOLOv4 heads).
    #[default]
    Identity,
    /// Values are logits; apply the logistic function first.
    Logit,
}

impl ScoreActivation {
    #[inline]
    fn apply(self, value: f32) -> f32 {
        match self {
            ScoreActivation::Identity => value,
            ScoreActivation::Logit => sigmoid(value as f64) as f32,
        }
    }
}

/// Drops degenerate and low-confidence candidates and assigns classes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DetectionFilter {
    /// Detections must score strictly above this value.
    pub score_threshold: f32,
    /// Activation applied to objectness and class values.
    pub activation: ScoreActivation,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            score_threshold: 0.25,
            activation: ScoreActivation::Identity,
        }
    }
}

impl DetectionFilter {
    /// Checks the score threshold range.
    pub fn validate(&self) -> YoloPostResult<()> {
        if !self.score_threshold.is_finite() || !(0.0..1.0).contains(&self.score_threshold) {
            return Err(YoloPostError::InvalidConfig {
                reason: "score_threshold must be in [0, 1)",
            });
        }
        Ok(())
    }

    /// Maps every candidate to image space and keeps the confident ones.
    ///
    /// A box survives when `sqrt(area)` lies in `(0, inf)` and
    /// `objectness * class_prob[argmax] > score_threshold`. Output keeps the
    /// flattened candidate order.
    pub fn apply(&self, decoded: &DecodedPredictions, mapper: &CoordinateMapper) -> Vec<Detection> {
        let mut out = Vec::new();
        for candidate in decoded.iter() {
            let bbox = mapper.map(candidate.center);
            let scale = bbox.area().sqrt();
            if !(scale > 0.0 && scale < f32::INFINITY) {
                continue;
            }

            let Some(class_id) = argmax_first(candidate.class_probs) else {
                continue;
            };
            let objectness = self.activation.apply(candidate.objectness);
            let class_prob = self.activation.apply(candidate.class_probs[class_id]);
            let score = objectness * class_prob;
            if score > self.score_threshold {
                out.push(Detection {
                    bbox,
                    score,
                    class_id,
                });
            }
        }
        trace_event!("filtered_detections", count = out.len());
        out
    }
}
