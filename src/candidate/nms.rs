//! Per-class greedy and soft non-maximum suppression.

use crate::candidate::detection::Detection;
use crate::candidate::iou::iou;
use crate::util::{YoloPostError, YoloPostResult};
use std::collections::BTreeMap;

/// Suppression rule applied to candidates overlapping a kept box.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NmsMethod {
    /// Zero the score of candidates with IoU above the threshold.
    #[default]
    Hard,
    /// Decay scores by `exp(-iou^2 / sigma)`.
    Soft,
}

/// Class-aware IoU suppressor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NonMaxSuppressor {
    /// IoU above which hard suppression removes a candidate.
    pub iou_threshold: f32,
    /// Hard or soft suppression.
    pub method: NmsMethod,
    /// Gaussian width for soft suppression.
    pub sigma: f32,
}

impl Default for NonMaxSuppressor {
    fn default() -> Self {
        Self {
            iou_threshold: 0.213,
            method: NmsMethod::Hard,
            sigma: 0.3,
        }
    }
}

impl NonMaxSuppressor {
    /// Checks threshold and sigma ranges.
    pub fn validate(&self) -> YoloPostResult<()> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(YoloPostError::InvalidConfig {
                reason: "iou_threshold must be in [0, 1]",
            });
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "soft_sigma must be positive and finite",
            });
        }
        Ok(())
    }

    /// Runs suppression independently for every class present.
    pub fn suppress(&self, detections: &[Detection]) -> Vec<Detection> {
        nms_per_class(detections, self)
    }
}

/// Applies greedy per-class suppression.
///
/// Classes are processed in ascending id order. Within a class the highest
/// remaining score is kept first; equal scores resolve to the earliest input
/// index. Kept detections carry the score they had when selected, which for
/// soft suppression may already be decayed. Boxes of different classes never
/// interact.
pub fn nms_per_class(detections: &[Detection], params: &NonMaxSuppressor) -> Vec<Detection> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, det) in detections.iter().enumerate() {
        by_class.entry(det.class_id).or_default().push(idx);
    }

    let mut scores: Vec<f32> = detections.iter().map(|d| d.score).collect();
    let mut active = vec![true; detections.len()];
    let mut kept = Vec::new();

    for members in by_class.values() {
        loop {
            let mut best: Option<usize> = None;
            for &idx in members {
                if active[idx] && best.map_or(true, |b| scores[idx] > scores[b]) {
                    best = Some(idx);
                }
            }
            let Some(best) = best else {
                break;
            };
            active[best] = false;
            kept.push(Detection {
                score: scores[best],
                ..detections[best]
            });

            let best_box = detections[best].bbox;
            for &idx in members {
                if !active[idx] {
                    continue;
                }
                let overlap = iou(&best_box, &detections[idx].bbox);
                match params.method {
                    NmsMethod::Hard => {
                        if overlap > params.iou_threshold {
                            scores[idx] = 0.0;
                        }
                    }
                    NmsMethod::Soft => {
                        scores[idx] *= (-(overlap * overlap) / params.sigma).exp();
                    }
                }
                if !(scores[idx] > 0.0) {
                    active[idx] = false;
                }
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::detection::BBox;

    fn det(x0: f32, y0: f32, x1: f32, y1: f32, score: f32, class_id: usize) -> Detection {
        Detection {
            bbox: BBox::new(x0, y0, x1, y1),
            score,
            class_id,
        }
    }

    #[test]
    fn hard_nms_keeps_best_of_overlapping_pair() {
        let dets = [
            det(0.0, 0.0, 10.0, 10.0, 0.6, 0),
            det(1.0, 1.0, 11.0, 11.0, 0.9, 0),
            det(50.0, 50.0, 60.0, 60.0, 0.4, 0),
        ];
        let kept = NonMaxSuppressor::default().suppress(&dets);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], dets[1]);
        assert_eq!(kept[1], dets[2]);
    }

    #[test]
    fn ties_resolve_to_earliest_index() {
        let dets = [
            det(0.0, 0.0, 10.0, 10.0, 0.5, 3),
            det(0.0, 0.0, 10.0, 10.5, 0.5, 3),
        ];
        let kept = NonMaxSuppressor::default().suppress(&dets);
        assert_eq!(kept, vec![dets[0]]);
    }

    #[test]
    fn classes_are_emitted_in_ascending_order() {
        let dets = [
            det(0.0, 0.0, 10.0, 10.0, 0.5, 7),
            det(0.0, 0.0, 10.0, 10.0, 0.9, 2),
        ];
        let kept = NonMaxSuppressor::default().suppress(&dets);
        assert_eq!(kept.iter().map(|d| d.class_id).collect::<Vec<_>>(), [2, 7]);
    }

    #[test]
    fn soft_nms_decays_instead_of_removing() {
        let dets = [
            det(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            det(0.0, 0.0, 10.0, 10.0, 0.8, 0),
        ];
        let nms = NonMaxSuppressor {
            method: NmsMethod::Soft,
            ..NonMaxSuppressor::default()
        };
        let kept = nms.suppress(&dets);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        let expected = 0.8 * (-1.0f32 / 0.3).exp();
        assert!((kept[1].score - expected).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_bad_sigma() {
        let nms = NonMaxSuppressor {
            sigma: 0.0,
            ..NonMaxSuppressor::default()
        };
        assert!(nms.validate().is_err());
    }
}
