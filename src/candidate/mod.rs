//! Detection boxes and candidate pruning.
//!
//! Holds the corner-form box type, IoU and class-aware non-maximum
//! suppression.

pub(crate) mod detection;
pub(crate) mod iou;
pub(crate) mod nms;
