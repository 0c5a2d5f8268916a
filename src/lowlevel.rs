//! Low-level building blocks for custom postprocessing pipelines.
//!
//! These expose the individual stages behind [`Postprocessor`](crate::Postprocessor)
//! for callers that decode elsewhere or need intermediate results. Most users
//! should prefer the top-level `Postprocessor` API.

pub use crate::candidate::iou::{iou, IOU_FLOOR};
pub use crate::candidate::nms::nms_per_class;
pub use crate::decode::{CenterBox, DecodedCandidate, DecodedPredictions, GridOffsets};
pub use crate::tensor::BOX_ATTRS;
