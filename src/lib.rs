//! yolopost turns raw multi-scale YOLO detection-head tensors into a padded
//! batch of boxes and labels.
//!
//! The pipeline is CPU-only and stateless per call: anchor decoding with the
//! grid-sensitivity correction, letterbox inversion back to the original
//! image, score filtering, per-class hard or soft NMS, label lookup and batch
//! padding. Images of a batch can be processed in parallel via the `rayon`
//! feature; the `tracing` feature emits spans and stage counters.

pub mod anchors;
pub mod batch;
mod candidate;
pub mod decode;
pub mod filter;
pub mod labels;
pub mod lowlevel;
pub mod mapping;
pub mod pipeline;
pub mod tensor;
mod trace;
pub mod util;

pub use anchors::{Anchor, AnchorSet};
pub use batch::{
    BatchNormalizer, BatchOutput, ImageDetections, OutputSelection, SENTINEL_LABEL, SENTINEL_ROW,
};
pub use candidate::detection::{BBox, Detection};
pub use candidate::nms::{NmsMethod, NonMaxSuppressor};
pub use decode::{AnchorDecoder, ScaleConfig};
pub use filter::{DetectionFilter, ScoreActivation};
pub use labels::LabelTable;
pub use mapping::CoordinateMapper;
pub use pipeline::{FailurePolicy, PostprocessConfig, Postprocessor};
pub use tensor::{ImageInput, ImageShape, PredictionView};
pub use util::{YoloPostError, YoloPostResult};
