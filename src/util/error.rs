//! Error types for yolopost.

use thiserror::Error;

/// Result alias for yolopost operations.
pub type YoloPostResult<T> = std::result::Result<T, YoloPostError>;

/// Errors that can occur while configuring or running the postprocessor.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum YoloPostError {
    /// A configuration value is out of its valid range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// The anchors source did not contain the expected number of values.
    #[error("anchor count mismatch: expected {expected} values, got {got}")]
    AnchorCount { expected: usize, got: usize },
    /// An anchors token could not be parsed as a float.
    #[error("anchor value {index} is not a number: {token:?}")]
    AnchorParse { index: usize, token: String },
    /// An anchor width or height is not a positive finite number.
    #[error("anchor value {index} must be positive and finite, got {value}")]
    AnchorValue { index: usize, value: f32 },
    /// The number of prediction tensors differs from the configured scales.
    #[error("scale count mismatch: expected {expected}, got {got}")]
    ScaleCount { expected: usize, got: usize },
    /// A prediction tensor has a zero or overflowing dimension.
    #[error("invalid tensor shape [{grid_h}, {grid_w}, {anchors}, {attrs}]")]
    InvalidShape {
        grid_h: usize,
        grid_w: usize,
        anchors: usize,
        attrs: usize,
    },
    /// The backing buffer does not match the declared tensor shape.
    #[error("tensor buffer has {got} values, shape needs {needed}")]
    BufferSize { needed: usize, got: usize },
    /// A prediction tensor disagrees with the model geometry for its scale.
    #[error("scale {scale}: {context} mismatch, expected {expected}, got {got}")]
    ShapeMismatch {
        scale: usize,
        context: &'static str,
        expected: usize,
        got: usize,
    },
    /// The original image shape is empty.
    #[error("invalid image shape {height}x{width}")]
    InvalidImageShape { height: usize, width: usize },
    /// A raw prediction value is NaN or infinite.
    #[error("scale {scale}: non-finite value at offset {offset}")]
    NonFiniteInput { scale: usize, offset: usize },
    /// A class id has no entry in the label table.
    #[error("class id {class_id} out of range for label table of {len}")]
    LabelOutOfRange { class_id: usize, len: usize },
    /// Reading an anchors or labels source failed.
    #[error("io error: {reason}")]
    Io { reason: String },
    /// Processing a specific image of a batch failed.
    #[error("image {index}: {source}")]
    Image {
        index: usize,
        #[source]
        source: Box<YoloPostError>,
    },
}

impl From<std::io::Error> for YoloPostError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}
