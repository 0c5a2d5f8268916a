//! Anchor box priors grouped by detection scale.
//!
//! The on-disk format is a single line of comma-separated floats laid out
//! row-major as `[scale][anchor][width, height]`. The YOLOv4 head uses three
//! scales with three anchors each, so a valid file holds exactly 18 values.

use crate::util::{YoloPostError, YoloPostResult};
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

/// Number of detection scales in the standard anchors file.
pub const DEFAULT_NUM_SCALES: usize = 3;
/// Number of anchors per scale in the standard anchors file.
pub const DEFAULT_ANCHORS_PER_SCALE: usize = 3;

/// Width and height of one anchor prior, in network-input pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Anchor {
    /// Prior width in pixels.
    pub width: f32,
    /// Prior height in pixels.
    pub height: f32,
}

/// Immutable anchor priors, `anchors_per_scale` per detection scale.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
    num_scales: usize,
    anchors_per_scale: usize,
}

impl AnchorSet {
    /// Builds a set from flat `(width, height)` pairs in scale-major order.
    pub fn new(
        values: &[f32],
        num_scales: usize,
        anchors_per_scale: usize,
    ) -> YoloPostResult<Self> {
        if num_scales == 0 || anchors_per_scale == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "anchor set needs at least one scale and one anchor",
            });
        }
        let expected = num_scales * anchors_per_scale * 2;
        if values.len() != expected {
            return Err(YoloPostError::AnchorCount {
                expected,
                got: values.len(),
            });
        }
        if let Some((index, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(YoloPostError::AnchorValue { index, value });
        }

        let anchors = values
            .chunks_exact(2)
            .map(|pair| Anchor {
                width: pair[0],
                height: pair[1],
            })
            .collect();
        Ok(Self {
            anchors,
            num_scales,
            anchors_per_scale,
        })
    }

    /// Reads the first line of an anchors file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> YoloPostResult<Self> {
        let file = std::fs::File::open(path)?;
        let mut line = String::new();
        std::io::BufReader::new(file).read_line(&mut line)?;
        line.parse()
    }

    /// Returns the number of detection scales.
    pub fn num_scales(&self) -> usize {
        self.num_scales
    }

    /// Returns the number of anchors per scale.
    pub fn anchors_per_scale(&self) -> usize {
        self.anchors_per_scale
    }

    /// Returns the anchors for one scale.
    pub fn scale(&self, scale: usize) -> Option<&[Anchor]> {
        let start = scale.checked_mul(self.anchors_per_scale)?;
        self.anchors.get(start..start + self.anchors_per_scale)
    }

    /// Returns the anchor for `(scale, slot)`.
    pub fn get(&self, scale: usize, slot: usize) -> Option<Anchor> {
        if slot >= self.anchors_per_scale {
            return None;
        }
        self.scale(scale).map(|anchors| anchors[slot])
    }
}

impl FromStr for AnchorSet {
    type Err = YoloPostError;

    /// Parses one line of comma-separated values into a 3x3 anchor set.
    fn from_str(line: &str) -> YoloPostResult<Self> {
        let mut values = Vec::with_capacity(DEFAULT_NUM_SCALES * DEFAULT_ANCHORS_PER_SCALE * 2);
        for (index, token) in line.trim().split(',').enumerate() {
            let token = token.trim();
            let value = token
                .parse::<f32>()
                .map_err(|_| YoloPostError::AnchorParse {
                    index,
                    token: token.to_owned(),
                })?;
            values.push(value);
        }
        Self::new(&values, DEFAULT_NUM_SCALES, DEFAULT_ANCHORS_PER_SCALE)
    }
}
