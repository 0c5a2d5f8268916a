//! Padding per-image results into one rectangular batch.
//!
//! Every image is padded to the largest detection count in the batch with
//! sentinel rows `[-1, -1, -1, -1, -1]` labelled `"0"`. A batch without any
//! detection still has one slot per image, filled with the sentinel. The
//! per-image `counts` tell real rows from padding without relying on the
//! sentinel values.

use crate::candidate::detection::Detection;

/// Box row used for padding slots.
pub const SENTINEL_ROW: [f32; 5] = [-1.0; 5];
/// Label used for padding slots.
pub const SENTINEL_LABEL: &str = "0";

/// Which output arrays to materialize.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutputSelection {
    /// Emit the `[x_min, y_min, x_max, y_max, score]` array.
    pub boxes: bool,
    /// Emit the label array (requires label lookup).
    pub labels: bool,
}

impl Default for OutputSelection {
    fn default() -> Self {
        Self {
            boxes: true,
            labels: true,
        }
    }
}

/// Final detections of one image, with labels when requested.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageDetections {
    /// Kept detections in suppression order.
    pub detections: Vec<Detection>,
    /// Class names parallel to `detections`, or empty when not requested.
    pub labels: Vec<String>,
}

impl ImageDetections {
    /// Returns the number of real detections.
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Returns true when the image has no detections.
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Rectangular `(batch, slots, 5)` boxes and `(batch, slots)` labels.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutput {
    batch_size: usize,
    slots: usize,
    boxes: Option<Vec<[f32; 5]>>,
    labels: Option<Vec<String>>,
    counts: Vec<usize>,
    failed: Vec<usize>,
}

impl BatchOutput {
    /// Returns the number of images.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the number of slots per image.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Returns all box rows, image-major, if boxes were requested.
    pub fn boxes(&self) -> Option<&[[f32; 5]]> {
        self.boxes.as_deref()
    }

    /// Returns all labels, image-major, if labels were requested.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Returns the box rows of image `idx`.
    pub fn image_boxes(&self, idx: usize) -> Option<&[[f32; 5]]> {
        let start = idx.checked_mul(self.slots)?;
        self.boxes.as_ref()?.get(start..start + self.slots)
    }

    /// Returns the labels of image `idx`.
    pub fn image_labels(&self, idx: usize) -> Option<&[String]> {
        let start = idx.checked_mul(self.slots)?;
        self.labels.as_ref()?.get(start..start + self.slots)
    }

    /// Number of real (non-padding) rows per image.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Indices of images replaced by an empty result after a failure.
    pub fn failed(&self) -> &[usize] {
        &self.failed
    }

    pub(crate) fn with_failed(mut self, failed: Vec<usize>) -> Self {
        self.failed = failed;
        self
    }
}

/// Pads per-image detection lists to a common length.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchNormalizer {
    /// Arrays to materialize.
    pub outputs: OutputSelection,
}

impl BatchNormalizer {
    /// Builds the rectangular batch output.
    pub fn normalize(&self, images: &[ImageDetections]) -> BatchOutput {
        let max_count = images.iter().map(ImageDetections::len).max().unwrap_or(0);
        let slots = max_count.max(1);
        let batch_size = images.len();

        let boxes = self.outputs.boxes.then(|| {
            let mut rows = Vec::with_capacity(batch_size * slots);
            for image in images {
                let start = rows.len();
                rows.extend(image.detections.iter().map(Detection::to_row));
                rows.resize(start + slots, SENTINEL_ROW);
            }
            rows
        });

        let labels = self.outputs.labels.then(|| {
            let mut names = Vec::with_capacity(batch_size * slots);
            for image in images {
                let start = names.len();
                names.extend(image.labels.iter().take(image.len()).cloned());
                names.resize(start + slots, SENTINEL_LABEL.to_owned());
            }
            names
        });

        BatchOutput {
            batch_size,
            slots,
            boxes,
            labels,
            counts: images.iter().map(ImageDetections::len).collect(),
            failed: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::detection::BBox;

    fn image(n: usize) -> ImageDetections {
        let detections: Vec<Detection> = (0..n)
            .map(|i| Detection {
                bbox: BBox::new(i as f32, 0.0, i as f32 + 1.0, 1.0),
                score: 0.5,
                class_id: 0,
            })
            .collect();
        let labels = vec!["person".to_owned(); n];
        ImageDetections { detections, labels }
    }

    #[test]
    fn pads_to_longest_image() {
        let out = BatchNormalizer::default().normalize(&[image(2), image(0), image(1)]);
        assert_eq!(out.batch_size(), 3);
        assert_eq!(out.slots(), 2);
        assert_eq!(out.boxes().unwrap().len(), 6);
        assert_eq!(out.counts(), &[2, 0, 1]);
        assert_eq!(out.image_boxes(1).unwrap(), &[SENTINEL_ROW, SENTINEL_ROW]);
        assert_eq!(out.image_boxes(2).unwrap()[0], [0.0, 0.0, 1.0, 1.0, 0.5]);
        assert_eq!(out.image_boxes(2).unwrap()[1], SENTINEL_ROW);
        assert_eq!(out.image_labels(2).unwrap(), &["person", "0"]);
    }

    #[test]
    fn labels_can_be_skipped() {
        let normalizer = BatchNormalizer {
            outputs: OutputSelection {
                boxes: true,
                labels: false,
            },
        };
        let out = normalizer.normalize(&[image(1)]);
        assert!(out.labels().is_none());
        assert!(out.image_labels(0).is_none());
        assert_eq!(out.image_boxes(0).unwrap().len(), 1);
    }
}
