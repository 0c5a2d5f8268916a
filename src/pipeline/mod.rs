//! End-to-end postprocessing for single images and batches.
//!
//! `Postprocessor` owns the immutable model state (anchors, scale geometry,
//! memoized grids, label table) and runs decode, letterbox mapping,
//! filtering, per-class NMS and label lookup for each image. Images share no
//! mutable state, so a batch can be processed with a parallel map when the
//! `rayon` feature is enabled.

mod config;

pub use config::{FailurePolicy, PostprocessConfig};

use crate::anchors::AnchorSet;
use crate::batch::{BatchNormalizer, BatchOutput, ImageDetections};
use crate::candidate::detection::Detection;
use crate::candidate::nms::NonMaxSuppressor;
use crate::decode::AnchorDecoder;
use crate::filter::DetectionFilter;
use crate::labels::LabelTable;
use crate::mapping::CoordinateMapper;
use crate::tensor::ImageInput;
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{YoloPostError, YoloPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Immutable postprocessing pipeline for one detection model.
pub struct Postprocessor {
    decoder: AnchorDecoder,
    labels: LabelTable,
    filter: DetectionFilter,
    nms: NonMaxSuppressor,
    normalizer: BatchNormalizer,
    cfg: PostprocessConfig,
}

impl Postprocessor {
    /// Validates the configuration against the anchors and builds the pipeline.
    pub fn new(
        anchors: AnchorSet,
        labels: LabelTable,
        cfg: PostprocessConfig,
    ) -> YoloPostResult<Self> {
        cfg.validate()?;
        let decoder = AnchorDecoder::new(anchors, cfg.scales.clone(), cfg.input_size)?;
        Ok(Self {
            decoder,
            labels,
            filter: cfg.filter(),
            nms: cfg.suppressor(),
            normalizer: BatchNormalizer {
                outputs: cfg.outputs,
            },
            cfg,
        })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &PostprocessConfig {
        &self.cfg
    }

    /// Returns the anchor decoder.
    pub fn decoder(&self) -> &AnchorDecoder {
        &self.decoder
    }

    /// Returns the label table.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Runs decode, mapping, filtering and NMS for one image.
    pub fn detect(&self, input: &ImageInput<'_>) -> YoloPostResult<Vec<Detection>> {
        let shape = input.original_shape;
        if shape.height == 0 || shape.width == 0 {
            return Err(YoloPostError::InvalidImageShape {
                height: shape.height,
                width: shape.width,
            });
        }
        if self.cfg.validate_finite {
            for (scale, pred) in input.predictions.iter().enumerate() {
                if let Some(offset) = pred.first_non_finite() {
                    return Err(YoloPostError::NonFiniteInput { scale, offset });
                }
            }
        }

        let decoded = self.decoder.decode(&input.predictions)?;
        let mapper = CoordinateMapper::new(shape, self.decoder.input_size());
        let candidates = self.filter.apply(&decoded, &mapper);
        let kept = self.nms.suppress(&candidates);
        trace_event!("kept_detections", count = kept.len());
        Ok(kept)
    }

    /// Runs the full per-image pipeline including label lookup.
    pub fn process_image(&self, input: &ImageInput<'_>) -> YoloPostResult<ImageDetections> {
        let _span = trace_span!("process_image", scales = input.predictions.len()).entered();
        let detections = self.detect(input)?;
        let labels = if self.cfg.outputs.labels {
            detections
                .iter()
                .map(|det| self.labels.name(det.class_id).map(str::to_owned))
                .collect::<YoloPostResult<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(ImageDetections { detections, labels })
    }

    /// Processes a batch and pads the results into one rectangular output.
    pub fn process_batch(&self, inputs: &[ImageInput<'_>]) -> YoloPostResult<BatchOutput> {
        let _span = trace_span!("process_batch", batch = inputs.len()).entered();
        let results = self.run_images(inputs, |input| self.process_image(input));
        self.assemble(results)
    }

    /// Processes a batch whose per-image inputs may have failed to build.
    ///
    /// An `Err` entry counts as a failure of that image, so the configured
    /// [`FailurePolicy`] applies to it like any pipeline error.
    pub fn process_built_batch(
        &self,
        inputs: &[YoloPostResult<ImageInput<'_>>],
    ) -> YoloPostResult<BatchOutput> {
        let _span = trace_span!("process_batch", batch = inputs.len()).entered();
        let results = self.run_images(inputs, |input| match input {
            Ok(input) => self.process_image(input),
            Err(err) => Err(err.clone()),
        });
        self.assemble(results)
    }

    fn assemble(
        &self,
        results: Vec<YoloPostResult<ImageDetections>>,
    ) -> YoloPostResult<BatchOutput> {
        let mut images = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(image) => images.push(image),
                Err(err) => match self.cfg.failure_policy {
                    FailurePolicy::FailBatch => {
                        return Err(YoloPostError::Image {
                            index,
                            source: Box::new(err),
                        });
                    }
                    FailurePolicy::SentinelImage => {
                        trace_warn!(
                            "image_substituted",
                            index = index,
                            reason = err.to_string().as_str()
                        );
                        failed.push(index);
                        images.push(ImageDetections::default());
                    }
                },
            }
        }

        let output = self.normalizer.normalize(&images).with_failed(failed);
        trace_event!(
            "batch_normalized",
            images = output.batch_size(),
            slots = output.slots()
        );
        Ok(output)
    }

    fn run_images<T, F>(&self, inputs: &[T], run: F) -> Vec<YoloPostResult<ImageDetections>>
    where
        T: Sync,
        F: Fn(&T) -> YoloPostResult<ImageDetections> + Sync,
    {
        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return inputs.par_iter().map(&run).collect();
        }
        inputs.iter().map(&run).collect()
    }
}
