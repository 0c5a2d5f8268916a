use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use yolopost::{
    AnchorSet, BatchOutput, FailurePolicy, ImageInput, ImageShape, LabelTable, NmsMethod,
    OutputSelection, PostprocessConfig, Postprocessor, PredictionView, ScaleConfig,
    ScoreActivation, YoloPostResult,
};

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO detection postprocessing (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for the pipeline stages.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NmsMethodConfig {
    Hard,
    Soft,
}

impl From<NmsMethodConfig> for NmsMethod {
    fn from(value: NmsMethodConfig) -> Self {
        match value {
            NmsMethodConfig::Hard => NmsMethod::Hard,
            NmsMethodConfig::Soft => NmsMethod::Soft,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ActivationConfig {
    Identity,
    Logit,
}

impl From<ActivationConfig> for ScoreActivation {
    fn from(value: ActivationConfig) -> Self {
        match value {
            ActivationConfig::Identity => ScoreActivation::Identity,
            ActivationConfig::Logit => ScoreActivation::Logit,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FailurePolicyConfig {
    FailBatch,
    SentinelImage,
}

impl From<FailurePolicyConfig> for FailurePolicy {
    fn from(value: FailurePolicyConfig) -> Self {
        match value {
            FailurePolicyConfig::FailBatch => FailurePolicy::FailBatch,
            FailurePolicyConfig::SentinelImage => FailurePolicy::SentinelImage,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OutputsJson {
    boxes: bool,
    labels: bool,
}

impl Default for OutputsJson {
    fn default() -> Self {
        let outputs = OutputSelection::default();
        Self {
            boxes: outputs.boxes,
            labels: outputs.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PostprocessJson {
    input_size: usize,
    strides: Vec<usize>,
    xy_scale: Vec<f32>,
    score_threshold: f32,
    iou_threshold: f32,
    nms_method: NmsMethodConfig,
    soft_sigma: f32,
    score_activation: ActivationConfig,
    validate_finite: bool,
    failure_policy: FailurePolicyConfig,
    outputs: OutputsJson,
    parallel: bool,
}

impl Default for PostprocessJson {
    fn default() -> Self {
        let cfg = PostprocessConfig::default();
        Self {
            input_size: cfg.input_size,
            strides: cfg.scales.iter().map(|s| s.stride).collect(),
            xy_scale: cfg.scales.iter().map(|s| s.xy_scale).collect(),
            score_threshold: cfg.score_threshold,
            iou_threshold: cfg.iou_threshold,
            nms_method: NmsMethodConfig::Hard,
            soft_sigma: cfg.soft_sigma,
            score_activation: ActivationConfig::Identity,
            validate_finite: cfg.validate_finite,
            failure_policy: FailurePolicyConfig::FailBatch,
            outputs: OutputsJson::default(),
            parallel: cfg.parallel,
        }
    }
}

impl PostprocessJson {
    fn into_config(self) -> Result<PostprocessConfig, Box<dyn std::error::Error>> {
        if self.strides.len() != self.xy_scale.len() {
            return Err("strides and xy_scale must have the same length".into());
        }
        let scales = self
            .strides
            .into_iter()
            .zip(self.xy_scale)
            .map(|(stride, xy_scale)| ScaleConfig { stride, xy_scale })
            .collect();
        Ok(PostprocessConfig {
            input_size: self.input_size,
            scales,
            score_threshold: self.score_threshold,
            iou_threshold: self.iou_threshold,
            nms_method: self.nms_method.into(),
            soft_sigma: self.soft_sigma,
            score_activation: self.score_activation.into(),
            validate_finite: self.validate_finite,
            failure_policy: self.failure_policy.into(),
            outputs: OutputSelection {
                boxes: self.outputs.boxes,
                labels: self.outputs.labels,
            },
            parallel: self.parallel,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    anchors_path: String,
    labels_path: Option<String>,
    input_path: String,
    output_path: Option<String>,
    postprocess: PostprocessJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anchors_path: String::new(),
            labels_path: None,
            input_path: String::new(),
            output_path: None,
            postprocess: PostprocessJson::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TensorJson {
    shape: [usize; 4],
    data: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ImageJson {
    /// Original image `[height, width]`.
    original_hw: [usize; 2],
    predictions: Vec<TensorJson>,
}

#[derive(Debug, Deserialize)]
struct BatchJson {
    images: Vec<ImageJson>,
}

#[derive(Debug, Serialize)]
struct Output {
    batch_size: usize,
    slots: usize,
    bboxes: Option<Vec<Vec<[f32; 5]>>>,
    labels: Option<Vec<Vec<String>>>,
    counts: Vec<usize>,
    failed: Vec<usize>,
}

impl From<&BatchOutput> for Output {
    fn from(value: &BatchOutput) -> Self {
        let per_image = |idx| value.image_boxes(idx).map(<[[f32; 5]]>::to_vec);
        let bboxes = value
            .boxes()
            .map(|_| (0..value.batch_size()).filter_map(per_image).collect());
        let labels = value.labels().map(|_| {
            (0..value.batch_size())
                .filter_map(|idx| value.image_labels(idx).map(<[String]>::to_vec))
                .collect()
        });
        Self {
            batch_size: value.batch_size(),
            slots: value.slots(),
            bboxes,
            labels,
            counts: value.counts().to_vec(),
            failed: value.failed().to_vec(),
        }
    }
}

/// Builds each image's input separately; a malformed image is left to the
/// batch failure policy.
fn build_inputs(batch: &BatchJson) -> Vec<YoloPostResult<ImageInput<'_>>> {
    batch
        .images
        .iter()
        .map(|image| {
            let predictions = image
                .predictions
                .iter()
                .map(|t| PredictionView::from_shape(&t.data, t.shape))
                .collect::<YoloPostResult<Vec<_>>>()?;
            let shape = ImageShape::new(image.original_hw[0], image.original_hw[1])?;
            Ok(ImageInput::new(predictions, shape))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("yolopost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.anchors_path.is_empty() || config.input_path.is_empty() {
        return Err("anchors_path and input_path must be set in the config".into());
    }

    let anchors = AnchorSet::from_path(&config.anchors_path)?;
    let labels = match &config.labels_path {
        Some(path) => LabelTable::from_path(path)?,
        None => LabelTable::coco(),
    };
    let postprocessor = Postprocessor::new(anchors, labels, config.postprocess.into_config()?)?;

    let batch_text = fs::read_to_string(&config.input_path)?;
    let batch: BatchJson = serde_json::from_str(&batch_text)?;
    let inputs = build_inputs(&batch);
    let result = postprocessor.process_built_batch(&inputs)?;
    tracing::info!(
        images = result.batch_size(),
        slots = result.slots(),
        failed = result.failed().len(),
        "batch processed"
    );
    let json = serde_json::to_string_pretty(&Output::from(&result))?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
