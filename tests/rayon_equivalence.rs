#![cfg(feature = "rayon")]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use yolopost::{
    AnchorSet, ImageInput, ImageShape, LabelTable, NmsMethod, PostprocessConfig, Postprocessor,
    PredictionView, ScaleConfig,
};

const ANCHORS: &str = "12,16, 19,36, 40,28, 36,75, 76,55, 72,146, 142,110, 192,243, 459,401";
const INPUT: usize = 128;
const ATTRS: usize = 5 + 4;

fn random_heads(rng: &mut StdRng) -> Vec<Vec<f32>> {
    ScaleConfig::yolov4()
        .iter()
        .map(|s| {
            let side = INPUT / s.stride;
            let mut data = vec![0.0f32; side * side * 3 * ATTRS];
            for slot in data.chunks_exact_mut(ATTRS) {
                for v in &mut slot[..4] {
                    *v = rng.random_range(-2.0f32..2.0);
                }
                for v in &mut slot[4..] {
                    *v = rng.random_range(0.0f32..1.0);
                }
            }
            data
        })
        .collect()
}

fn input<'a>(heads: &'a [Vec<f32>], shape: ImageShape) -> ImageInput<'a> {
    let preds = heads
        .iter()
        .zip(ScaleConfig::yolov4())
        .map(|(data, s)| {
            let side = INPUT / s.stride;
            PredictionView::new(data, side, side, 3, ATTRS).unwrap()
        })
        .collect();
    ImageInput::new(preds, shape)
}

fn run(parallel: bool, method: NmsMethod, inputs: &[ImageInput<'_>]) -> yolopost::BatchOutput {
    let anchors: AnchorSet = ANCHORS.parse().unwrap();
    let cfg = PostprocessConfig {
        input_size: INPUT,
        nms_method: method,
        parallel,
        ..PostprocessConfig::default()
    };
    Postprocessor::new(anchors, LabelTable::coco(), cfg)
        .unwrap()
        .process_batch(inputs)
        .unwrap()
}

#[test]
fn parallel_batch_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(42);
    let heads: Vec<_> = (0..6).map(|_| random_heads(&mut rng)).collect();
    let shapes = [(128, 128), (480, 640), (640, 480), (1, 300), (300, 1), (77, 77)];
    let inputs: Vec<_> = heads
        .iter()
        .zip(shapes)
        .map(|(h, (height, width))| input(h, ImageShape::new(height, width).unwrap()))
        .collect();

    for method in [NmsMethod::Hard, NmsMethod::Soft] {
        let sequential = run(false, method, &inputs);
        let parallel = run(true, method, &inputs);
        assert!(sequential.counts().iter().any(|&c| c > 0));
        assert_eq!(sequential, parallel);
    }
}
