//! Immutable class-id to name lookup.

use crate::util::{YoloPostError, YoloPostResult};
use std::io::BufRead;
use std::path::Path;

const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "aeroplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic_light",
    "fire_hydrant",
    "stop_sign",
    "parking_meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports_ball",
    "kite",
    "baseball_bat",
    "baseball_glove",
    "skateboard",
    "surfboard",
    "tennis_racket",
    "bottle",
    "wine_glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot_dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "sofa",
    "pottedplant",
    "bed",
    "diningtable",
    "toilet",
    "tvmonitor",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell_phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy_bear",
    "hair_drier",
    "toothbrush",
];

/// Ordered class names; the index is the class id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    /// Creates a table from names in class-id order.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// The 80 COCO classes as lowercase names.
    pub fn coco() -> Self {
        Self::new(COCO_NAMES.iter().map(|&n| n.to_owned()).collect())
    }

    /// Reads one name per line; trailing newlines are stripped.
    pub fn from_reader<R: BufRead>(reader: R) -> YoloPostResult<Self> {
        let names = reader
            .lines()
            .map(|line| line.map(|l| l.trim_end_matches('\r').to_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(names))
    }

    /// Reads a class-names file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> YoloPostResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Returns the number of classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Looks up a class name.
    pub fn name(&self, class_id: usize) -> YoloPostResult<&str> {
        self.names
            .get(class_id)
            .map(String::as_str)
            .ok_or(YoloPostError::LabelOutOfRange {
                class_id,
                len: self.names.len(),
            })
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::coco()
    }
}
