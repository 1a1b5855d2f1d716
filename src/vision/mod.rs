//! Vision/OCR Layer
//!
//! Holds the recognized words for each document image and talks to the
//! external OCR service that produces them. Coordinates are always
//! normalized fractions of the image size (0.0 - 1.0).

pub mod consensus;
pub mod ocr;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use consensus::{vote, Consensus};
pub use ocr::{HttpOcrClient, OcrError, OcrPage, OcrService};

/// Default vertical bucket used to group words into lines
pub const DEFAULT_LINE_BUCKET: f64 = 0.1;

/// Axis-aligned bounding box in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Create a box from two corners, in any order
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x_min: x1.min(x2),
            y_min: y1.min(y2),
            x_max: x1.max(x2),
            y_max: y1.max(y2),
        }
    }

    pub fn center_x(&self) -> f64 {
        (self.x_min + self.x_max) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.y_min + self.y_max) / 2.0
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }
}

/// A single recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Recognized text
    pub text: String,
    /// Normalized bounding box
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Position in reading order
    pub order_index: usize,
}

/// Reading-order sort key: line bucket first, then horizontal center
pub fn reading_order_key(bbox: &BoundingBox, line_bucket: f64) -> (i64, f64) {
    let bucket = if line_bucket > 0.0 { line_bucket } else { DEFAULT_LINE_BUCKET };
    ((bbox.center_y() / bucket).round() as i64, bbox.center_x())
}

/// Ordered words recognized on one image, plus the per-model word texts
/// from the OCR service aligned with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordIndex {
    words: Vec<Word>,
    /// Model name -> word texts, index-aligned with `words`
    #[serde(default)]
    model_outputs: BTreeMap<String, Vec<String>>,
}

impl WordIndex {
    /// Build an index from raw OCR words in service order.
    ///
    /// Words are re-ordered into reading order and the model outputs are
    /// permuted the same way so that index `i` keeps referring to the
    /// same word in every list.
    pub fn new(
        raw: Vec<(String, BoundingBox)>,
        model_outputs: BTreeMap<String, Vec<String>>,
        line_bucket: f64,
    ) -> Self {
        let mut order: Vec<usize> = (0..raw.len()).collect();
        order.sort_by(|&a, &b| {
            let ka = reading_order_key(&raw[a].1, line_bucket);
            let kb = reading_order_key(&raw[b].1, line_bucket);
            ka.0.cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
        });

        let words = order
            .iter()
            .enumerate()
            .map(|(order_index, &src)| Word {
                text: raw[src].0.clone(),
                bbox: raw[src].1,
                order_index,
            })
            .collect();

        let model_outputs = model_outputs
            .into_iter()
            .map(|(model, texts)| {
                let permuted = order
                    .iter()
                    .map(|&src| texts.get(src).cloned().unwrap_or_default())
                    .collect();
                (model, permuted)
            })
            .collect();

        Self { words, model_outputs }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Word> {
        self.words.get(index)
    }

    /// Per-model word texts, aligned with `words()`
    pub fn model_outputs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.model_outputs
    }

    pub fn has_model_outputs(&self) -> bool {
        !self.model_outputs.is_empty()
    }

    /// Plain text of the whole page in reading order
    pub fn full_text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
