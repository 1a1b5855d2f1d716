//! Zone geometry: rectangles around selected words
//!
//! All coordinates are fractions of the page (0.0 - 1.0).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::vision::{reading_order_key, BoundingBox, Word, WordIndex};

/// Image index -> selected word indices on that image
pub type Selection = BTreeMap<usize, BTreeSet<usize>>;

/// Region of the page mapped to one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub field_name: String,
    /// (min, max)
    pub y_range: (f64, f64),
    /// (min, max)
    pub x_range: (f64, f64),
    #[serde(default)]
    pub selected_word_indices: Selection,
}

/// Smallest box enclosing all of `boxes`
pub fn enclosing_box<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
    boxes.into_iter().fold(None, |acc, b| {
        Some(match acc {
            None => *b,
            Some(a) => BoundingBox {
                x_min: a.x_min.min(b.x_min),
                y_min: a.y_min.min(b.y_min),
                x_max: a.x_max.max(b.x_max),
                y_max: a.y_max.max(b.y_max),
            },
        })
    })
}

/// Grow every edge by `padding`, without clamping
pub fn pad(rect: &BoundingBox, padding: f64) -> BoundingBox {
    BoundingBox {
        x_min: rect.x_min - padding,
        y_min: rect.y_min - padding,
        x_max: rect.x_max + padding,
        y_max: rect.y_max + padding,
    }
}

/// Values this close to a 3-decimal step are float noise, not overhang
const ROUNDING_SLACK: f64 = 1e-6;

fn round_outward(value: f64, up: bool) -> f64 {
    let scaled = value.clamp(0.0, 1.0) * 1000.0;
    let nearest = scaled.round();
    let stepped = if (scaled - nearest).abs() < ROUNDING_SLACK {
        nearest
    } else if up {
        scaled.ceil()
    } else {
        scaled.floor()
    };
    (stepped / 1000.0).clamp(0.0, 1.0)
}

/// Clamp to the page and round to 3 decimals, minima down and maxima up
pub fn clamp_and_round(rect: &BoundingBox) -> BoundingBox {
    let floor = |v: f64| round_outward(v, false);
    let ceil = |v: f64| round_outward(v, true);

    BoundingBox {
        x_min: floor(rect.x_min),
        y_min: floor(rect.y_min),
        x_max: ceil(rect.x_max),
        y_max: ceil(rect.y_max),
    }
}

/// Zone rectangle for a set of word boxes. None when there are no boxes.
pub fn compute_zone_rect<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>, padding: f64) -> Option<BoundingBox> {
    enclosing_box(boxes).map(|rect| clamp_and_round(&pad(&rect, padding)))
}

/// Build the zone for a selection spanning one or more images.
///
/// `images[i]` is the word index of image `i`. Image or word indices that do
/// not resolve are skipped. Returns None when nothing resolves.
pub fn compute_zone(field_name: &str, selection: &Selection, images: &[&WordIndex], padding: f64) -> Option<Zone> {
    let boxes: Vec<BoundingBox> = selection
        .iter()
        .filter_map(|(&image, words)| images.get(image).map(|index| (index, words)))
        .flat_map(|(index, words)| words.iter().filter_map(|&w| index.get(w).map(|word| word.bbox)))
        .collect();

    let rect = compute_zone_rect(boxes.iter(), padding)?;

    Some(Zone {
        field_name: field_name.to_string(),
        y_range: (rect.y_min, rect.y_max),
        x_range: (rect.x_min, rect.x_max),
        selected_word_indices: selection.clone(),
    })
}

impl Zone {
    pub fn rect(&self) -> BoundingBox {
        BoundingBox {
            x_min: self.x_range.0,
            y_min: self.y_range.0,
            x_max: self.x_range.1,
            y_max: self.y_range.1,
        }
    }

    /// A word belongs to the zone when its center is inside (inclusive)
    pub fn contains_word(&self, word: &Word) -> bool {
        let (cx, cy) = (word.bbox.center_x(), word.bbox.center_y());
        cx >= self.x_range.0 && cx <= self.x_range.1 && cy >= self.y_range.0 && cy <= self.y_range.1
    }

    /// Positions in `index` of the words inside the zone, in reading order
    pub fn word_positions(&self, index: &WordIndex, line_bucket: f64) -> Vec<usize> {
        let mut positions: Vec<usize> = index
            .words()
            .iter()
            .enumerate()
            .filter(|(_, w)| self.contains_word(w))
            .map(|(i, _)| i)
            .collect();

        positions.sort_by(|&a, &b| {
            let ka = reading_order_key(&index.words()[a].bbox, line_bucket);
            let kb = reading_order_key(&index.words()[b].bbox, line_bucket);
            ka.0.cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
        });
        positions
    }

    /// Text of the words inside the zone, joined with single spaces
    pub fn text(&self, index: &WordIndex, line_bucket: f64) -> String {
        self.word_positions(index, line_bucket)
            .into_iter()
            .filter_map(|i| index.get(i))
            .map(|w| w.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Same as [`Zone::text`] using one model's reading of each word
    pub fn model_text(&self, index: &WordIndex, model: &str, line_bucket: f64) -> Option<String> {
        let texts = index.model_outputs().get(model)?;
        let text = self
            .word_positions(index, line_bucket)
            .into_iter()
            .filter_map(|i| texts.get(i))
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Some(text)
    }

    /// Total number of selected words across images
    pub fn selected_count(&self) -> usize {
        self.selected_word_indices.values().map(BTreeSet::len).sum()
    }
}
