//! Majority voting across OCR model outputs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strsim::normalized_levenshtein;

/// Outcome of a vote across models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    /// Winning value
    pub text: String,
    /// Number of models that produced the winning value
    pub votes: usize,
    /// Number of models that took part in the vote
    pub total: usize,
    /// Mean similarity (0.0 - 1.0) of every ballot to the winner
    pub agreement: f32,
}

/// Vote on per-model values. Ties go to the value seen first.
///
/// Returns None when there is nothing to vote on.
pub fn vote(ballots: &BTreeMap<String, String>) -> Option<Consensus> {
    if ballots.is_empty() {
        return None;
    }

    // (value, count) in first-seen order
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for value in ballots.values() {
        match tally.iter_mut().find(|(v, _)| *v == value.as_str()) {
            Some(entry) => entry.1 += 1,
            None => tally.push((value.as_str(), 1)),
        }
    }

    let mut winner = tally[0];
    for entry in &tally[1..] {
        if entry.1 > winner.1 {
            winner = *entry;
        }
    }

    let total = ballots.len();
    let agreement = ballots
        .values()
        .map(|v| text_similarity(v, winner.0))
        .sum::<f32>()
        / total as f32;

    Some(Consensus {
        text: winner.0.to_string(),
        votes: winner.1,
        total,
        agreement,
    })
}

/// Similarity between two OCR readings, ignoring case and punctuation.
/// Returns a value from 0.0 (completely different) to 1.0 (identical).
pub fn text_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let base = normalized_levenshtein(&a_lower, &b_lower) as f32;

    // OCR often drops or swaps punctuation ("5'08" vs "508")
    let a_alnum: String = a_lower.chars().filter(|c| c.is_alphanumeric()).collect();
    let b_alnum: String = b_lower.chars().filter(|c| c.is_alphanumeric()).collect();
    let stripped = if !a_alnum.is_empty() && !b_alnum.is_empty() {
        normalized_levenshtein(&a_alnum, &b_alnum) as f32
    } else {
        0.0
    };

    base.max(stripped)
}
