//! Test sweep: run a field's pipeline over every loaded image

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::pipeline::{FailureReason, FieldPipeline, FieldSpec, PipelineOutcome};
use super::zone::Zone;
use crate::vision::{vote, Consensus, WordIndex};

/// One image as seen by the sweep
#[derive(Debug, Clone, Copy)]
pub struct SweepImage<'a> {
    pub name: &'a str,
    pub words: &'a WordIndex,
}

#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    pub line_bucket: f64,
    /// Vote across per-model outputs when an image has them
    pub model_vote: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            line_bucket: crate::vision::DEFAULT_LINE_BUCKET,
            model_vote: true,
        }
    }
}

/// Per-image result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub image: String,
    pub value: String,
    pub is_valid: bool,
    /// Present when the value came from a model vote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<Consensus>,
}

/// An image the field failed on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub image: String,
    pub raw: String,
    pub cleaned: String,
    pub reason: FailureReason,
}

/// Sweep summary for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub field_name: String,
    pub total: usize,
    pub valid: usize,
    /// valid / total, 0 when there are no images
    pub success_rate: f64,
    pub results: Vec<ImageResult>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            total: 0,
            valid: 0,
            success_rate: 0.0,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn record(&mut self, image: &str, outcome: PipelineOutcome, consensus: Option<Consensus>) {
        let is_valid = outcome.is_valid || consensus.is_some();
        let value = match &consensus {
            Some(c) => c.text.clone(),
            None => outcome.value.clone(),
        };

        self.total += 1;
        if is_valid {
            self.valid += 1;
        } else {
            self.failures.push(SweepFailure {
                image: image.to_string(),
                raw: outcome.raw,
                cleaned: outcome.cleaned,
                reason: outcome.reason.unwrap_or(FailureReason::NoText),
            });
        }
        self.results.push(ImageResult {
            image: image.to_string(),
            value,
            is_valid,
            consensus,
        });
    }

    fn finish(mut self) -> Self {
        self.success_rate = if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64
        };
        info!(
            "Sweep '{}': {}/{} valid ({:.0}%)",
            self.field_name,
            self.valid,
            self.total,
            self.success_rate * 100.0
        );
        self
    }
}

/// Majority over the valid values the individual models produce
fn model_consensus(
    pipeline: &FieldPipeline<'_>,
    zone: &Zone,
    words: &WordIndex,
    line_bucket: f64,
) -> Option<Consensus> {
    let ballots: BTreeMap<String, String> = words
        .model_outputs()
        .keys()
        .filter_map(|model| {
            let text = zone.model_text(words, model, line_bucket)?;
            let outcome = pipeline.run(&text);
            outcome.is_valid.then(|| (model.clone(), outcome.value))
        })
        .collect();

    vote(&ballots)
}

/// Run one field over all images. Never stops early.
pub fn sweep_field(spec: &FieldSpec, zone: Option<&Zone>, images: &[SweepImage<'_>], options: &SweepOptions) -> SweepReport {
    let mut report = SweepReport::new(&spec.field_name);

    let pipeline = match FieldPipeline::compile(spec) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            warn!("Field '{}' has a bad pattern: {}", spec.field_name, e);
            for image in images {
                let text = zone.map(|z| z.text(image.words, options.line_bucket)).unwrap_or_default();
                let outcome = PipelineOutcome {
                    cleaned: text.trim().to_string(),
                    value: text.trim().to_string(),
                    raw: text,
                    is_valid: false,
                    reason: Some(FailureReason::Config(e.to_string())),
                };
                report.record(image.name, outcome, None);
            }
            return report.finish();
        }
    };

    let Some(zone) = zone else {
        for image in images {
            report.record(image.name, PipelineOutcome::no_zone(), None);
        }
        return report.finish();
    };

    for image in images {
        let raw = zone.text(image.words, options.line_bucket);
        let outcome = pipeline.run(&raw);

        let consensus = if options.model_vote && image.words.has_model_outputs() {
            model_consensus(&pipeline, zone, image.words, options.line_bucket)
        } else {
            None
        };

        report.record(image.name, outcome, consensus);
    }

    report.finish()
}

/// Sweep every field, in field-name order
pub fn sweep_all(
    specs: &BTreeMap<String, FieldSpec>,
    zones: &BTreeMap<String, Zone>,
    images: &[SweepImage<'_>],
    options: &SweepOptions,
) -> Vec<SweepReport> {
    specs
        .values()
        .map(|spec| sweep_field(spec, zones.get(&spec.field_name), images, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::formats::{FormatKind, NormalizationOptions};
    use crate::analysis::zone::{compute_zone, Selection};
    use crate::vision::BoundingBox;

    fn page(date: &str) -> WordIndex {
        WordIndex::new(
            vec![
                ("DOB:".to_string(), BoundingBox::new(0.30, 0.40, 0.36, 0.44)),
                (date.to_string(), BoundingBox::new(0.37, 0.40, 0.50, 0.44)),
            ],
            BTreeMap::new(),
            0.1,
        )
    }

    fn date_spec() -> FieldSpec {
        FieldSpec {
            field_name: "date_of_birth".to_string(),
            format_kind: FormatKind::Date,
            cleanup_pattern: r"^.*?(?=\d{2}/\d{2}/\d{4})".to_string(),
            validation_pattern: r"\d{2}/\d{2}/\d{4}".to_string(),
            normalization_options: NormalizationOptions::default(),
        }
    }

    fn date_zone(first: &WordIndex) -> Zone {
        let mut selection = Selection::new();
        selection.insert(0, [0, 1].into_iter().collect());
        compute_zone("date_of_birth", &selection, &[first], 0.01).unwrap()
    }

    #[test]
    fn test_success_rate_and_failures() {
        let pages: Vec<WordIndex> = (0..10)
            .map(|i| if i % 3 == 1 { page("1O/22/93") } else { page("10/22/1993") })
            .collect();
        let names: Vec<String> = (0..10).map(|i| format!("img{i}.jpg")).collect();
        let images: Vec<SweepImage> = pages
            .iter()
            .zip(&names)
            .map(|(words, name)| SweepImage { name, words })
            .collect();

        let zone = date_zone(&pages[0]);
        let report = sweep_field(&date_spec(), Some(&zone), &images, &SweepOptions::default());

        assert_eq!(report.total, 10);
        assert_eq!(report.valid, 7);
        assert!((report.success_rate - 0.7).abs() < 1e-9);
        assert_eq!(report.failures.len(), 3);
        assert_eq!(report.failures[0].image, "img1.jpg");
        assert_eq!(report.failures[0].raw, "DOB: 1O/22/93");
        assert_eq!(report.results[0].value, "10.22.1993");
    }

    #[test]
    fn test_no_images() {
        let report = sweep_field(&date_spec(), None, &[], &SweepOptions::default());
        assert_eq!(report.total, 0);
        assert_eq!(report.success_rate, 0.0);
    }

    #[test]
    fn test_missing_zone_fails_every_image() {
        let words = page("10/22/1993");
        let images = [SweepImage { name: "a.jpg", words: &words }, SweepImage { name: "b.jpg", words: &words }];
        let report = sweep_field(&date_spec(), None, &images, &SweepOptions::default());

        assert_eq!(report.valid, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[1].reason, FailureReason::NoZone);
    }

    #[test]
    fn test_bad_pattern_fails_field_only() {
        let words = page("10/22/1993");
        let images = [SweepImage { name: "a.jpg", words: &words }];
        let zone = date_zone(&words);

        let mut broken = date_spec();
        broken.field_name = "broken".to_string();
        broken.validation_pattern = "(".to_string();

        let mut specs = BTreeMap::new();
        specs.insert("broken".to_string(), broken);
        specs.insert("date_of_birth".to_string(), date_spec());
        let mut zones = BTreeMap::new();
        zones.insert("broken".to_string(), Zone { field_name: "broken".into(), ..zone.clone() });
        zones.insert("date_of_birth".to_string(), zone);

        let reports = sweep_all(&specs, &zones, &images, &SweepOptions::default());
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].field_name, "broken");
        assert_eq!(reports[0].valid, 0);
        assert!(matches!(reports[0].failures[0].reason, FailureReason::Config(_)));
        assert_eq!(reports[0].failures[0].raw, "DOB: 10/22/1993");
        assert_eq!(reports[1].valid, 1);
    }

    #[test]
    fn test_model_vote() {
        let mut outputs = BTreeMap::new();
        outputs.insert("a".to_string(), vec!["DOB".to_string(), "10/27/1993".to_string()]);
        outputs.insert("b".to_string(), vec!["DOB".to_string(), "10/27/1993".to_string()]);
        outputs.insert("c".to_string(), vec!["DOB".to_string(), "10/22/1993".to_string()]);
        outputs.insert("d".to_string(), vec!["DOB".to_string(), "garbage".to_string()]);
        let words = WordIndex::new(
            vec![
                ("DOB:".to_string(), BoundingBox::new(0.30, 0.40, 0.36, 0.44)),
                ("10/22/1993".to_string(), BoundingBox::new(0.37, 0.40, 0.50, 0.44)),
            ],
            outputs,
            0.1,
        );
        let images = [SweepImage { name: "a.jpg", words: &words }];
        let zone = date_zone(&words);

        let report = sweep_field(&date_spec(), Some(&zone), &images, &SweepOptions::default());
        let result = &report.results[0];
        assert_eq!(result.value, "10.27.1993");
        let consensus = result.consensus.as_ref().unwrap();
        assert_eq!((consensus.votes, consensus.total), (2, 3));

        let no_vote = SweepOptions {
            model_vote: false,
            ..SweepOptions::default()
        };
        let report = sweep_field(&date_spec(), Some(&zone), &images, &no_vote);
        assert_eq!(report.results[0].value, "10.22.1993");
        assert!(report.results[0].consensus.is_none());
    }
}
