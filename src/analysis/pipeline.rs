//! Field pipeline: cleanup, validation, then normalization
//!
//! Patterns are stored as plain strings on the [`FieldSpec`] and compiled
//! when the field is evaluated. A pattern that does not compile makes the
//! field invalid with a configuration reason instead of aborting the caller.

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use super::formats::{suggested_validation_pattern, FormatKind, NormalizationOptions};
use super::normalize::normalize;

/// How one field is extracted from its zone text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_name: String,
    #[serde(default)]
    pub format_kind: FormatKind,
    /// Matches are removed (case-insensitive)
    #[serde(default)]
    pub cleanup_pattern: String,
    /// Must match the whole cleaned text
    #[serde(default)]
    pub validation_pattern: String,
    #[serde(default)]
    pub normalization_options: NormalizationOptions,
}

impl FieldSpec {
    /// New spec with the format guessed from the name and the suggested validation pattern
    pub fn new(field_name: impl Into<String>, options: NormalizationOptions) -> Self {
        let field_name = field_name.into();
        let format_kind = FormatKind::detect(&field_name);
        Self {
            validation_pattern: suggested_validation_pattern(format_kind, &options),
            field_name,
            format_kind,
            cleanup_pattern: String::new(),
            normalization_options: options,
        }
    }
}

/// Which of a field's two patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternRole {
    Cleanup,
    Validation,
}

impl fmt::Display for PatternRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternRole::Cleanup => "cleanup",
            PatternRole::Validation => "validation",
        })
    }
}

/// Problems with a field's regular expressions
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {role} pattern '{pattern}': {source}")]
    Compile {
        role: PatternRole,
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },
    #[error("{role} pattern '{pattern}' failed while matching: {source}")]
    Runtime {
        role: PatternRole,
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },
}

/// Why a field value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("field has no zone")]
    NoZone,
    #[error("zone contains no text")]
    NoText,
    #[error("cleanup removed all text")]
    EmptyAfterCleanup,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("'{0}' does not match the validation pattern")]
    ValidationFailed(String),
    #[error("normalization failed: {0}")]
    Normalization(String),
}

/// Result of running one field on one piece of zone text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub raw: String,
    pub cleaned: String,
    /// Normalized text when valid, cleaned text otherwise
    pub value: String,
    pub is_valid: bool,
    pub reason: Option<FailureReason>,
}

impl PipelineOutcome {
    fn invalid(raw: &str, cleaned: String, reason: FailureReason) -> Self {
        Self {
            raw: raw.to_string(),
            value: cleaned.clone(),
            cleaned,
            is_valid: false,
            reason: Some(reason),
        }
    }

    /// Outcome for a field that has no zone to read from
    pub fn no_zone() -> Self {
        Self::invalid("", String::new(), FailureReason::NoZone)
    }
}

/// A field spec with its patterns compiled
pub struct FieldPipeline<'a> {
    spec: &'a FieldSpec,
    cleanup: Option<Regex>,
    validation: Option<Regex>,
}

impl<'a> FieldPipeline<'a> {
    /// Compile the spec's patterns
    pub fn compile(spec: &'a FieldSpec) -> Result<Self, PatternError> {
        let cleanup = compile_optional(&spec.cleanup_pattern, PatternRole::Cleanup, |p| format!("(?i){p}"))?;
        let validation =
            compile_optional(&spec.validation_pattern, PatternRole::Validation, |p| format!("^(?:{p})$"))?;

        Ok(Self {
            spec,
            cleanup,
            validation,
        })
    }

    pub fn spec(&self) -> &FieldSpec {
        self.spec
    }

    /// Remove cleanup matches and trim
    pub fn clean(&self, raw: &str) -> Result<String, PatternError> {
        let cleaned = match &self.cleanup {
            Some(re) => re
                .try_replacen(raw, 0, "")
                .map_err(|source| PatternError::Runtime {
                    role: PatternRole::Cleanup,
                    pattern: self.spec.cleanup_pattern.clone(),
                    source,
                })?
                .into_owned(),
            None => raw.to_string(),
        };
        Ok(cleaned.trim().to_string())
    }

    /// Whether cleaned text passes validation
    pub fn validate(&self, cleaned: &str) -> Result<bool, PatternError> {
        match &self.validation {
            Some(re) => re.is_match(cleaned).map_err(|source| PatternError::Runtime {
                role: PatternRole::Validation,
                pattern: self.spec.validation_pattern.clone(),
                source,
            }),
            None => Ok(!cleaned.is_empty()),
        }
    }

    /// Run all stages on raw zone text
    pub fn run(&self, raw: &str) -> PipelineOutcome {
        if raw.trim().is_empty() {
            return PipelineOutcome::invalid(raw, String::new(), FailureReason::NoText);
        }

        let cleaned = match self.clean(raw) {
            Ok(cleaned) => cleaned,
            Err(e) => return PipelineOutcome::invalid(raw, raw.trim().to_string(), FailureReason::Config(e.to_string())),
        };
        if cleaned.is_empty() {
            return PipelineOutcome::invalid(raw, cleaned, FailureReason::EmptyAfterCleanup);
        }

        match self.validate(&cleaned) {
            Ok(true) => {}
            Ok(false) => {
                let reason = FailureReason::ValidationFailed(cleaned.clone());
                return PipelineOutcome::invalid(raw, cleaned, reason);
            }
            Err(e) => return PipelineOutcome::invalid(raw, cleaned, FailureReason::Config(e.to_string())),
        }

        match normalize(&cleaned, self.spec.format_kind, &self.spec.normalization_options) {
            Ok(value) => {
                debug!("{}: '{}' -> '{}'", self.spec.field_name, cleaned, value);
                PipelineOutcome {
                    raw: raw.to_string(),
                    cleaned,
                    value,
                    is_valid: true,
                    reason: None,
                }
            }
            Err(e) => PipelineOutcome::invalid(raw, cleaned, FailureReason::Normalization(e.to_string())),
        }
    }
}

fn compile_optional(
    pattern: &str,
    role: PatternRole,
    wrap: impl Fn(&str) -> String,
) -> Result<Option<Regex>, PatternError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(&wrap(pattern))
        .map(Some)
        .map_err(|source| PatternError::Compile {
            role,
            pattern: pattern.to_string(),
            source,
        })
}

/// Run one field on raw text, compiling its patterns first
pub fn run_pipeline(raw: &str, spec: &FieldSpec) -> PipelineOutcome {
    match FieldPipeline::compile(spec) {
        Ok(pipeline) => pipeline.run(raw),
        Err(e) => PipelineOutcome::invalid(raw, raw.trim().to_string(), FailureReason::Config(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, kind: FormatKind, cleanup: &str, validation: &str) -> FieldSpec {
        FieldSpec {
            field_name: name.to_string(),
            format_kind: kind,
            cleanup_pattern: cleanup.to_string(),
            validation_pattern: validation.to_string(),
            normalization_options: NormalizationOptions::default(),
        }
    }

    #[test]
    fn test_date_with_lookahead_cleanup() {
        let spec = spec(
            "date_of_birth",
            FormatKind::Date,
            r"^.*?(?=\d{2}/\d{2}/\d{4})",
            r"^\d{2}/\d{2}/\d{4}$",
        );
        let outcome = run_pipeline("3. DOB: 10/22/1993", &spec);

        assert!(outcome.is_valid);
        assert_eq!(outcome.cleaned, "10/22/1993");
        assert_eq!(outcome.value, "10.22.1993");
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn test_height_us() {
        let spec = spec("height", FormatKind::Height, r"^.*HGT:\s*", r"\d{3}");
        let outcome = run_pipeline("8. HGT: 508", &spec);

        assert_eq!(outcome.cleaned, "508");
        assert_eq!(outcome.value, "5'08");
        assert!(outcome.is_valid);
    }

    #[test]
    fn test_sex_with_suggested_pattern() {
        let mut spec = FieldSpec::new("sex", NormalizationOptions::default());
        spec.cleanup_pattern = r"^.*SEX:\s*".to_string();

        let outcome = run_pipeline("SEX: MALE", &spec);
        assert_eq!(outcome.cleaned, "MALE");
        assert_eq!(outcome.value, "M");
    }

    #[test]
    fn test_cleanup_is_case_insensitive() {
        let spec = spec("dl_number", FormatKind::Number, r"dl\s*", "");
        let outcome = run_pipeline("DL d1234567", &spec);
        assert_eq!(outcome.cleaned, "d1234567");
        assert_eq!(outcome.value, "D1234567");
    }

    #[test]
    fn test_invalid_text_is_not_normalized() {
        let spec = spec("date", FormatKind::Date, "", r"\d{2}/\d{2}/\d{4}");
        let outcome = run_pipeline(" 1993-10-22 ", &spec);

        assert!(!outcome.is_valid);
        assert_eq!(outcome.value, outcome.cleaned);
        assert_eq!(outcome.value, "1993-10-22");
        assert_eq!(
            outcome.reason,
            Some(FailureReason::ValidationFailed("1993-10-22".to_string()))
        );
    }

    #[test]
    fn test_validation_is_anchored() {
        let spec = spec("sex", FormatKind::Sex, "", "M|F");
        assert!(!run_pipeline("MF", &spec).is_valid);
        assert!(run_pipeline("F", &spec).is_valid);
    }

    #[test]
    fn test_empty_validation_accepts_any_text() {
        let spec = spec("name", FormatKind::String, "", "");
        let outcome = run_pipeline("  JOHN ", &spec);
        assert!(outcome.is_valid);
        assert_eq!(outcome.value, "JOHN");
    }

    #[test]
    fn test_no_text() {
        let spec = spec("name", FormatKind::String, "", "");
        let outcome = run_pipeline("   ", &spec);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.reason, Some(FailureReason::NoText));
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let spec = spec("name", FormatKind::String, ".*", "");
        let outcome = run_pipeline("JOHN", &spec);
        assert_eq!(outcome.reason, Some(FailureReason::EmptyAfterCleanup));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let spec = spec("name", FormatKind::String, "([unclosed", "");
        let outcome = run_pipeline("JOHN", &spec);

        assert!(!outcome.is_valid);
        assert_eq!(outcome.value, "JOHN");
        match outcome.reason {
            Some(FailureReason::Config(message)) => assert!(message.contains("cleanup")),
            other => panic!("expected config error, got {:?}", other),
        }

        let err = FieldPipeline::compile(&spec).err().unwrap();
        assert!(matches!(err, PatternError::Compile { role: PatternRole::Cleanup, .. }));
    }

    #[test]
    fn test_normalization_failure_keeps_cleaned() {
        let spec = spec("sex", FormatKind::Sex, "", "");
        let outcome = run_pipeline("X", &spec);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.value, "X");
        assert!(matches!(outcome.reason, Some(FailureReason::Normalization(_))));
    }

    #[test]
    fn test_unvalidated_date_with_non_ascii_digits() {
        let spec = spec("date", FormatKind::Date, "", "");
        let outcome = run_pipeline("1\u{0662}\u{0663}\u{0664}5", &spec);
        assert!(!outcome.is_valid);
        assert!(matches!(outcome.reason, Some(FailureReason::Normalization(_))));
    }

    #[test]
    fn test_endorsements_without_validation() {
        let spec = FieldSpec::new("endorsements", NormalizationOptions::default());
        assert_eq!(spec.format_kind, FormatKind::Endorsements);
        let outcome = run_pipeline("9a Endorsements H M1 12 Restrictions", &spec);
        assert!(outcome.is_valid);
        assert_eq!(outcome.value, "H,M1");
    }

    #[test]
    fn test_field_spec_new_detects_format() {
        let spec = FieldSpec::new("date_of_birth", NormalizationOptions::default());
        assert_eq!(spec.format_kind, FormatKind::Date);
        assert!(!spec.validation_pattern.is_empty());
        assert!(spec.cleanup_pattern.is_empty());
    }

    #[test]
    fn test_failure_reason_serde() {
        let json = serde_json::to_string(&FailureReason::Config("bad".into())).unwrap();
        assert_eq!(json, r#"{"kind":"config","detail":"bad"}"#);
        let back: FailureReason = serde_json::from_str(r#"{"kind":"no_zone"}"#).unwrap();
        assert_eq!(back, FailureReason::NoZone);
    }
}
