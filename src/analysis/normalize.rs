//! Format-specific normalization of validated field text
//!
//! Every normalizer is idempotent: feeding its output back in with the
//! same options returns the same value.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use thiserror::Error;

use super::formats::{
    DateOrder, FormatKind, HeightBounds, HeightMode, NormalizationOptions, TextProfile, WeightMode,
};

/// Why a value could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("no text to normalize")]
    Empty,
    #[error("expected 8 date digits, found {0}")]
    DateDigits(usize),
    #[error("'{0}' has no valid month and day")]
    ImpossibleDate(String),
    #[error("height '{0}' matches neither US nor metric forms")]
    UnrecognizedHeight(String),
    #[error("height '{0}' fits both US and metric ranges")]
    AmbiguousHeight(String),
    #[error("no plausible {unit} weight in '{text}'")]
    UnrecognizedWeight { text: String, unit: &'static str },
    #[error("weight '{text}' is in {found}, field expects {expected}")]
    WeightUnitMismatch {
        text: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{0}' is not a recognized sex value")]
    UnknownSex(String),
    #[error("no valid color code in '{0}'")]
    UnknownColor(String),
    #[error("no valid {kind} codes in '{text}'")]
    NoCodes { text: String, kind: &'static str },
}

// ASCII only, so digit runs can be sliced by byte offset
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

static US_EXPLICIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^0-9])(\d)\s*(?:['’`\-]|\s)+\s*(\d{1,2})(?:[^0-9]|$)"#).expect("valid regex")
});
static US_IMPLICIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(\d)(\d{2})(?:[^0-9]|$)").expect("valid regex"));
static US_FEET_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d)\s*(?:'|FT)?\s*$").expect("valid regex"));

static METRIC_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(\d)[,.](\d{2})\s*M?\b").expect("valid regex"));
static METRIC_CM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(\d{3})\s*CM\b").expect("valid regex"));
static METRIC_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{3})\s*$").expect("valid regex"));

/// "175LB" read as "1751B"
static POUNDS_MISREAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9])[1I]B\b").expect("valid regex"));

/// AAMVA eye color codes, plus the common BRN variant
pub const EYE_COLORS: [&str; 11] = [
    "BLK", "BLU", "BRO", "GRY", "GRN", "HAZ", "MAR", "PNK", "DIC", "UNK", "BRN",
];

/// AAMVA hair color codes, plus the common BRN variant
pub const HAIR_COLORS: [&str; 10] = [
    "BAL", "BLK", "BLN", "BRO", "GRY", "RED", "SDY", "WHI", "UNK", "BRN",
];

/// AAMVA endorsement codes
pub const ENDORSEMENT_CODES: [&str; 20] = [
    "H", "N", "P", "S", "T", "X", "M", "L", "F", "G", "R", "W", "Z", "O", "A", "M1", "M2", "M3", "P1", "P2",
];

/// AAMVA restriction codes: A-Z, P1-P40, J01-J11, J99, S1, A1, A2
pub static RESTRICTION_CODES: Lazy<Vec<String>> = Lazy::new(|| {
    let mut codes: Vec<String> = ('A'..='Z').map(String::from).collect();
    codes.extend((1..=40).map(|n| format!("P{n}")));
    codes.extend((1..=11).map(|n| format!("J{n:02}")));
    codes.extend(["J99", "S1", "A1", "A2"].map(String::from));
    codes
});

static LABEL_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:DRIVER\s*LICENSE|USA|AMERICA|CLASS)$").expect("valid regex"));
// "9a Endorsements", "Sa End.", "Emdorsements"
static ENDORSE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[9SDO0-9]+[A-Z]?\s*)?E[NM]D\w*\.?\s*").expect("valid regex"));
// Restrictions, vehicle class or class label bleeding in from the right
static ENDORSE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:12\s*)?(?:R[EO]?ST\w*|RE\b|V[EHICO]\w*|CLASS)").expect("valid regex")
});
static RESTRICT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:12\s*)?(?:R[EO]?ST\w*|RE\b)\.?\s*").expect("valid regex"));
// Cut point is the start of group 1; the leading character must precede it
static RESTRICT_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s.,A-Z0-9]((?:[9GS5]\s*)?V[EHICO]|CLASS|9\s*V\b)").expect("valid regex")
});

static EYE_COLOR: Lazy<Regex> = Lazy::new(|| color_pattern(&EYE_COLORS));
static HAIR_COLOR: Lazy<Regex> = Lazy::new(|| color_pattern(&HAIR_COLORS));

fn color_pattern(codes: &[&str]) -> Regex {
    Regex::new(&format!(r"\b({})\b", codes.join("|"))).expect("valid regex")
}

/// Normalize already-validated text according to its format
pub fn normalize(text: &str, kind: FormatKind, options: &NormalizationOptions) -> Result<String, NormalizeError> {
    if text.trim().is_empty() {
        return Err(NormalizeError::Empty);
    }

    match kind {
        FormatKind::Date => normalize_date(text, options),
        FormatKind::Height => normalize_height(text, options.height_mode, &options.height_bounds),
        FormatKind::Weight => normalize_weight(text, options.weight_mode),
        FormatKind::Sex => normalize_sex(text),
        FormatKind::Eyes => extract_color(text, "EYES", &EYE_COLOR),
        FormatKind::Hair => extract_color(text, "HAIR", &HAIR_COLOR),
        FormatKind::Number => Ok(text.trim().to_uppercase()),
        FormatKind::String => normalize_string(text, options),
        FormatKind::Endorsements => normalize_endorsements(text),
        FormatKind::Restrictions => normalize_restrictions(text),
    }
}

struct DateParts<'a> {
    year: &'a str,
    month: &'a str,
    day: &'a str,
}

fn plausible(month: &str, day: &str) -> bool {
    let month: u32 = month.parse().unwrap_or(0);
    let day: u32 = day.parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Read three digit groups as a date. A two-digit-first layout prefers
/// `day_first` and falls back to the other reading when only that one is
/// possible.
fn read_date<'a>(year_first: bool, a: &'a str, b: &'a str, c: &'a str, day_first: bool) -> Option<DateParts<'a>> {
    if year_first {
        return plausible(b, c).then_some(DateParts {
            year: a,
            month: b,
            day: c,
        });
    }

    let (preferred, swapped) = if day_first { ((b, a), (a, b)) } else { ((a, b), (b, a)) };
    [preferred, swapped]
        .into_iter()
        .find(|(month, day)| plausible(month, day))
        .map(|(month, day)| DateParts { year: c, month, day })
}

fn split_contiguous(digits: &str, year_first: bool) -> (&str, &str, &str) {
    if year_first {
        (&digits[0..4], &digits[4..6], &digits[6..8])
    } else {
        (&digits[0..2], &digits[2..4], &digits[4..8])
    }
}

/// Re-order and re-delimit a date's digit groups
///
/// `NN/NN/YYYY` sources are read day first when `source_day_first` is set or
/// the target is day first, month first otherwise. Months outside 1-12 and
/// days outside 1-31 are rejected.
pub fn normalize_date(text: &str, options: &NormalizationOptions) -> Result<String, NormalizeError> {
    // Common OCR letter/digit confusions
    let fixed: String = text
        .chars()
        .map(|c| match c {
            'O' => '0',
            'l' | 'I' => '1',
            c => c,
        })
        .collect();

    let groups: Vec<&str> = DIGIT_RUN.find_iter(&fixed).map(|m| m.as_str()).collect();
    let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    let target = options.date_format;
    let day_first = options.source_day_first || target.order == DateOrder::Dmy;
    let impossible = || NormalizeError::ImpossibleDate(text.trim().to_string());

    let digits: String;
    let parts = match lengths.as_slice() {
        [4, 2, 2] => read_date(true, groups[0], groups[1], groups[2], day_first),
        [2, 2, 4] => read_date(false, groups[0], groups[1], groups[2], day_first),
        _ => {
            digits = groups.concat();
            if digits.len() != 8 {
                return Err(NormalizeError::DateDigits(digits.len()));
            }
            // The target's own layout first, then the other one
            let year_first = target.order == DateOrder::Ymd;
            [year_first, !year_first].into_iter().find_map(|year_first| {
                let (a, b, c) = split_contiguous(&digits, year_first);
                read_date(year_first, a, b, c, day_first)
            })
        }
    };
    let DateParts { year, month, day } = parts.ok_or_else(impossible)?;

    let d = target.delimiter;
    Ok(match target.order {
        DateOrder::Ymd => format!("{year}{d}{month}{d}{day}"),
        DateOrder::Mdy => format!("{month}{d}{day}{d}{year}"),
        DateOrder::Dmy => format!("{day}{d}{month}{d}{year}"),
    })
}

fn format_us_height(feet: u32, inches: u32) -> String {
    format!("{}'{:02}", feet, inches)
}

fn format_metric_height(cm: u32) -> String {
    format!("{},{:02}m", cm / 100, cm % 100)
}

fn explicit_us(text: &str, bounds: &HeightBounds) -> Option<String> {
    US_EXPLICIT.captures_iter(text).find_map(|caps| {
        let feet: u32 = caps[1].parse().ok()?;
        let inches: u32 = caps[2].parse().ok()?;
        let in_range = (bounds.feet_min..=bounds.feet_max).contains(&feet) && inches <= 11;
        in_range.then(|| format_us_height(feet, inches))
    })
}

fn implicit_us(text: &str, bounds: &HeightBounds) -> Option<String> {
    let implicit = US_IMPLICIT.captures_iter(text).find_map(|caps| {
        let feet: u32 = caps[1].parse().ok()?;
        let inches: u32 = caps[2].parse().ok()?;
        let in_range = (bounds.feet_min..=bounds.feet_max).contains(&feet) && inches <= 11;
        in_range.then(|| format_us_height(feet, inches))
    });

    implicit.or_else(|| {
        let caps = US_FEET_ONLY.captures(text)?;
        let feet: u32 = caps[1].parse().ok()?;
        (bounds.feet_min..=bounds.feet_max)
            .contains(&feet)
            .then(|| format_us_height(feet, 0))
    })
}

fn explicit_metric(text: &str, bounds: &HeightBounds) -> Option<String> {
    let cm_range = bounds.cm_min..=bounds.cm_max;

    let decimal = METRIC_DECIMAL.captures_iter(text).find_map(|caps| {
        let meters: u32 = caps[1].parse().ok()?;
        let centis: u32 = caps[2].parse().ok()?;
        let cm = meters * 100 + centis;
        cm_range.contains(&cm).then(|| format_metric_height(cm))
    });

    decimal.or_else(|| {
        METRIC_CM.captures_iter(text).find_map(|caps| {
            let cm: u32 = caps[1].parse().ok()?;
            cm_range.contains(&cm).then(|| format_metric_height(cm))
        })
    })
}

fn implicit_metric(text: &str, bounds: &HeightBounds) -> Option<String> {
    let caps = METRIC_INT.captures(text)?;
    let cm: u32 = caps[1].parse().ok()?;
    (bounds.cm_min..=bounds.cm_max)
        .contains(&cm)
        .then(|| format_metric_height(cm))
}

/// Normalize a height to `5'08` (US) or `1,75m` (metric)
///
/// Auto mode trusts explicit markers first (a feet separator, `cm`, decimal
/// meters) and falls back to the configured numeric ranges for bare numbers.
/// A value that fits both or neither is rejected rather than guessed.
pub fn normalize_height(text: &str, mode: HeightMode, bounds: &HeightBounds) -> Result<String, NormalizeError> {
    let upper = text.trim().to_uppercase();
    let unrecognized = || NormalizeError::UnrecognizedHeight(text.trim().to_string());

    match mode {
        HeightMode::Us => explicit_us(&upper, bounds)
            .or_else(|| implicit_us(&upper, bounds))
            .ok_or_else(unrecognized),
        HeightMode::Metric => explicit_metric(&upper, bounds)
            .or_else(|| implicit_metric(&upper, bounds))
            .ok_or_else(unrecognized),
        HeightMode::Auto => {
            let marked = (explicit_us(&upper, bounds), explicit_metric(&upper, bounds));
            let candidates = match marked {
                (None, None) => (implicit_us(&upper, bounds), implicit_metric(&upper, bounds)),
                other => other,
            };

            match candidates {
                (Some(us), None) => Ok(us),
                (None, Some(metric)) => Ok(metric),
                (Some(_), Some(_)) => Err(NormalizeError::AmbiguousHeight(text.trim().to_string())),
                (None, None) => Err(unrecognized()),
            }
        }
    }
}

/// Append the weight unit, checking the value is plausible for it
pub fn normalize_weight(text: &str, mode: WeightMode) -> Result<String, NormalizeError> {
    let upper = POUNDS_MISREAD.replace_all(&text.trim().to_uppercase(), "${1}LB").into_owned();

    // Search after the label when it survived cleanup
    let search = match upper.find("WGT") {
        Some(pos) => &upper[pos + 3..],
        None => upper.as_str(),
    };

    let found = if search.contains("KG") {
        Some("kg")
    } else if search.contains("LB") {
        Some("lb")
    } else {
        None
    };

    let unit = match (mode, found) {
        (WeightMode::Us, Some("kg")) | (WeightMode::Metric, Some("lb")) => {
            return Err(NormalizeError::WeightUnitMismatch {
                text: text.trim().to_string(),
                expected: if mode == WeightMode::Us { "lb" } else { "kg" },
                found: found.unwrap_or_default(),
            });
        }
        (WeightMode::Us, _) => "lb",
        (WeightMode::Metric, _) => "kg",
        (WeightMode::Auto, Some(unit)) => unit,
        (WeightMode::Auto, None) => "lb",
    };

    let range = if unit == "lb" { 50..=400 } else { 30..=200 };

    // Longer digit runs are not weights, never a prefix of one
    DIGIT_RUN
        .find_iter(search)
        .map(|m| m.as_str())
        .filter(|run| (2..=3).contains(&run.len()))
        .filter_map(|run| run.parse::<u32>().ok())
        .find(|value| range.contains(value))
        .map(|value| format!("{value}{unit}"))
        .ok_or_else(|| NormalizeError::UnrecognizedWeight {
            text: text.trim().to_string(),
            unit,
        })
}

/// Map the leading token to `M` or `F`
pub fn normalize_sex(text: &str) -> Result<String, NormalizeError> {
    let upper = text.trim().to_uppercase();
    let token: String = upper.chars().take_while(|c| c.is_ascii_alphabetic()).collect();

    match token.as_str() {
        "M" | "MALE" => Ok("M".to_string()),
        "F" | "FEMALE" => Ok("F".to_string()),
        _ => Err(NormalizeError::UnknownSex(text.trim().to_string())),
    }
}

fn extract_color(text: &str, label: &str, pattern: &Regex) -> Result<String, NormalizeError> {
    let upper = text.trim().to_uppercase();

    // "HAIR BLK EYES BRN" must not yield BLK for the eyes field
    let search = match upper.find(label) {
        Some(pos) => &upper[pos + label.len()..],
        None => upper.as_str(),
    };

    pattern
        .captures(search)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| NormalizeError::UnknownColor(text.trim().to_string()))
}

/// Codes found in `text`, split on separators and, inside a chunk, matched
/// greedily longest first. Characters that start no code are skipped.
fn parse_codes<S: AsRef<str>>(text: &str, valid: &[S]) -> BTreeSet<String> {
    let mut by_length: Vec<&str> = valid.iter().map(|c| c.as_ref()).collect();
    by_length.sort_by_key(|c| std::cmp::Reverse(c.len()));

    let mut found = BTreeSet::new();
    for chunk in text.split(|c: char| c == ',' || c == '.' || c.is_whitespace()) {
        if chunk.is_empty() {
            continue;
        }
        if by_length.contains(&chunk) {
            found.insert(chunk.to_string());
            continue;
        }

        let mut rest = chunk;
        while let Some(first) = rest.chars().next() {
            match by_length.iter().find(|code| rest.starts_with(**code)) {
                Some(code) => {
                    found.insert(code.to_string());
                    rest = &rest[code.len()..];
                }
                None => rest = &rest[first.len_utf8()..],
            }
        }
    }
    found
}

fn join_codes(text: &str, codes: BTreeSet<String>, kind: &'static str) -> Result<String, NormalizeError> {
    if codes.is_empty() {
        return Err(NormalizeError::NoCodes {
            text: text.trim().to_string(),
            kind,
        });
    }
    Ok(codes.into_iter().collect::<Vec<_>>().join(","))
}

/// Endorsement codes as a sorted comma list, or `NONE`
///
/// Tolerates the misread "Endorsements" label on the left and the
/// restrictions or class labels bleeding in from the right.
pub fn normalize_endorsements(text: &str) -> Result<String, NormalizeError> {
    let upper = text.trim().to_uppercase();
    if LABEL_ONLY.is_match(&upper) {
        return Err(NormalizeError::NoCodes {
            text: text.trim().to_string(),
            kind: "endorsement",
        });
    }

    let mut value = match ENDORSE_START.find(&upper) {
        Some(m) => &upper[m.end()..],
        None => upper.as_str(),
    };
    if let Some(m) = ENDORSE_END.find(value) {
        value = &value[..m.start()];
    }
    let value = value.trim();

    if value.contains("NONE") {
        return Ok("NONE".to_string());
    }
    join_codes(text, parse_codes(value, &ENDORSEMENT_CODES[..]), "endorsement")
}

/// Restriction codes as a sorted comma list, or `NONE`
pub fn normalize_restrictions(text: &str) -> Result<String, NormalizeError> {
    let upper = text.trim().to_uppercase();
    if LABEL_ONLY.is_match(&upper) {
        return Err(NormalizeError::NoCodes {
            text: text.trim().to_string(),
            kind: "restriction",
        });
    }

    let mut value = match RESTRICT_START.find(&upper) {
        Some(m) => &upper[m.end()..],
        None => upper.as_str(),
    };
    if let Some(cut) = RESTRICT_END.captures(value).and_then(|caps| caps.get(1)) {
        value = &value[..cut.start()];
    }
    let value = value.trim();

    if value.contains("NONE") {
        return Ok("NONE".to_string());
    }
    join_codes(text, parse_codes(value, RESTRICTION_CODES.as_slice()), "restriction")
}

fn normalize_string(text: &str, options: &NormalizationOptions) -> Result<String, NormalizeError> {
    let cleaned = match options.text_profile {
        TextProfile::Plain => text.trim().to_string(),
        TextProfile::Name => clean_name(text),
        TextProfile::Address => clean_address(text),
    };

    if cleaned.is_empty() {
        return Err(NormalizeError::Empty);
    }

    Ok(if options.title_case {
        title_case(&cleaned)
    } else {
        cleaned
    })
}

/// Tokens without any uppercase letter or digit are OCR noise ("GEORGE a NICHOLAS")
fn is_noise_token(token: &str) -> bool {
    token.chars().any(|c| c.is_alphabetic())
        && !token.chars().any(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn clean_name(text: &str) -> String {
    let separated: String = text
        .chars()
        .map(|c| if matches!(c, '.' | '_' | ':' | ';' | ',') { ' ' } else { c })
        .collect();

    separated
        .split_whitespace()
        .filter(|token| !is_noise_token(token))
        .map(|token| {
            let kept: String = token
                .chars()
                .filter(|c| c.is_alphabetic() || *c == '\'' || *c == '-')
                .collect();
            kept.trim_matches(|c| c == '\'' || c == '-').to_string()
        })
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_address(text: &str) -> String {
    let separated: String = text
        .chars()
        .map(|c| if matches!(c, ':' | ';') { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, ',' | '-' | '#' | '/'))
        .collect();

    let joined = separated
        .split_whitespace()
        .filter(|token| !is_noise_token(token))
        .collect::<Vec<_>>()
        .join(" ");

    let comma_spaced = joined
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    comma_spaced
        .trim_matches(|c: char| matches!(c, ',' | '-' | '#' | '/') || c.is_whitespace())
        .to_string()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::formats::DateFormat;

    fn date_options(format: &str) -> NormalizationOptions {
        NormalizationOptions {
            date_format: format.parse::<DateFormat>().unwrap(),
            ..NormalizationOptions::default()
        }
    }

    fn bounds() -> HeightBounds {
        HeightBounds::default()
    }

    #[test]
    fn test_date_redelimit() {
        assert_eq!(normalize_date("10/22/1993", &date_options("MM.DD.YYYY")).unwrap(), "10.22.1993");
        assert_eq!(normalize_date("08-01-1988", &date_options("DD/MM/YYYY")).unwrap(), "08/01/1988");
    }

    #[test]
    fn test_date_reorder_year_first_source() {
        assert_eq!(normalize_date("1993-10-22", &date_options("MM.DD.YYYY")).unwrap(), "10.22.1993");
        assert_eq!(normalize_date("1993-10-22", &date_options("DD.MM.YYYY")).unwrap(), "22.10.1993");
    }

    #[test]
    fn test_date_to_year_first_target() {
        assert_eq!(normalize_date("10/22/1993", &date_options("YYYY-MM-DD")).unwrap(), "1993-10-22");

        let mut options = date_options("YYYY-MM-DD");
        options.source_day_first = true;
        assert_eq!(normalize_date("22/10/1993", &options).unwrap(), "1993-10-22");
    }

    #[test]
    fn test_date_ocr_letter_fixes_and_contiguous_digits() {
        assert_eq!(normalize_date("1O/22/l993", &date_options("MM.DD.YYYY")).unwrap(), "10.22.1993");
        assert_eq!(normalize_date("10221993", &date_options("MM/DD/YYYY")).unwrap(), "10/22/1993");
        assert_eq!(normalize_date("19931022", &date_options("YYYY.MM.DD")).unwrap(), "1993.10.22");
    }

    #[test]
    fn test_date_wrong_digit_count() {
        assert_eq!(
            normalize_date("10/22/93", &date_options("MM.DD.YYYY")),
            Err(NormalizeError::DateDigits(6))
        );
    }

    #[test]
    fn test_height_us_forms() {
        for raw in ["508", "5'08", "5'08\"", "5-08", "5 08", "5’08", "5'8"] {
            assert_eq!(normalize_height(raw, HeightMode::Us, &bounds()).unwrap(), "5'08", "{raw}");
        }
        assert_eq!(normalize_height("6", HeightMode::Us, &bounds()).unwrap(), "6'00");
        assert_eq!(normalize_height("411", HeightMode::Us, &bounds()).unwrap(), "4'11");
    }

    #[test]
    fn test_height_us_rejects_bad_inches() {
        assert!(normalize_height("5'13", HeightMode::Us, &bounds()).is_err());
        assert!(normalize_height("175", HeightMode::Us, &bounds()).is_err());
    }

    #[test]
    fn test_height_metric_forms() {
        for raw in ["1,75m", "1.75", "175cm", "175 CM", "175"] {
            assert_eq!(normalize_height(raw, HeightMode::Metric, &bounds()).unwrap(), "1,75m", "{raw}");
        }
        assert!(normalize_height("508", HeightMode::Metric, &bounds()).is_err());
    }

    #[test]
    fn test_height_auto_mode() {
        assert_eq!(normalize_height("5-07", HeightMode::Auto, &bounds()).unwrap(), "5'07");
        assert_eq!(normalize_height("507", HeightMode::Auto, &bounds()).unwrap(), "5'07");
        assert_eq!(normalize_height("182", HeightMode::Auto, &bounds()).unwrap(), "1,82m");
        assert_eq!(normalize_height("1.82m", HeightMode::Auto, &bounds()).unwrap(), "1,82m");
        assert_eq!(normalize_height("7", HeightMode::Auto, &bounds()).unwrap(), "7'00");
    }

    #[test]
    fn test_height_auto_rejects_out_of_range() {
        assert!(matches!(
            normalize_height("2", HeightMode::Auto, &bounds()),
            Err(NormalizeError::UnrecognizedHeight(_))
        ));
        assert!(normalize_height("950", HeightMode::Auto, &bounds()).is_err());
    }

    #[test]
    fn test_height_auto_overlapping_bounds_is_ambiguous() {
        let wide = HeightBounds {
            feet_min: 1,
            feet_max: 8,
            cm_min: 100,
            cm_max: 250,
        };
        assert_eq!(
            normalize_height("111", HeightMode::Auto, &wide),
            Err(NormalizeError::AmbiguousHeight("111".to_string()))
        );
    }

    #[test]
    fn test_weight() {
        assert_eq!(normalize_weight("156", WeightMode::Us).unwrap(), "156lb");
        assert_eq!(normalize_weight("WGT 156 lb", WeightMode::Us).unwrap(), "156lb");
        assert_eq!(normalize_weight("1751b", WeightMode::Us).unwrap(), "175lb");
        assert_eq!(normalize_weight("70 kg", WeightMode::Metric).unwrap(), "70kg");
        assert_eq!(normalize_weight("70 kg", WeightMode::Auto).unwrap(), "70kg");
        assert_eq!(normalize_weight("156", WeightMode::Auto).unwrap(), "156lb");
    }

    #[test]
    fn test_weight_rejections() {
        assert!(matches!(
            normalize_weight("70kg", WeightMode::Us),
            Err(NormalizeError::WeightUnitMismatch { expected: "lb", found: "kg", .. })
        ));
        assert!(normalize_weight("20", WeightMode::Us).is_err());
        assert!(normalize_weight("350", WeightMode::Metric).is_err());
    }

    #[test]
    fn test_sex() {
        assert_eq!(normalize_sex("MALE").unwrap(), "M");
        assert_eq!(normalize_sex("m").unwrap(), "M");
        assert_eq!(normalize_sex("Female").unwrap(), "F");
        assert_eq!(normalize_sex("F 5'08").unwrap(), "F");
        assert!(normalize_sex("X").is_err());
        assert!(normalize_sex("MX").is_err());
    }

    #[test]
    fn test_colors() {
        let options = NormalizationOptions::default();
        assert_eq!(normalize("brn", FormatKind::Eyes, &options).unwrap(), "BRN");
        assert_eq!(normalize("HAIR BLK EYES BRN", FormatKind::Eyes, &options).unwrap(), "BRN");
        assert_eq!(normalize("HAIR BLK EYES BRN", FormatKind::Hair, &options).unwrap(), "BLK");
        assert!(normalize("BROWN", FormatKind::Eyes, &options).is_err());
    }

    #[test]
    fn test_number_and_string() {
        let options = NormalizationOptions::default();
        assert_eq!(normalize("  d1234-567 ", FormatKind::Number, &options).unwrap(), "D1234-567");
        assert_eq!(normalize("  JOHN  ", FormatKind::String, &options).unwrap(), "JOHN");

        let titled = NormalizationOptions {
            title_case: true,
            ..NormalizationOptions::default()
        };
        assert_eq!(normalize("JOHN  smith", FormatKind::String, &titled).unwrap(), "John Smith");
    }

    #[test]
    fn test_name_profile() {
        let options = NormalizationOptions {
            text_profile: TextProfile::Name,
            ..NormalizationOptions::default()
        };
        assert_eq!(normalize("GEORGE a NICHOLAS", FormatKind::String, &options).unwrap(), "GEORGE NICHOLAS");
        assert_eq!(normalize("SMITH - -", FormatKind::String, &options).unwrap(), "SMITH");
        assert_eq!(normalize("O'BRIEN", FormatKind::String, &options).unwrap(), "O'BRIEN");
        assert_eq!(normalize("JEAN-PAUL,", FormatKind::String, &options).unwrap(), "JEAN-PAUL");
    }

    #[test]
    fn test_address_profile() {
        let options = NormalizationOptions {
            text_profile: TextProfile::Address,
            ..NormalizationOptions::default()
        };
        assert_eq!(normalize("2502 BROOKLINE de", FormatKind::String, &options).unwrap(), "2502 BROOKLINE");
        assert_eq!(normalize("123 MAIN ST apt 4B", FormatKind::String, &options).unwrap(), "123 MAIN ST 4B");
        assert_eq!(
            normalize("ARLINGTON ,TX:76006 a", FormatKind::String, &options).unwrap(),
            "ARLINGTON, TX 76006"
        );
    }

    #[test]
    fn test_empty_input() {
        let options = NormalizationOptions::default();
        assert_eq!(normalize("   ", FormatKind::Number, &options), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let cases: Vec<(&str, FormatKind, NormalizationOptions)> = vec![
            ("10/22/1993", FormatKind::Date, date_options("MM.DD.YYYY")),
            ("10/22/1993", FormatKind::Date, date_options("YYYY-MM-DD")),
            ("1993/10/22", FormatKind::Date, date_options("DD.MM.YYYY")),
            ("508", FormatKind::Height, NormalizationOptions::default()),
            (
                "175cm",
                FormatKind::Height,
                NormalizationOptions {
                    height_mode: HeightMode::Metric,
                    ..NormalizationOptions::default()
                },
            ),
            (
                "5-07",
                FormatKind::Height,
                NormalizationOptions {
                    height_mode: HeightMode::Auto,
                    ..NormalizationOptions::default()
                },
            ),
            ("156", FormatKind::Weight, NormalizationOptions::default()),
            (
                "70 KG",
                FormatKind::Weight,
                NormalizationOptions {
                    weight_mode: WeightMode::Auto,
                    ..NormalizationOptions::default()
                },
            ),
            ("FEMALE", FormatKind::Sex, NormalizationOptions::default()),
            ("EYES BRO", FormatKind::Eyes, NormalizationOptions::default()),
            ("a12b", FormatKind::Number, NormalizationOptions::default()),
            (
                "O'BRIEN jr",
                FormatKind::String,
                NormalizationOptions {
                    title_case: true,
                    text_profile: TextProfile::Name,
                    ..NormalizationOptions::default()
                },
            ),
            (
                "12 elm st, SPRINGFIELD",
                FormatKind::String,
                NormalizationOptions {
                    text_profile: TextProfile::Address,
                    ..NormalizationOptions::default()
                },
            ),
        ];

        for (raw, kind, options) in cases {
            let once = normalize(raw, kind, &options).unwrap();
            let twice = normalize(&once, kind, &options).unwrap();
            assert_eq!(once, twice, "{kind} {raw}");
        }
    }

    #[test]
    fn test_date_non_ascii_digits_are_not_date_digits() {
        let options = NormalizationOptions::default();
        assert_eq!(normalize_date("1\u{0662}\u{0663}\u{0664}5", &options), Err(NormalizeError::DateDigits(2)));
        assert_eq!(
            normalize_date("\u{0661}\u{0660}/22/1993", &options),
            Err(NormalizeError::DateDigits(6))
        );
    }

    #[test]
    fn test_date_day_first_source_to_month_first_target() {
        let mut options = date_options("MM.DD.YYYY");
        options.source_day_first = true;
        assert_eq!(normalize_date("22/10/1993", &options).unwrap(), "10.22.1993");
        assert_eq!(normalize_date("05/07/2025", &options).unwrap(), "07.05.2025");
    }

    #[test]
    fn test_date_impossible_reading_falls_back_or_fails() {
        // Month 22 is impossible, so the swapped reading is used
        assert_eq!(normalize_date("22/10/1993", &date_options("MM.DD.YYYY")).unwrap(), "10.22.1993");
        assert_eq!(
            normalize_date("13/45/1993", &date_options("MM.DD.YYYY")),
            Err(NormalizeError::ImpossibleDate("13/45/1993".to_string()))
        );
        assert!(normalize_date("1993-13-01", &date_options("YYYY-MM-DD")).is_err());
    }

    #[test]
    fn test_date_contiguous_digits_try_both_layouts() {
        assert_eq!(normalize_date("19931022", &date_options("MM.DD.YYYY")).unwrap(), "10.22.1993");
        assert_eq!(normalize_date("10221993", &date_options("YYYY-MM-DD")).unwrap(), "1993-10-22");
        assert!(normalize_date("99999999", &date_options("MM.DD.YYYY")).is_err());
    }

    #[test]
    fn test_weight_ignores_longer_digit_runs() {
        assert!(normalize_weight("1560", WeightMode::Us).is_err());
        assert_eq!(normalize_weight("ID 12345 WGT 180", WeightMode::Us).unwrap(), "180lb");
        assert_eq!(normalize_weight("4 2024 160", WeightMode::Auto).unwrap(), "160lb");
    }

    #[test]
    fn test_endorsements() {
        let cases = [
            ("9a Endorsements NONE 12 Restrictions", "NONE"),
            ("9a Endorsements H 12 Restrictions B", "H"),
            ("End. H M1 12 Rest.", "H,M1"),
            ("Sa Endorsements H.M1 12 Restrictions", "H,M1"),
            ("Endorsements HM1", "H,M1"),
            ("Endorsements H-M1", "H,M1"),
            ("Emdorsements P", "P"),
            ("Endorsements M1M2", "M1,M2"),
            ("Endorsements H (M1)", "H,M1"),
            ("9a Endorsements: H", "H"),
            ("Endorsements H M1 9 Vehicle", "H,M1"),
            ("Endorsements HM1 9 Class", "H,M1"),
            ("Endorsements H 12 Rst", "H"),
            ("Endorsements H 12 Re", "H"),
            ("Endorsements M1 P2 X", "M1,P2,X"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_endorsements(raw).unwrap(), expected, "{raw}");
        }
        assert!(normalize_endorsements("Driver License").is_err());
        assert!(matches!(
            normalize("Endorsements 12", FormatKind::Endorsements, &NormalizationOptions::default()),
            Err(NormalizeError::NoCodes { kind: "endorsement", .. })
        ));
    }

    #[test]
    fn test_restrictions() {
        let cases = [
            ("12 Restrictions A", "A"),
            ("Rest C", "C"),
            ("Restrictions NONE", "NONE"),
            ("Restrictions J01/P1", "J01,P1"),
            ("Restrictions A * B", "A,B"),
            ("Restrictions ABC", "A,B,C"),
            ("Restrictions J01J02", "J01,J02"),
            ("Restrictions A1A2", "A1,A2"),
            ("Restrictions P12", "P12"),
            ("Restrictions B 9 Vehicle", "B"),
            ("Restrictions B Class C", "B"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_restrictions(raw).unwrap(), expected, "{raw}");
        }
        assert!(normalize_restrictions("Restrictions 1, 2").is_err());
        assert!(normalize_restrictions("USA").is_err());
    }

    #[test]
    fn test_code_lists_are_idempotent() {
        for raw in ["End. H M1 12 Rest.", "Endorsements M1 P2 X"] {
            let once = normalize_endorsements(raw).unwrap();
            assert_eq!(normalize_endorsements(&once).unwrap(), once);
        }
        for raw in ["Restrictions J01/P1", "Restrictions B"] {
            let once = normalize_restrictions(raw).unwrap();
            assert_eq!(normalize_restrictions(&once).unwrap(), once);
        }
    }
}
