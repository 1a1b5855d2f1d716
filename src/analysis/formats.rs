//! Field formats and their normalization options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value a field holds, which selects its normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Free text, trimmed
    #[default]
    String,
    Date,
    Height,
    Weight,
    /// M or F
    Sex,
    /// AAMVA eye color code
    Eyes,
    /// AAMVA hair color code
    Hair,
    /// Uppercase alphanumeric codes
    Number,
    /// AAMVA endorsement codes, sorted and comma separated
    Endorsements,
    /// AAMVA restriction codes, sorted and comma separated
    Restrictions,
}

impl FormatKind {
    pub const ALL: [FormatKind; 10] = [
        FormatKind::String,
        FormatKind::Date,
        FormatKind::Height,
        FormatKind::Weight,
        FormatKind::Sex,
        FormatKind::Eyes,
        FormatKind::Hair,
        FormatKind::Number,
        FormatKind::Endorsements,
        FormatKind::Restrictions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::String => "string",
            FormatKind::Date => "date",
            FormatKind::Height => "height",
            FormatKind::Weight => "weight",
            FormatKind::Sex => "sex",
            FormatKind::Eyes => "eyes",
            FormatKind::Hair => "hair",
            FormatKind::Number => "number",
            FormatKind::Endorsements => "endorsements",
            FormatKind::Restrictions => "restrictions",
        }
    }

    /// One-line description for help output
    pub fn help_text(&self) -> &'static str {
        match self {
            FormatKind::String => "Default text format - trimmed, optional title case",
            FormatKind::Date => {
                "Date values - re-ordered to the target format; NN/NN/YYYY sources are read day first \
                 with --day-first or a DD target, month first otherwise; impossible months/days are invalid"
            }
            FormatKind::Height => "Height values - normalized to US (5'08) or metric (1,75m)",
            FormatKind::Weight => "Weight values - normalized to US (150lb) or metric (68kg)",
            FormatKind::Sex => "Sex values - normalized to M or F",
            FormatKind::Eyes => "Eye color - AAMVA code as printed (BRO, BRN, BLU, ...)",
            FormatKind::Hair => "Hair color - AAMVA code as printed (BLK, BRO, BLN, ...)",
            FormatKind::Number => "Numeric/code fields - uppercase alphanumeric",
            FormatKind::Endorsements => "Endorsements - AAMVA codes (H, M1, P, ...) or NONE, comma separated",
            FormatKind::Restrictions => "Restrictions - AAMVA codes (A, B, J01, P12, ...) or NONE, comma separated",
        }
    }

    /// Formats whose normalizer does its own filtering, so a field of this
    /// kind is complete without a validation pattern
    pub fn validation_optional(&self) -> bool {
        matches!(
            self,
            FormatKind::String | FormatKind::Endorsements | FormatKind::Restrictions
        )
    }

    /// Guess a format from a field name
    ///
    /// `date_of_birth` -> date, `hgt` -> height, `dl_number` -> number,
    /// `first_name` -> string.
    pub fn detect(field_name: &str) -> FormatKind {
        let name = field_name.to_lowercase();

        if name.contains("date") {
            FormatKind::Date
        } else if name.contains("height") || name == "hgt" || name == "ht" {
            FormatKind::Height
        } else if name.contains("weight") || name == "wgt" || name == "wt" {
            FormatKind::Weight
        } else if name == "sex" || name == "gender" {
            FormatKind::Sex
        } else if name.contains("eye") {
            FormatKind::Eyes
        } else if name.contains("hair") {
            FormatKind::Hair
        } else if name.contains("endorse") {
            FormatKind::Endorsements
        } else if name.contains("restrict") {
            FormatKind::Restrictions
        } else if ["number", "code", "dl", "license"].iter().any(|k| name.contains(k)) {
            FormatKind::Number
        } else {
            FormatKind::String
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        FormatKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| format!("unknown format '{}'", s))
    }
}

/// Order of the date components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateOrder {
    Dmy,
    Mdy,
    Ymd,
}

/// Target date layout, e.g. `MM.DD.YYYY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateFormat {
    pub order: DateOrder,
    pub delimiter: char,
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            order: DateOrder::Mdy,
            delimiter: '.',
        }
    }
}

impl DateFormat {
    /// Formats offered in the template system
    pub const PRESETS: [&'static str; 6] = [
        "DD.MM.YYYY",
        "MM.DD.YYYY",
        "DD/MM/YYYY",
        "MM/DD/YYYY",
        "YYYY.MM.DD",
        "YYYY-MM-DD",
    ];
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.delimiter;
        match self.order {
            DateOrder::Dmy => write!(f, "DD{d}MM{d}YYYY"),
            DateOrder::Mdy => write!(f, "MM{d}DD{d}YYYY"),
            DateOrder::Ymd => write!(f, "YYYY{d}MM{d}DD"),
        }
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let delimiter = upper
            .chars()
            .find(|c| matches!(c, '.' | '/' | '-'))
            .ok_or_else(|| format!("date format '{}' has no delimiter", s))?;

        let parts: Vec<&str> = upper.split(delimiter).collect();
        let order = match parts.as_slice() {
            ["DD", "MM", "YYYY"] => DateOrder::Dmy,
            ["MM", "DD", "YYYY"] => DateOrder::Mdy,
            ["YYYY", "MM", "DD"] => DateOrder::Ymd,
            _ => return Err(format!("unsupported date format '{}'", s)),
        };

        Ok(Self { order, delimiter })
    }
}

impl TryFrom<String> for DateFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateFormat> for String {
    fn from(value: DateFormat) -> Self {
        value.to_string()
    }
}

/// Height normalization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightMode {
    /// Feet and inches: 5'08
    #[default]
    Us,
    /// Meters: 1,75m
    Metric,
    /// Decide per value
    Auto,
}

/// Weight normalization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Pounds: 150lb
    #[default]
    Us,
    /// Kilograms: 68kg
    Metric,
    /// Kilograms when the text says so, pounds otherwise
    Auto,
}

macro_rules! mode_from_str {
    ($ty:ident) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    "us" => Ok($ty::Us),
                    "metric" => Ok($ty::Metric),
                    "auto" => Ok($ty::Auto),
                    other => Err(format!("unknown mode '{}' (expected us, metric or auto)", other)),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $ty::Us => "us",
                    $ty::Metric => "metric",
                    $ty::Auto => "auto",
                })
            }
        }
    };
}

mode_from_str!(HeightMode);
mode_from_str!(WeightMode);

/// Numeric ranges for telling feet from centimeters in auto mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightBounds {
    pub feet_min: u32,
    pub feet_max: u32,
    pub cm_min: u32,
    pub cm_max: u32,
}

impl Default for HeightBounds {
    fn default() -> Self {
        Self {
            feet_min: 4,
            feet_max: 8,
            cm_min: 120,
            cm_max: 230,
        }
    }
}

/// Extra cleaning for free-text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextProfile {
    #[default]
    Plain,
    /// Uppercase letters, apostrophes and hyphens only
    Name,
    /// Uppercase letters, digits and `, - # /`
    Address,
}

impl FromStr for TextProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(TextProfile::Plain),
            "name" => Ok(TextProfile::Name),
            "address" => Ok(TextProfile::Address),
            other => Err(format!("unknown text profile '{}'", other)),
        }
    }
}

/// Per-field normalization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationOptions {
    pub date_format: DateFormat,
    /// Read `NN NN YYYY` sources as day first when converting to a year-first target
    pub source_day_first: bool,
    pub height_mode: HeightMode,
    pub height_bounds: HeightBounds,
    pub weight_mode: WeightMode,
    pub title_case: bool,
    pub text_profile: TextProfile,
}

/// Suggested validation pattern for the cleaned, pre-normalization text
pub fn suggested_validation_pattern(kind: FormatKind, options: &NormalizationOptions) -> String {
    match kind {
        FormatKind::Date => r"^(?:\d{2}[./\-]\d{2}[./\-]\d{4}|\d{4}[./\-]\d{2}[./\-]\d{2})$".to_string(),
        FormatKind::Height => match options.height_mode {
            HeightMode::Us => r#"(?i)^\d\s*['’\-]?\s*\d{2}"?$"#.to_string(),
            HeightMode::Metric => r"(?i)^(?:\d[.,]\d{2}\s*M?|\d{3}\s*CM)$".to_string(),
            HeightMode::Auto => r#"(?i)^(?:\d\s*['’\-]?\s*\d{2}"?|\d[.,]\d{2}\s*M?|\d{3}\s*CM)$"#.to_string(),
        },
        FormatKind::Weight => match options.weight_mode {
            WeightMode::Us => r"(?i)^\d{2,3}\s*(?:LBS?)?$".to_string(),
            WeightMode::Metric => r"(?i)^\d{2,3}\s*(?:KG)?$".to_string(),
            WeightMode::Auto => r"(?i)^\d{2,3}\s*(?:LBS?|KG)?$".to_string(),
        },
        FormatKind::Sex => r"(?i)^(?:M|F|MALE|FEMALE)$".to_string(),
        FormatKind::Eyes | FormatKind::Hair => r"^[A-Z]{3}$".to_string(),
        FormatKind::Number => r"^[A-Z0-9]+$".to_string(),
        FormatKind::String | FormatKind::Endorsements | FormatKind::Restrictions => String::new(),
    }
}
