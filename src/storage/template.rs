//! Template export and import
//!
//! A finished session is exported as a JSON field document or as Python
//! template source with a `FIELD_ZONES` literal. Both can be read back
//! into a session.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

use super::python::{self, PyValue};
use crate::analysis::formats::{DateFormat, HeightMode, TextProfile, WeightMode};
use crate::analysis::{FieldSpec, FormatKind, NormalizationOptions, Zone};
use crate::shared::{Session, TemplateMetadata};

static PY_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));
static CLASS_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^class\s+([A-Za-z_][A-Za-z0-9_]*)\s*[(:]").expect("class regex"));

const PY_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

fn is_python_identifier(name: &str) -> bool {
    PY_IDENTIFIER.is_match(name) && !PY_KEYWORDS.contains(&name)
}

/// Zone coordinates in an export
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportedZone {
    pub y_range: (f64, f64),
    pub x_range: (f64, f64),
}

/// One field in an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedField {
    pub format: FormatKind,
    #[serde(default)]
    pub cleanup_pattern: String,
    #[serde(default)]
    pub validation_pattern: String,
    #[serde(default)]
    pub normalization: NormalizationOptions,
    #[serde(default)]
    pub zone: Option<ExportedZone>,
}

/// JSON export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExport {
    pub metadata: TemplateMetadata,
    pub generated_at: DateTime<Utc>,
    pub fields: BTreeMap<String, ExportedField>,
}

impl TemplateExport {
    pub fn from_session(session: &Session) -> Self {
        let fields = session
            .fields()
            .iter()
            .map(|(name, spec)| {
                let zone = session.zone(name).map(|z| ExportedZone {
                    y_range: z.y_range,
                    x_range: z.x_range,
                });
                let field = ExportedField {
                    format: spec.format_kind,
                    cleanup_pattern: spec.cleanup_pattern.clone(),
                    validation_pattern: spec.validation_pattern.clone(),
                    normalization: spec.normalization_options,
                    zone,
                };
                (name.clone(), field)
            })
            .collect();

        Self {
            metadata: session.metadata.clone(),
            generated_at: Utc::now(),
            fields,
        }
    }
}

/// Export a session as a pretty-printed JSON document
pub fn export_json(session: &Session) -> Result<String> {
    Ok(serde_json::to_string_pretty(&TemplateExport::from_session(session))?)
}

/// Read a JSON export into a session, replacing fields with the same name.
/// Returns the number of fields imported.
pub fn import_json(session: &mut Session, text: &str) -> Result<usize> {
    let export: TemplateExport = serde_json::from_str(text).context("Not a template export")?;
    session.metadata = export.metadata;

    let count = export.fields.len();
    for (name, field) in export.fields {
        session.set_field_spec(FieldSpec {
            field_name: name.clone(),
            format_kind: field.format,
            cleanup_pattern: field.cleanup_pattern,
            validation_pattern: field.validation_pattern,
            normalization_options: field.normalization,
        })?;

        if let Some(zone) = field.zone {
            session.restore_zone(Zone {
                field_name: name,
                y_range: zone.y_range,
                x_range: zone.x_range,
                selected_word_indices: BTreeMap::new(),
            })?;
        }
    }

    info!("Imported {} fields into template '{}'", count, session.metadata.template_name);
    Ok(count)
}

/// Read a template file into a session: `.py` files as Python templates,
/// anything else as a JSON export
pub fn import_file(session: &mut Session, path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("py") => import_python(session, &text),
        _ => import_json(session, &text),
    }
    .with_context(|| format!("Failed to import {}", path.display()))
}

/// Read a Python template into a session, replacing fields with the same
/// name. Metadata found in the file overrides the session's.
/// Returns the number of fields imported.
pub fn import_python(session: &mut Session, text: &str) -> Result<usize> {
    let zones = python::parse_assignment(text, "FIELD_ZONES").context("Not a Python template")?;
    let PyValue::Dict(entries) = zones else {
        bail!("FIELD_ZONES is not a dict");
    };

    // Parse everything before touching the session
    let mut fields = Vec::with_capacity(entries.len());
    for (key, config) in &entries {
        let name = key.as_str().ok_or_else(|| anyhow!("FIELD_ZONES key {:?} is not a string", key))?;
        let field = python_field(name, config).with_context(|| format!("Field '{}'", name))?;
        fields.push((name.to_string(), field));
    }

    if let Some(caps) = CLASS_DEF.captures(text) {
        session.metadata.class_name = caps[1].to_string();
    }
    if let Ok(PyValue::Str(name)) = python::parse_assignment(text, "document_type") {
        session.metadata.template_name = name;
    }
    if let Ok(PyValue::Str(version)) = python::parse_assignment(text, "version") {
        session.metadata.version = version;
    }
    if let Ok(PyValue::Str(doc)) = python::parse_literal(text.trim_start()) {
        if let Some(kind) = doc.trim().lines().next().and_then(|l| l.strip_suffix(" template")) {
            session.metadata.document_type = kind.to_string();
        }
    }

    let count = fields.len();
    for (name, field) in fields {
        session.set_field_spec(FieldSpec {
            field_name: name.clone(),
            format_kind: field.format,
            cleanup_pattern: field.cleanup_pattern,
            validation_pattern: field.validation_pattern,
            normalization_options: field.normalization,
        })?;
        if let Some(zone) = field.zone {
            session.restore_zone(Zone {
                field_name: name,
                y_range: zone.y_range,
                x_range: zone.x_range,
                selected_word_indices: BTreeMap::new(),
            })?;
        }
    }

    info!(
        "Imported {} fields from Python template '{}'",
        count, session.metadata.template_name
    );
    Ok(count)
}

fn python_string<'v>(config: &'v PyValue, key: &str) -> Result<Option<&'v str>> {
    match config.get(key) {
        None | Some(PyValue::None) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| anyhow!("'{}' must be a string", key)),
    }
}

fn python_flag(config: &PyValue, key: &str) -> Result<bool> {
    match config.get(key) {
        None => Ok(false),
        Some(value) => value.as_bool().ok_or_else(|| anyhow!("'{}' must be True or False", key)),
    }
}

fn python_range(config: &PyValue, key: &str) -> Result<Option<(f64, f64)>> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };
    let (lo, hi) = value.as_pair().ok_or_else(|| anyhow!("'{}' must be a pair of numbers", key))?;
    if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
        bail!("'{}' ({}, {}) is not an ordered range within 0-1", key, lo, hi);
    }
    Ok(Some((lo, hi)))
}

fn python_field(name: &str, config: &PyValue) -> Result<ExportedField> {
    let PyValue::Dict(entries) = config else {
        bail!("configuration is not a dict");
    };

    let format = match python_string(config, "format")? {
        Some(text) => text.parse::<FormatKind>().map_err(|e| anyhow!(e))?,
        None => FormatKind::detect(name),
    };

    let mut normalization = NormalizationOptions::default();
    if let Some(text) = python_string(config, "date_format")? {
        normalization.date_format = text.parse::<DateFormat>().map_err(|e| anyhow!(e))?;
    }
    if let Some(text) = python_string(config, "height_format")? {
        normalization.height_mode = text.parse::<HeightMode>().map_err(|e| anyhow!(e))?;
    }
    if let Some(text) = python_string(config, "weight_format")? {
        normalization.weight_mode = text.parse::<WeightMode>().map_err(|e| anyhow!(e))?;
    }
    if let Some(text) = python_string(config, "text_profile")? {
        normalization.text_profile = text.parse::<TextProfile>().map_err(|e| anyhow!(e))?;
    }
    normalization.source_day_first = python_flag(config, "source_day_first")?;
    normalization.title_case = python_flag(config, "title_case")?;

    let zone = match (python_range(config, "y_range")?, python_range(config, "x_range")?) {
        (Some(y_range), Some(x_range)) => Some(ExportedZone { y_range, x_range }),
        (None, None) => None,
        _ => bail!("needs both y_range and x_range"),
    };

    const KNOWN: [&str; 11] = [
        "format",
        "date_format",
        "height_format",
        "weight_format",
        "text_profile",
        "source_day_first",
        "title_case",
        "y_range",
        "x_range",
        "cleanup_pattern",
        "pattern",
    ];
    for (key, _) in entries {
        if let Some(key) = key.as_str().filter(|k| !KNOWN.contains(k)) {
            debug!("Field '{}': ignoring template key '{}'", name, key);
        }
    }

    Ok(ExportedField {
        format,
        cleanup_pattern: python_string(config, "cleanup_pattern")?.unwrap_or_default().to_string(),
        validation_pattern: python_string(config, "pattern")?.unwrap_or_default().to_string(),
        normalization,
        zone,
    })
}

/// Python string literal for a regex, raw when possible
fn python_str(value: &str) -> String {
    let trailing_backslashes = value.chars().rev().take_while(|&c| c == '\\').count();
    let raw_ok = trailing_backslashes % 2 == 0 && !value.contains('\n');

    if raw_ok && !value.contains('\'') {
        format!("r'{}'", value)
    } else if raw_ok && !value.contains('"') {
        format!("r\"{}\"", value)
    } else {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n");
        format!("'{}'", escaped)
    }
}

fn python_options(spec: &FieldSpec) -> Vec<(&'static str, String)> {
    let options = &spec.normalization_options;
    let mut entries = Vec::new();

    match spec.format_kind {
        FormatKind::Date => {
            entries.push(("date_format", python_str(&options.date_format.to_string())));
            if options.source_day_first {
                entries.push(("source_day_first", "True".to_string()));
            }
        }
        FormatKind::Height => entries.push(("height_format", python_str(&options.height_mode.to_string()))),
        FormatKind::Weight => entries.push(("weight_format", python_str(&options.weight_mode.to_string()))),
        FormatKind::String => {
            if options.title_case {
                entries.push(("title_case", "True".to_string()));
            }
            match options.text_profile {
                TextProfile::Plain => {}
                TextProfile::Name => entries.push(("text_profile", python_str("name"))),
                TextProfile::Address => entries.push(("text_profile", python_str("address"))),
            }
        }
        _ => {}
    }
    entries
}

/// Export a session as Python template source. Fails when the class name
/// is not a Python identifier.
pub fn export_python(session: &Session) -> Result<String> {
    let meta = &session.metadata;
    if !is_python_identifier(&meta.class_name) {
        bail!("Class name '{}' is not a valid Python identifier", meta.class_name);
    }
    let mut out = String::new();

    let _ = writeln!(out, "\"\"\"");
    let _ = writeln!(
        out,
        "{} template",
        meta.document_type.replace('\\', "\\\\").replace('"', "\\\"")
    );
    let _ = writeln!(out, "Generated by zone-builder on {}", Utc::now().format("%Y-%m-%d"));
    let _ = writeln!(out, "\"\"\"");
    let _ = writeln!(out);
    let _ = writeln!(out);
    let _ = writeln!(out, "class {}(object):", meta.class_name);
    let _ = writeln!(out, "    document_type = {}", python_str(&meta.template_name));
    let _ = writeln!(out, "    version = {}", python_str(&meta.version));
    let _ = writeln!(out);
    let _ = writeln!(out, "    FIELD_ZONES = {{");

    for (name, spec) in session.fields() {
        let Some(zone) = session.zone(name) else {
            warn!("Field '{}' has no zone and is left out of the Python export", name);
            continue;
        };

        let _ = writeln!(out, "        {}: {{", python_str(name));
        let _ = writeln!(out, "            'y_range': ({:.3}, {:.3}),", zone.y_range.0, zone.y_range.1);
        let _ = writeln!(out, "            'x_range': ({:.3}, {:.3}),", zone.x_range.0, zone.x_range.1);
        let _ = writeln!(out, "            'format': '{}',", spec.format_kind);
        for (key, value) in python_options(spec) {
            let _ = writeln!(out, "            '{}': {},", key, value);
        }
        if !spec.cleanup_pattern.is_empty() {
            let _ = writeln!(out, "            'cleanup_pattern': {},", python_str(&spec.cleanup_pattern));
        }
        if !spec.validation_pattern.is_empty() {
            let _ = writeln!(out, "            'pattern': {},", python_str(&spec.validation_pattern));
        }
        let _ = writeln!(out, "        }},");
    }

    let _ = writeln!(out, "    }}");
    Ok(out)
}

/// How far along a field's configuration is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneStatus {
    Complete,
    /// Zone drawn, something still missing
    Partial(Vec<&'static str>),
    NoZone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldStatus {
    pub field_name: String,
    pub status: ZoneStatus,
    pub zone: Option<ExportedZone>,
}

/// Per-field configuration status, in field-name order
pub fn preview_zone_status(session: &Session) -> Vec<FieldStatus> {
    session
        .fields()
        .iter()
        .map(|(name, spec)| {
            let zone = session.zone(name).map(|z| ExportedZone {
                y_range: z.y_range,
                x_range: z.x_range,
            });

            let status = if zone.is_none() {
                ZoneStatus::NoZone
            } else {
                let mut missing = Vec::new();
                if spec.validation_pattern.is_empty() && !spec.format_kind.validation_optional() {
                    missing.push("validation pattern");
                }
                if let Err(e) = crate::analysis::pipeline::FieldPipeline::compile(spec) {
                    warn!("{}: {}", name, e);
                    missing.push("compilable patterns");
                }
                if missing.is_empty() {
                    ZoneStatus::Complete
                } else {
                    ZoneStatus::Partial(missing)
                }
            };

            FieldStatus {
                field_name: name.clone(),
                status,
                zone,
            }
        })
        .collect()
}

/// Text rendering of [`preview_zone_status`]
pub fn render_status(statuses: &[FieldStatus]) -> String {
    let mut out = String::new();
    for status in statuses {
        let label = match &status.status {
            ZoneStatus::Complete => "complete".to_string(),
            ZoneStatus::Partial(missing) => format!("partial (missing {})", missing.join(", ")),
            ZoneStatus::NoZone => "no zone".to_string(),
        };
        match status.zone {
            Some(z) => {
                let _ = writeln!(
                    out,
                    "{:<24} {:<40} y {:.3}-{:.3}  x {:.3}-{:.3}",
                    status.field_name, label, z.y_range.0, z.y_range.1, z.x_range.0, z.x_range.1
                );
            }
            None => {
                let _ = writeln!(out, "{:<24} {}", status.field_name, label);
            }
        }
    }

    let complete = statuses.iter().filter(|s| s.status == ZoneStatus::Complete).count();
    let _ = write!(out, "{}/{} fields complete", complete, statuses.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::state::tests::sample_session;
    use std::collections::BTreeSet;

    fn configured_session() -> Session {
        let mut session = sample_session();
        let words: BTreeSet<usize> = [1].into_iter().collect();
        session.select_words("date_of_birth", 0, words, 0.01).unwrap();

        let mut spec = session.field("date_of_birth").unwrap().clone();
        spec.cleanup_pattern = r"^.*?(?=\d{2}/\d{2}/\d{4})".to_string();
        session.set_field_spec(spec).unwrap();

        let mut name = FieldSpec::new("first_name", NormalizationOptions::default());
        name.normalization_options.text_profile = TextProfile::Name;
        session.set_field_spec(name).unwrap();
        session
    }

    #[test]
    fn test_python_str_quoting() {
        assert_eq!(python_str(r"^\d{2}$"), r"r'^\d{2}$'");
        assert_eq!(python_str("it's"), "r\"it's\"");
        assert_eq!(python_str(r#"a'b"c"#), r#"'a\'b"c'"#);
        assert_eq!(python_str(r"ends\"), r"'ends\\'");
    }

    #[test]
    fn test_export_python() {
        let code = export_python(&configured_session()).unwrap();

        assert!(code.contains("class MyTemplate(object):"));
        assert!(code.contains("    document_type = r'my_template'"));
        assert!(code.contains("    FIELD_ZONES = {\n"));
        assert!(code.contains("        r'date_of_birth': {"));
        assert!(code.contains("            'y_range': (0.390, 0.450),"));
        assert!(code.contains("            'x_range': (0.360, 0.510),"));
        assert!(code.contains("            'date_format': r'MM.DD.YYYY',"));
        assert!(code.contains(r"'cleanup_pattern': r'^.*?(?=\d{2}/\d{2}/\d{4})',"));
        // No zone, not exported
        assert!(!code.contains("first_name"));
        assert!(code.ends_with("    }\n"));
    }

    #[test]
    fn test_json_export_import() {
        let session = configured_session();
        let json = export_json(&session).unwrap();

        let mut restored = Session::default();
        let count = import_json(&mut restored, &json).unwrap();
        assert_eq!(count, 2);
        assert_eq!(restored.fields(), session.fields());
        assert_eq!(restored.metadata, session.metadata);

        let zone = restored.zone("date_of_birth").unwrap();
        let original = session.zone("date_of_birth").unwrap();
        assert_eq!(zone.y_range, original.y_range);
        assert_eq!(zone.x_range, original.x_range);
        assert!(zone.selected_word_indices.is_empty());
        assert!(restored.zone("first_name").is_none());
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_import_rejects_other_json() {
        let mut session = Session::default();
        assert!(import_json(&mut session, r#"{"zones": {}}"#).is_err());
    }

    #[test]
    fn test_zone_status_preview() {
        let mut session = configured_session();
        let mut sex = FieldSpec::new("sex", NormalizationOptions::default());
        sex.validation_pattern.clear();
        session.set_field_spec(sex).unwrap();
        let words: BTreeSet<usize> = [3].into_iter().collect();
        session.select_words("sex", 0, words, 0.01).unwrap();

        let statuses = preview_zone_status(&session);
        let by_name: BTreeMap<&str, &ZoneStatus> =
            statuses.iter().map(|s| (s.field_name.as_str(), &s.status)).collect();

        assert_eq!(by_name["date_of_birth"], &ZoneStatus::Complete);
        assert_eq!(by_name["first_name"], &ZoneStatus::NoZone);
        assert_eq!(by_name["sex"], &ZoneStatus::Partial(vec!["validation pattern"]));

        let text = render_status(&statuses);
        assert!(text.ends_with("1/3 fields complete"));
        assert!(text.contains("partial (missing validation pattern)"));
    }

    const HAND_WRITTEN: &str = r#""""
Texas DL template
"""


class TexasDL(object):
    document_type = "texas_dl"
    version = '2.0'

    FIELD_ZONES = {
        'dob': {
            'y_range': (0.40, 0.46),
            'x_range': [0.30, 0.55],
            'format': 'date',
            'date_format': 'MM/DD/YYYY',
            'pattern': r'^\d{2}/\d{2}/\d{4}$',
            'labels': ["DOB"],  # matched fuzzily
        },
        "sex": {'format': 'sex', 'uppercase': True},
    }
"#;

    #[test]
    fn test_import_hand_written_python_template() {
        let mut session = Session::default();
        let count = import_python(&mut session, HAND_WRITTEN).unwrap();
        assert_eq!(count, 2);

        assert_eq!(session.metadata.class_name, "TexasDL");
        assert_eq!(session.metadata.template_name, "texas_dl");
        assert_eq!(session.metadata.version, "2.0");
        assert_eq!(session.metadata.document_type, "Texas DL");

        let dob = session.field("dob").unwrap();
        assert_eq!(dob.format_kind, FormatKind::Date);
        assert_eq!(dob.validation_pattern, r"^\d{2}/\d{2}/\d{4}$");
        assert!(dob.cleanup_pattern.is_empty());
        assert_eq!(dob.normalization_options.date_format.to_string(), "MM/DD/YYYY");

        let zone = session.zone("dob").unwrap();
        assert_eq!(zone.y_range, (0.40, 0.46));
        assert_eq!(zone.x_range, (0.30, 0.55));
        assert_eq!(session.field("sex").unwrap().format_kind, FormatKind::Sex);
        assert!(session.zone("sex").is_none());
    }

    #[test]
    fn test_python_export_import_round_trip() {
        let mut session = configured_session();
        session.metadata.document_type = r#"Driver "Permit" \ Card"#.to_string();
        session.metadata.template_name = "it's_template".to_string();
        let mut spec = session.field("date_of_birth").unwrap().clone();
        spec.normalization_options.source_day_first = true;
        spec.validation_pattern = r#"^\d{2}/\d{2}/\d{4}$"#.to_string();
        session.set_field_spec(spec).unwrap();

        let code = export_python(&session).unwrap();
        let mut restored = Session::default();
        let count = import_python(&mut restored, &code).unwrap();

        // first_name has no zone and is not exported
        assert_eq!(count, 1);
        assert_eq!(restored.metadata, session.metadata);
        assert_eq!(restored.field("date_of_birth"), session.field("date_of_birth"));
        assert!(restored.field("first_name").is_none());

        let zone = restored.zone("date_of_birth").unwrap();
        let original = session.zone("date_of_birth").unwrap();
        assert!((zone.y_range.0 - original.y_range.0).abs() < 5e-4);
        assert!((zone.y_range.1 - original.y_range.1).abs() < 5e-4);
        assert!((zone.x_range.0 - original.x_range.0).abs() < 5e-4);
        assert!((zone.x_range.1 - original.x_range.1).abs() < 5e-4);
    }

    #[test]
    fn test_export_python_quotes_field_names() {
        let mut session = configured_session();
        let words: BTreeSet<usize> = [3].into_iter().collect();
        for name in ["it's", r"back\"] {
            session.set_field_spec(FieldSpec::new(name, NormalizationOptions::default())).unwrap();
            session.select_words(name, 0, words.clone(), 0.01).unwrap();
        }

        let code = export_python(&session).unwrap();
        assert!(code.contains(r#"        r"it's": {"#));
        assert!(code.contains(r"        'back\\': {"));

        let mut restored = Session::default();
        assert_eq!(import_python(&mut restored, &code).unwrap(), 3);
        assert!(restored.zone("it's").is_some());
        assert!(restored.zone(r"back\").is_some());
    }

    #[test]
    fn test_export_python_rejects_bad_class_name() {
        for name in ["My Template", "class", "1st", "X(object):\n    pass\nimport os\nclass Y", ""] {
            let mut session = configured_session();
            session.metadata.class_name = name.to_string();
            assert!(export_python(&session).is_err(), "{:?}", name);
        }

        let mut session = configured_session();
        session.metadata.class_name = "_Texas_DL2".to_string();
        assert!(export_python(&session).is_ok());
    }

    #[test]
    fn test_import_python_rejects_bad_templates() {
        let cases = [
            "class A(object):\n    pass\n",
            "FIELD_ZONES = {'dob': {'y_range': (0.5, 0.2), 'x_range': (0.1, 0.2)}}",
            "FIELD_ZONES = {'dob': {'y_range': (0.1, 0.2)}}",
            "FIELD_ZONES = {'dob': {'format': 'colour'}}",
            "FIELD_ZONES = {'dob': {'date_format': 'YY/MM'}}",
            "FIELD_ZONES = {'dob': {'title_case': 'yes'}}",
            "FIELD_ZONES = {'ok': {}, 'dob': load_zones()}",
            "FIELD_ZONES = {1: {}}",
        ];
        for text in cases {
            let mut session = Session::default();
            assert!(import_python(&mut session, text).is_err(), "{}", text);
            assert!(session.fields().is_empty(), "{}", text);
        }
    }

    #[test]
    fn test_import_file_by_extension() {
        let session = configured_session();
        let dir = tempfile::tempdir().unwrap();
        let py = dir.path().join("template.py");
        let json = dir.path().join("template.json");
        std::fs::write(&py, export_python(&session).unwrap()).unwrap();
        std::fs::write(&json, export_json(&session).unwrap()).unwrap();

        let mut from_py = Session::default();
        assert_eq!(import_file(&mut from_py, &py).unwrap(), 1);
        let mut from_json = Session::default();
        assert_eq!(import_file(&mut from_json, &json).unwrap(), 2);

        // A Python template is not JSON
        let mut wrong = Session::default();
        let misnamed = dir.path().join("template.txt");
        std::fs::write(&misnamed, export_python(&session).unwrap()).unwrap();
        assert!(import_file(&mut wrong, &misnamed).is_err());
    }
}
