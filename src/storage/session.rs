//! Session files
//!
//! Sessions are stored as JSON, gzip-compressed by default, with images
//! embedded as base64. Loading accepts compressed or plain files and
//! migrates sessions written before the format was versioned, as well as
//! 2.0 sessions saved by the Python zone builder.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analysis::{FieldSpec, FormatKind, NormalizationOptions, Zone};
use crate::config::SessionSettings;
use crate::shared::{Session, SessionError, TemplateMetadata, SESSION_VERSION};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const AUTOSAVE_PREFIX: &str = "session_";
const AUTOSAVE_SUFFIX: &str = ".json.gz";

/// What goes into a saved session
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub compress: bool,
    pub include_images: bool,
    pub include_ocr: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compress: true,
            include_images: true,
            include_ocr: true,
        }
    }
}

impl From<&SessionSettings> for SaveOptions {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            compress: settings.compress,
            include_images: settings.include_images,
            include_ocr: settings.include_ocr,
        }
    }
}

/// Serialize a session to file bytes
pub fn encode_session(session: &Session, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut session = session.clone();
    session.version = SESSION_VERSION.to_string();
    if !options.include_images {
        session.strip_image_bytes();
    }
    if !options.include_ocr {
        session.strip_ocr();
    }

    if options.compress {
        let json = serde_json::to_vec(&session)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        Ok(encoder.finish()?)
    } else {
        Ok(serde_json::to_vec_pretty(&session)?)
    }
}

/// Parse file bytes (gzip or plain JSON) into a checked session
pub fn decode_session(data: &[u8]) -> Result<Session> {
    let json = if data.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        GzDecoder::new(data)
            .read_to_string(&mut text)
            .context("Failed to decompress session")?;
        text
    } else {
        String::from_utf8(data.to_vec()).context("Session file is neither gzip nor UTF-8 JSON")?
    };

    let value: serde_json::Value = serde_json::from_str(&json).context("Session file is not valid JSON")?;
    let session = session_from_value(value)?;
    session.validate()?;
    Ok(session)
}

fn session_from_value(value: serde_json::Value) -> Result<Session, SessionError> {
    let version = value.get("version").and_then(|v| v.as_str()).map(str::to_string);

    match version.as_deref() {
        // Our sessions always carry an id, the Python tool's never do
        Some(v) if v.starts_with("2.") && value.get("id").is_some() => Ok(serde_json::from_value(value)?),
        Some(v) if v.starts_with("2.") => {
            info!("Migrating version {} session from the Python zone builder", v);
            migrate_python_session(value)
        }
        None => {
            info!("Migrating unversioned session to {}", SESSION_VERSION);
            migrate_legacy(value)
        }
        Some(v) if v.starts_with("1.") => {
            info!("Migrating version {} session to {}", v, SESSION_VERSION);
            migrate_legacy(value)
        }
        Some(v) => Err(SessionError::UnsupportedVersion(v.to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
struct LegacyZone {
    #[serde(default)]
    y_range: Option<(f64, f64)>,
    #[serde(default)]
    x_range: Option<(f64, f64)>,
    #[serde(default)]
    format: Option<String>,
    /// Validation pattern
    #[serde(default)]
    pattern: String,
    #[serde(default)]
    cleanup_pattern: String,
}

#[derive(Debug, Default, Deserialize)]
struct LegacySession {
    #[serde(default)]
    zones: BTreeMap<String, LegacyZone>,
    #[serde(default)]
    current_field: Option<String>,
    #[serde(default)]
    metadata: Option<TemplateMetadata>,
}

/// Convert a pre-2.0 session (zone configs keyed by field, no images)
pub fn migrate_legacy(value: serde_json::Value) -> Result<Session, SessionError> {
    let legacy: LegacySession = serde_json::from_value(value)?;
    let mut session = Session::new(legacy.metadata.unwrap_or_default());

    for (name, zone) in legacy.zones {
        let format_kind = zone
            .format
            .as_deref()
            .and_then(|f| f.parse::<FormatKind>().ok())
            .unwrap_or_else(|| FormatKind::detect(&name));

        session.set_field_spec(FieldSpec {
            field_name: name.clone(),
            format_kind,
            cleanup_pattern: zone.cleanup_pattern,
            validation_pattern: zone.pattern,
            normalization_options: NormalizationOptions::default(),
        })?;

        let y_range = zone.y_range.unwrap_or((0.0, 1.0));
        let x_range = zone.x_range.unwrap_or((0.0, 1.0));
        // A full-page range means the zone was never drawn
        if y_range != (0.0, 1.0) || x_range != (0.0, 1.0) {
            session.restore_zone(Zone {
                field_name: name,
                y_range,
                x_range,
                selected_word_indices: BTreeMap::new(),
            })?;
        }
    }

    session.current_field = legacy.current_field.filter(|f| session.field(f).is_some());
    Ok(session)
}

#[derive(Debug, Deserialize)]
struct PythonImage {
    name: String,
    #[serde(default)]
    image_base64: Option<String>,
    #[serde(default)]
    ocr_result: Option<serde_json::Value>,
    #[serde(default)]
    words: Option<serde_json::Value>,
}

/// Convert a 2.0 session saved by the Python zone builder: zones migrate as
/// legacy zones, embedded images are loaded, OCR results are not kept
fn migrate_python_session(mut value: serde_json::Value) -> Result<Session, SessionError> {
    let images = value.get_mut("images").map(serde_json::Value::take).unwrap_or_default();
    let images: Vec<PythonImage> = if images.is_null() {
        Vec::new()
    } else {
        serde_json::from_value(images)?
    };
    let mut session = migrate_legacy(value)?;

    let mut dropped_ocr = 0;
    for image in images {
        if image.ocr_result.is_some() || image.words.is_some() {
            dropped_ocr += 1;
        }
        let Some(encoded) = image.image_base64 else {
            warn!("Session image {} was saved without its pixels, skipping", image.name);
            continue;
        };
        let bytes = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Session image {} has invalid base64: {}", image.name, e);
                continue;
            }
        };
        if let Err(e) = session.add_image(&image.name, bytes) {
            warn!("Skipping session image {}: {}", image.name, e);
        }
    }

    if dropped_ocr > 0 {
        info!("Dropped OCR results for {} image(s); run OCR again to rebuild them", dropped_ocr);
    }
    Ok(session)
}

/// Write bytes to `path` through a temporary file in the same directory
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Session path has no file name")?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move session into {}", path.display()))?;
    Ok(())
}

/// Save a session to disk
pub fn save_session(session: &Session, path: &Path, options: &SaveOptions) -> Result<()> {
    let bytes = encode_session(session, options)?;
    write_atomic(path, &bytes)?;
    info!(
        "Saved session to {} ({} images, {} fields, {} bytes)",
        path.display(),
        session.images().len(),
        session.fields().len(),
        bytes.len()
    );
    Ok(())
}

/// Load a session from disk
pub fn load_session(path: &Path) -> Result<Session> {
    let data = fs::read(path).with_context(|| format!("Failed to read session {}", path.display()))?;
    let session = decode_session(&data).with_context(|| format!("Failed to load session {}", path.display()))?;
    info!(
        "Loaded session {} ({} images, {} fields, {} zones)",
        path.display(),
        session.images().len(),
        session.fields().len(),
        session.zones().len()
    );
    Ok(session)
}

fn autosave_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(AUTOSAVE_PREFIX) && n.ends_with(AUTOSAVE_SUFFIX))
        })
        .collect();
    // Timestamped names sort chronologically
    files.sort();
    Ok(files)
}

/// Write a timestamped autosave and keep only the newest `keep`
pub fn autosave(session: &Session, dir: &Path, keep: usize, options: &SaveOptions) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("{AUTOSAVE_PREFIX}{timestamp}{AUTOSAVE_SUFFIX}"));

    let options = SaveOptions {
        compress: true,
        ..*options
    };
    save_session(session, &path, &options)?;

    let removed = cleanup_old_autosaves(dir, keep)?;
    if removed > 0 {
        debug!("Removed {} old autosaves", removed);
    }
    Ok(path)
}

/// Delete all but the newest `keep` autosaves. Returns how many were removed.
pub fn cleanup_old_autosaves(dir: &Path, keep: usize) -> Result<usize> {
    let files = autosave_files(dir)?;
    let excess = files.len().saturating_sub(keep);

    for path in &files[..excess] {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(excess)
}

/// A session file found on disk
#[derive(Debug, Clone)]
pub struct SavedSessionInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub metadata: TemplateMetadata,
    pub num_images: usize,
    pub num_fields: usize,
    pub num_zones: usize,
}

/// Autosaves in `dir`, newest first. Unreadable files are skipped.
pub fn list_saved_sessions(dir: &Path) -> Result<Vec<SavedSessionInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for path in autosave_files(dir)?.into_iter().rev() {
        let stat = fs::metadata(&path)?;
        let session = match fs::read(&path).map_err(anyhow::Error::from).and_then(|d| decode_session(&d)) {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not read session {}: {:#}", path.display(), e);
                continue;
            }
        };

        sessions.push(SavedSessionInfo {
            size: stat.len(),
            modified: stat.modified().map(DateTime::<Local>::from).unwrap_or_else(|_| Local::now()),
            metadata: session.metadata.clone(),
            num_images: session.images().len(),
            num_fields: session.fields().len(),
            num_zones: session.zones().len(),
            path,
        });
    }
    Ok(sessions)
}

/// Human readable overview of a session
pub fn summary(session: &Session) -> String {
    let recognized = session.images().iter().filter(|img| img.words.is_some()).count();
    let embedded = session.images().iter().filter(|img| !img.bytes.is_empty()).count();

    let mut lines = vec![
        format!("Template: {} ({})", session.metadata.template_name, session.metadata.class_name),
        format!("Document type: {}", session.metadata.document_type),
        format!("Version: {}", session.version),
        format!("Created: {}", session.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")),
        format!(
            "Images: {} ({} with OCR, {} embedded)",
            session.images().len(),
            recognized,
            embedded
        ),
        format!("Fields: {}", session.fields().len()),
        format!("Zones: {}", session.zones().len()),
    ];
    if let Some(current) = &session.current_field {
        lines.push(format!("Current field: {}", current));
    }
    lines.join("\n")
}
