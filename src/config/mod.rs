//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::formats::{DateFormat, HeightBounds, HeightMode, NormalizationOptions, WeightMode};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OCR service settings
    pub ocr: OcrSettings,
    /// Zone geometry settings
    pub zones: ZoneSettings,
    /// Session file settings
    pub session: SessionSettings,
    /// Defaults for new field specs
    pub normalization: NormalizationDefaults,
    /// Test sweep settings
    pub sweep: SweepSettings,
}

/// OCR service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Endpoint accepting multipart image uploads
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Ask the service for per-model details
    pub include_details: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/ocr".to_string(),
            timeout_secs: 30,
            include_details: true,
        }
    }
}

/// Zone geometry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    /// Margin added around selected words (normalized 0-1)
    pub padding: f64,
    /// Vertical bucket used to group words into lines (normalized 0-1)
    pub line_bucket: f64,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            padding: 0.01,
            line_bucket: crate::vision::DEFAULT_LINE_BUCKET,
        }
    }
}

/// Session file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Gzip session files
    pub compress: bool,
    /// Embed image bytes in saved sessions
    pub include_images: bool,
    /// Embed OCR word indices in saved sessions
    pub include_ocr: bool,
    /// Write a rotating autosave after every change
    pub autosave: bool,
    /// Number of autosaves to keep
    pub autosave_keep: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            compress: true,
            include_images: true,
            include_ocr: true,
            autosave: false,
            autosave_keep: 10,
        }
    }
}

/// Defaults applied to newly created field specs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationDefaults {
    pub date_format: DateFormat,
    pub height_mode: HeightMode,
    pub weight_mode: WeightMode,
    /// Numeric ranges used by the auto height heuristic
    pub height_bounds: HeightBounds,
}

impl Default for NormalizationDefaults {
    fn default() -> Self {
        Self {
            date_format: DateFormat::default(),
            height_mode: HeightMode::Us,
            weight_mode: WeightMode::Us,
            height_bounds: HeightBounds::default(),
        }
    }
}

impl NormalizationDefaults {
    /// Options for a new field spec
    pub fn options(&self) -> NormalizationOptions {
        NormalizationOptions {
            date_format: self.date_format,
            height_mode: self.height_mode,
            weight_mode: self.weight_mode,
            height_bounds: self.height_bounds,
            ..NormalizationOptions::default()
        }
    }
}

/// Test sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Vote across per-model OCR outputs when the service provides them
    pub model_vote: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self { model_vote: true }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
