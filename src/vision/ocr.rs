//! OCR service client
//!
//! Sends document images to the external OCR HTTP service and turns its
//! response into words with normalized geometry, plus the per-model word
//! lists the service reports when it merges several recognizers.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{BoundingBox, WordIndex};
use crate::config::OcrSettings;

/// Errors raised while talking to the OCR service
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR service unavailable at {url}: {source}")]
    Unavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("OCR service returned HTTP {status} for {name}")]
    Status { status: u16, name: String },
    #[error("OCR service returned no result for {0}")]
    EmptyResponse(String),
    #[error("malformed OCR response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to build OCR request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Words recognized on one page, in service order
#[derive(Debug, Clone, Default)]
pub struct OcrPage {
    /// Word text and normalized box
    pub words: Vec<(String, BoundingBox)>,
    /// Model name -> word texts, aligned with `words`
    pub model_outputs: BTreeMap<String, Vec<String>>,
}

impl OcrPage {
    /// Convert into a reading-ordered word index
    pub fn into_word_index(self, line_bucket: f64) -> WordIndex {
        WordIndex::new(self.words, self.model_outputs, line_bucket)
    }
}

/// Anything that can recognize words on an image
pub trait OcrService {
    /// Run recognition on one encoded image
    fn recognize(&self, name: &str, image: &[u8]) -> Result<OcrPage, OcrError>;
}

/// HTTP client for the OCR service
pub struct HttpOcrClient {
    client: reqwest::Client,
    api_url: String,
    include_details: bool,
    /// Shared by every request so the connection pool survives between images
    runtime: Runtime,
}

impl HttpOcrClient {
    /// Create a client from the OCR settings
    pub fn new(settings: &OcrSettings) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(OcrError::Request)?;
        let runtime = Runtime::new()?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            include_details: settings.include_details,
            runtime,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn recognize_async(&self, name: &str, image: &[u8]) -> Result<OcrPage, OcrError> {
        let mime = image::guess_format(image)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");

        let part = Part::bytes(image.to_vec())
            .file_name(name.to_string())
            .mime_str(mime)
            .map_err(OcrError::Request)?;
        let form = Form::new().part("files", part);

        let include_details = if self.include_details { "true" } else { "false" };
        let response = self
            .client
            .post(&self.api_url)
            .query(&[
                ("include_details", include_details),
                ("enable_field_extraction", "false"),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(|source| OcrError::Unavailable {
                url: self.api_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Status {
                status: status.as_u16(),
                name: name.to_string(),
            });
        }

        let body = response.text().await.map_err(|source| OcrError::Unavailable {
            url: self.api_url.clone(),
            source,
        })?;
        debug!("OCR response for {}: {} bytes", name, body.len());

        parse_response(name, &body)
    }
}

impl OcrService for HttpOcrClient {
    fn recognize(&self, name: &str, image: &[u8]) -> Result<OcrPage, OcrError> {
        info!("Sending {} ({} bytes) to OCR service at {}", name, image.len(), self.api_url);

        let page = self.runtime.block_on(self.recognize_async(name, image))?;

        info!(
            "OCR returned {} words for {} ({} model outputs)",
            page.words.len(),
            name,
            page.model_outputs.len()
        );
        Ok(page)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    items: Vec<ApiPage>,
    #[serde(default)]
    model_comparison: Option<ApiModelComparison>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    blocks: Vec<ApiBlock>,
}

#[derive(Debug, Deserialize)]
struct ApiBlock {
    #[serde(default)]
    lines: Vec<ApiLine>,
}

#[derive(Debug, Deserialize)]
struct ApiLine {
    #[serde(default)]
    words: Vec<ApiWord>,
}

#[derive(Debug, Deserialize)]
struct ApiWord {
    #[serde(default)]
    value: String,
    #[serde(default)]
    geometry: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiModelComparison {
    #[serde(default)]
    per_model_outputs: BTreeMap<String, ApiModelOutput>,
}

#[derive(Debug, Deserialize)]
struct ApiModelOutput {
    #[serde(default)]
    words: Vec<String>,
}

/// Parse an OCR service response body (a JSON array, one entry per file)
pub fn parse_response(name: &str, body: &str) -> Result<OcrPage, OcrError> {
    let results: Vec<ApiResult> = serde_json::from_str(body)?;
    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::EmptyResponse(name.to_string()))?;

    // Service positions of the accepted words; model lists follow service order
    let mut kept = Vec::new();
    let mut words = Vec::new();
    if let Some(page) = result.items.first() {
        let service_words = page.blocks.iter().flat_map(|b| &b.lines).flat_map(|l| &l.words);
        for (position, word) in service_words.enumerate() {
            if word.value.trim().is_empty() {
                continue;
            }
            if let Some(bbox) = parse_geometry(&word.geometry) {
                kept.push(position);
                words.push((word.value.clone(), bbox));
            }
        }
    }

    let model_outputs = result
        .model_comparison
        .map(|mc| {
            mc.per_model_outputs
                .into_iter()
                .filter(|(_, output)| !output.words.is_empty())
                .map(|(model, output)| {
                    let aligned = kept
                        .iter()
                        .map(|&position| output.words.get(position).cloned().unwrap_or_default())
                        .collect();
                    (model, aligned)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(OcrPage { words, model_outputs })
}

/// Accepts `[x1, y1, x2, y2]` or `[[x1, y1], [x2, y2]]`
fn parse_geometry(value: &serde_json::Value) -> Option<BoundingBox> {
    let items = value.as_array()?;
    let coords: Vec<f64> = match items.len() {
        4 => items.iter().filter_map(|v| v.as_f64()).collect(),
        2 => items
            .iter()
            .filter_map(|p| p.as_array())
            .flat_map(|p| p.iter().filter_map(|v| v.as_f64()))
            .collect(),
        _ => return None,
    };

    if coords.len() != 4 {
        return None;
    }
    Some(BoundingBox::new(coords[0], coords[1], coords[2], coords[3]))
}
