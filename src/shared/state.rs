//! Session state shared by every command
//!
//! A [`Session`] owns the loaded images, their OCR word indices, the field
//! specs and the zones. All mutation goes through its methods so the
//! cross-references between them stay valid.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::sweep::SweepImage;
use crate::analysis::zone::{compute_zone, Selection, Zone};
use crate::analysis::FieldSpec;
use crate::vision::WordIndex;

/// Version written into new session files
pub const SESSION_VERSION: &str = "2.0";

static EMPTY_INDEX: Lazy<WordIndex> = Lazy::new(WordIndex::default);

/// Session invariant violations and decode problems
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("field name must not be empty")]
    EmptyFieldName,
    #[error("no field named '{0}'")]
    UnknownField(String),
    #[error("image index {index} out of range ({count} images loaded)")]
    ImageOutOfRange { index: usize, count: usize },
    #[error("image {0} has not been through OCR yet")]
    NotRecognized(usize),
    #[error("word {word} out of range for image {image} ({count} words)")]
    WordOutOfRange { image: usize, word: usize, count: usize },
    #[error("zone '{0}' has no field spec")]
    OrphanZone(String),
    #[error("entry '{key}' is named '{name}'")]
    KeyMismatch { key: String, name: String },
    #[error("unsupported session version '{0}'")]
    UnsupportedVersion(String),
    #[error("'{name}' is not a readable image: {source}")]
    UnreadableImage {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("session data is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Template naming used by the exporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateMetadata {
    pub template_name: String,
    pub class_name: String,
    pub document_type: String,
    pub version: String,
}

impl Default for TemplateMetadata {
    fn default() -> Self {
        Self {
            template_name: "my_template".to_string(),
            class_name: "MyTemplate".to_string(),
            document_type: "Driver License".to_string(),
            version: "1.0".to_string(),
        }
    }
}

/// A loaded sample image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentImage {
    pub name: String,
    /// Encoded image file, empty when the session was saved without images
    #[serde(with = "base64_bytes", default)]
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`
    pub sha256: String,
    pub width: u32,
    pub height: u32,
    /// None until OCR has run
    #[serde(default)]
    pub words: Option<WordIndex>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Hex SHA-256 of an image file
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Everything one template-building session works on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TemplateMetadata,
    #[serde(default)]
    images: Vec<DocumentImage>,
    #[serde(default)]
    fields: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    zones: BTreeMap<String, Zone>,
    /// Field the user is working on
    #[serde(default)]
    pub current_field: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(TemplateMetadata::default())
    }
}

impl Session {
    pub fn new(metadata: TemplateMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: SESSION_VERSION.to_string(),
            created_at: Utc::now(),
            metadata,
            images: Vec::new(),
            fields: BTreeMap::new(),
            zones: BTreeMap::new(),
            current_field: None,
        }
    }

    pub fn images(&self) -> &[DocumentImage] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Result<&DocumentImage, SessionError> {
        self.images.get(index).ok_or(SessionError::ImageOutOfRange {
            index,
            count: self.images.len(),
        })
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldSpec> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn zones(&self) -> &BTreeMap<String, Zone> {
        &self.zones
    }

    pub fn zone(&self, field_name: &str) -> Option<&Zone> {
        self.zones.get(field_name)
    }

    /// Index of an already loaded image with this content hash
    pub fn find_image_by_hash(&self, sha256: &str) -> Option<usize> {
        self.images.iter().position(|img| img.sha256 == sha256)
    }

    /// Load an image. Returns its index and whether it was newly added;
    /// an image with the same content is only stored once.
    pub fn add_image(&mut self, name: &str, bytes: Vec<u8>) -> Result<(usize, bool), SessionError> {
        let sha256 = content_hash(&bytes);
        if let Some(index) = self.find_image_by_hash(&sha256) {
            debug!("{} is already loaded as image {}", name, index);
            return Ok((index, false));
        }

        let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| SessionError::UnreadableImage {
                name: name.to_string(),
                source: image::ImageError::IoError(e),
            })?
            .into_dimensions()
            .map_err(|source| SessionError::UnreadableImage {
                name: name.to_string(),
                source,
            })?;

        self.images.push(DocumentImage {
            name: name.to_string(),
            bytes,
            sha256,
            width,
            height,
            words: None,
        });
        info!("Added image {} ({}x{})", name, width, height);
        Ok((self.images.len() - 1, true))
    }

    /// Indices of images that still need OCR, or all of them when reprocessing
    pub fn images_needing_ocr(&self, reprocess: bool) -> Vec<usize> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, img)| reprocess || img.words.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Store the OCR result for an image.
    ///
    /// Selections on that image pointing past the new word list are dropped
    /// and the affected zones recomputed.
    pub fn set_words(&mut self, index: usize, words: WordIndex, padding: f64) -> Result<(), SessionError> {
        let count = self.images.len();
        let image = self
            .images
            .get_mut(index)
            .ok_or(SessionError::ImageOutOfRange { index, count })?;
        let word_count = words.len();
        image.words = Some(words);

        let affected: Vec<(String, Selection)> = self
            .zones
            .iter()
            .filter_map(|(name, zone)| {
                let selected = zone.selected_word_indices.get(&index)?;
                if selected.iter().all(|&w| w < word_count) {
                    return None;
                }
                let mut selection = zone.selected_word_indices.clone();
                if let Some(words) = selection.get_mut(&index) {
                    words.retain(|&w| w < word_count);
                }
                Some((name.clone(), selection))
            })
            .collect();

        for (field, selection) in affected {
            warn!("Dropping stale selections of '{}' on image {}", field, index);
            self.set_selection(&field, selection, padding)?;
        }
        Ok(())
    }

    /// Add or replace a field spec and make it the current field
    pub fn set_field_spec(&mut self, spec: FieldSpec) -> Result<(), SessionError> {
        if spec.field_name.trim().is_empty() {
            return Err(SessionError::EmptyFieldName);
        }
        let name = spec.field_name.clone();
        self.fields.insert(name.clone(), spec);
        self.current_field = Some(name);
        Ok(())
    }

    /// Remove a field and its zone
    pub fn remove_field(&mut self, name: &str) -> Result<FieldSpec, SessionError> {
        let spec = self
            .fields
            .remove(name)
            .ok_or_else(|| SessionError::UnknownField(name.to_string()))?;
        self.zones.remove(name);
        if self.current_field.as_deref() == Some(name) {
            self.current_field = None;
        }
        Ok(spec)
    }

    fn word_indices(&self) -> Vec<&WordIndex> {
        self.images
            .iter()
            .map(|img| img.words.as_ref().unwrap_or(&EMPTY_INDEX))
            .collect()
    }

    fn check_selection(&self, selection: &Selection) -> Result<(), SessionError> {
        for (&image, words) in selection {
            let img = self.image(image)?;
            if words.is_empty() {
                continue;
            }
            let index = img.words.as_ref().ok_or(SessionError::NotRecognized(image))?;
            if let Some(&word) = words.iter().find(|&&w| w >= index.len()) {
                return Err(SessionError::WordOutOfRange {
                    image,
                    word,
                    count: index.len(),
                });
            }
        }
        Ok(())
    }

    /// Replace a field's selection and recompute its zone.
    ///
    /// An empty selection removes the zone and returns None.
    pub fn set_selection(
        &mut self,
        field_name: &str,
        selection: Selection,
        padding: f64,
    ) -> Result<Option<&Zone>, SessionError> {
        if !self.fields.contains_key(field_name) {
            return Err(SessionError::UnknownField(field_name.to_string()));
        }
        self.check_selection(&selection)?;

        let selection: Selection = selection.into_iter().filter(|(_, words)| !words.is_empty()).collect();
        let zone = compute_zone(field_name, &selection, &self.word_indices(), padding);

        match zone {
            Some(zone) => {
                debug!(
                    "Zone '{}': x {:.3}-{:.3}, y {:.3}-{:.3} from {} words",
                    field_name,
                    zone.x_range.0,
                    zone.x_range.1,
                    zone.y_range.0,
                    zone.y_range.1,
                    zone.selected_count()
                );
                self.zones.insert(field_name.to_string(), zone);
                Ok(self.zones.get(field_name))
            }
            None => {
                self.zones.remove(field_name);
                Ok(None)
            }
        }
    }

    /// Replace the selected words on one image, keeping other images' selections
    pub fn select_words(
        &mut self,
        field_name: &str,
        image: usize,
        words: BTreeSet<usize>,
        padding: f64,
    ) -> Result<Option<&Zone>, SessionError> {
        let mut selection = self
            .zones
            .get(field_name)
            .map(|z| z.selected_word_indices.clone())
            .unwrap_or_default();
        selection.insert(image, words);
        self.set_selection(field_name, selection, padding)
    }

    /// Insert a zone with fixed coordinates, as read back from an export
    pub fn restore_zone(&mut self, zone: Zone) -> Result<(), SessionError> {
        if !self.fields.contains_key(&zone.field_name) {
            return Err(SessionError::OrphanZone(zone.field_name));
        }
        self.check_selection(&zone.selected_word_indices)?;
        self.zones.insert(zone.field_name.clone(), zone);
        Ok(())
    }

    /// Text the field's zone covers on one image. None when the field has no zone.
    pub fn zone_text(&self, field_name: &str, image: usize, line_bucket: f64) -> Result<Option<String>, SessionError> {
        if !self.fields.contains_key(field_name) {
            return Err(SessionError::UnknownField(field_name.to_string()));
        }
        let img = self.image(image)?;
        let index = img.words.as_ref().unwrap_or(&EMPTY_INDEX);
        Ok(self.zones.get(field_name).map(|zone| zone.text(index, line_bucket)))
    }

    /// Every image in the shape the sweep wants
    pub fn sweep_images(&self) -> Vec<SweepImage<'_>> {
        self.images
            .iter()
            .map(|img| SweepImage {
                name: &img.name,
                words: img.words.as_ref().unwrap_or(&EMPTY_INDEX),
            })
            .collect()
    }

    /// Drop embedded image bytes, keeping hashes and OCR
    pub fn strip_image_bytes(&mut self) {
        for img in &mut self.images {
            img.bytes.clear();
        }
    }

    /// Drop OCR results, keeping images
    pub fn strip_ocr(&mut self) {
        for img in &mut self.images {
            img.words = None;
        }
    }

    /// Check the cross-references between fields, zones and images
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(self.version.starts_with("1.") || self.version.starts_with("2.")) {
            return Err(SessionError::UnsupportedVersion(self.version.clone()));
        }

        for (key, spec) in &self.fields {
            if key != &spec.field_name {
                return Err(SessionError::KeyMismatch {
                    key: key.clone(),
                    name: spec.field_name.clone(),
                });
            }
        }

        for (key, zone) in &self.zones {
            if key != &zone.field_name {
                return Err(SessionError::KeyMismatch {
                    key: key.clone(),
                    name: zone.field_name.clone(),
                });
            }
            if !self.fields.contains_key(key) {
                return Err(SessionError::OrphanZone(key.clone()));
            }
            for (&image, words) in &zone.selected_word_indices {
                let img = self.image(image)?;
                // Sessions saved without OCR cannot be checked word by word
                if let Some(index) = &img.words {
                    if let Some(&word) = words.iter().find(|&&w| w >= index.len()) {
                        return Err(SessionError::WordOutOfRange {
                            image,
                            word,
                            count: index.len(),
                        });
                    }
                }
            }
        }

        if let Some(current) = &self.current_field {
            if !self.fields.contains_key(current) {
                return Err(SessionError::UnknownField(current.clone()));
            }
        }
        Ok(())
    }
}
