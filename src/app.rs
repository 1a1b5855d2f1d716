//! Application Coordinator
//!
//! Owns the configuration and the working session for one command, and
//! takes care of loading, saving and autosaving around each change.

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::analysis::{sweep_all, sweep_field, FieldSpec, SweepOptions, SweepReport, Zone};
use crate::config::AppConfig;
use crate::shared::{Session, TemplateMetadata};
use crate::storage;
use crate::storage::session::SaveOptions;
use crate::vision::OcrService;

/// Result of an OCR pass over the session's images
#[derive(Debug, Default)]
pub struct OcrSummary {
    pub processed: usize,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Main application coordinator
pub struct ZoneBuilderApp {
    pub config: AppConfig,
    pub session: Session,
    session_path: PathBuf,
}

impl ZoneBuilderApp {
    /// Start a new session file. Refuses to overwrite unless `force` is set.
    pub fn create(config: AppConfig, session_path: &Path, metadata: TemplateMetadata, force: bool) -> Result<Self> {
        if session_path.exists() && !force {
            bail!(
                "{} already exists (use --force to replace it)",
                session_path.display()
            );
        }

        let app = Self {
            config,
            session: Session::new(metadata),
            session_path: session_path.to_path_buf(),
        };
        info!("Created session {} at {}", app.session.id, session_path.display());
        Ok(app)
    }

    /// Open an existing session file
    pub fn open(config: AppConfig, session_path: &Path) -> Result<Self> {
        if !session_path.exists() {
            bail!(
                "No session at {} (run `zone-builder new` first)",
                session_path.display()
            );
        }
        let session = storage::session::load_session(session_path)?;
        Ok(Self {
            config,
            session,
            session_path: session_path.to_path_buf(),
        })
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    fn padding(&self) -> f64 {
        self.config.zones.padding
    }

    fn line_bucket(&self) -> f64 {
        self.config.zones.line_bucket
    }

    /// Save the session, plus an autosave when enabled
    pub fn save(&self) -> Result<()> {
        let options = SaveOptions::from(&self.config.session);
        storage::session::save_session(&self.session, &self.session_path, &options)?;

        if self.config.session.autosave {
            let result = storage::get_sessions_dir().and_then(|dir| {
                storage::session::autosave(&self.session, &dir, self.config.session.autosave_keep, &options)
            });
            // The primary save succeeded, so a failed autosave is only logged
            if let Err(e) = result {
                warn!("Autosave failed: {:#}", e);
            }
        }
        Ok(())
    }

    /// Load image files into the session. Returns the number newly added.
    pub fn add_images(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let mut added = 0;
        for path in paths {
            let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let (_, is_new) = self.session.add_image(&name, bytes)?;
            if is_new {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Run OCR on images without results, or on all of them when `reprocess` is set.
    ///
    /// A failing image is recorded and the rest still run.
    pub fn run_ocr(&mut self, service: &dyn OcrService, reprocess: bool) -> Result<OcrSummary> {
        let mut summary = OcrSummary::default();

        for index in self.session.images_needing_ocr(reprocess) {
            let image = self.session.image(index)?;
            let name = image.name.clone();
            if image.bytes.is_empty() {
                warn!("{} was saved without image data, skipping OCR", name);
                summary.skipped.push(name);
                continue;
            }

            match service.recognize(&name, &image.bytes) {
                Ok(page) => {
                    let words = page.into_word_index(self.line_bucket());
                    self.session.set_words(index, words, self.padding())?;
                    summary.processed += 1;
                }
                Err(e) => {
                    error!("OCR failed for {}: {}", name, e);
                    summary.failed.push((name, e.to_string()));
                }
            }
        }
        Ok(summary)
    }

    /// New spec for a field, with the configured normalization defaults
    pub fn new_field_spec(&self, name: &str) -> FieldSpec {
        FieldSpec::new(name, self.config.normalization.options())
    }

    /// Replace the words selected for a field on one image
    pub fn select(&mut self, field: &str, image: usize, words: BTreeSet<usize>) -> Result<Option<Zone>> {
        let padding = self.padding();
        let zone = self.session.select_words(field, image, words, padding)?;
        Ok(zone.cloned())
    }

    pub fn sweep_options(&self, model_vote: bool) -> SweepOptions {
        SweepOptions {
            line_bucket: self.line_bucket(),
            model_vote: model_vote && self.config.sweep.model_vote,
        }
    }

    /// Test one field, or every field when `field` is None
    pub fn test(&self, field: Option<&str>, model_vote: bool) -> Result<Vec<SweepReport>> {
        let options = self.sweep_options(model_vote);
        let images = self.session.sweep_images();

        match field {
            Some(name) => {
                let spec = self
                    .session
                    .field(name)
                    .with_context(|| format!("No field named '{}'", name))?;
                Ok(vec![sweep_field(spec, self.session.zone(name), &images, &options)])
            }
            None => Ok(sweep_all(self.session.fields(), self.session.zones(), &images, &options)),
        }
    }

    /// Text the field's zone covers on each image
    pub fn zone_texts(&self, field: &str) -> Result<Vec<(String, Option<String>)>> {
        (0..self.session.images().len())
            .map(|i| {
                let text = self.session.zone_text(field, i, self.line_bucket())?;
                Ok((self.session.images()[i].name.clone(), text))
            })
            .collect()
    }
}
