//! zone-builder - Define, test and export OCR extraction zones
//!
//! Loads sample document images, sends them to an OCR service, and lets the
//! user map selected words to named fields with cleanup, validation and
//! normalization rules. Every command works on one session file.

mod analysis;
mod app;
mod config;
mod shared;
mod storage;
mod vision;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::formats::{DateFormat, HeightMode, TextProfile, WeightMode};
use crate::analysis::{FormatKind, SweepReport};
use crate::app::ZoneBuilderApp;
use crate::config::AppConfig;
use crate::shared::TemplateMetadata;
use crate::vision::HttpOcrClient;

const DEFAULT_SESSION: &str = "zone_session.json.gz";

/// zone-builder - OCR zone and field pattern builder
#[derive(Parser, Debug)]
#[command(name = "zone-builder")]
#[command(about = "Define, test and export OCR extraction zones for document templates")]
struct Cli {
    /// Session file to work on
    #[arg(short, long, global = true, default_value = DEFAULT_SESSION)]
    session: PathBuf,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new session
    New {
        #[arg(long, default_value = "my_template")]
        template_name: String,
        /// Python class name used by `export python`, must be an identifier
        #[arg(long, default_value = "MyTemplate")]
        class_name: String,
        #[arg(long, default_value = "Driver License")]
        document_type: String,
        #[arg(long = "template-version", default_value = "1.0")]
        template_version: String,
        /// Replace an existing session file
        #[arg(long)]
        force: bool,
    },
    /// Add images and run OCR on the ones without results
    Ocr {
        images: Vec<PathBuf>,
        /// Run OCR again on every image
        #[arg(long)]
        reprocess: bool,
    },
    /// List recognized words of an image with their indices
    Words {
        #[arg(short, long, default_value_t = 0)]
        image: usize,
    },
    /// Create, update, remove or list field specs
    Field {
        #[command(subcommand)]
        action: FieldAction,
    },
    /// Select the words that make up a field's zone on one image
    Select {
        field: String,
        #[arg(short, long, default_value_t = 0)]
        image: usize,
        /// Word indices, comma separated
        #[arg(short, long, value_delimiter = ',')]
        words: Vec<usize>,
        /// Clear the selection on this image
        #[arg(long, conflicts_with = "words")]
        clear: bool,
    },
    /// Run a field (or all fields) over every image
    Test {
        field: Option<String>,
        /// Ignore per-model OCR outputs
        #[arg(long)]
        no_vote: bool,
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the template
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import fields and zones from a JSON export or a Python template (.py)
    Import { path: PathBuf },
    /// Show per-field configuration status
    Status,
    /// Show a session summary
    Info,
    /// List autosaved sessions
    Sessions,
}

#[derive(Subcommand, Debug)]
enum FieldAction {
    /// Add or update a field
    Set(FieldArgs),
    /// Remove a field and its zone
    Remove { name: String },
    /// List fields
    List,
    /// List the supported formats
    Formats,
}

#[derive(Args, Debug)]
struct FieldArgs {
    name: String,
    /// Value format (guessed from the name for new fields)
    #[arg(long)]
    format: Option<FormatKind>,
    /// Regex whose matches are removed before validation
    #[arg(long)]
    cleanup: Option<String>,
    /// Regex the cleaned text must match
    #[arg(long)]
    validation: Option<String>,
    /// Use the suggested validation pattern for the format
    #[arg(long, conflicts_with = "validation")]
    suggest: bool,
    #[arg(long)]
    date_format: Option<DateFormat>,
    /// Read NN/NN/YYYY sources as day first (implied by a DD.MM.YYYY or DD/MM/YYYY target)
    #[arg(long)]
    day_first: Option<bool>,
    #[arg(long)]
    height_mode: Option<HeightMode>,
    #[arg(long)]
    weight_mode: Option<WeightMode>,
    #[arg(long)]
    title_case: Option<bool>,
    #[arg(long)]
    profile: Option<TextProfile>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Python,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_or_create_config(cli.config.as_deref());
    run(cli.command, config, &cli.session)
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> AppConfig {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => storage::get_config_dir().ok().map(|dir| dir.join("config.toml")),
    };

    if let Some(config_path) = config_path {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => tracing::warn!("Ignoring unreadable config {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn run(command: Command, config: AppConfig, session_path: &Path) -> Result<()> {
    match command {
        Command::New {
            template_name,
            class_name,
            document_type,
            template_version,
            force,
        } => {
            let metadata = TemplateMetadata {
                template_name,
                class_name,
                document_type,
                version: template_version,
            };
            let app = ZoneBuilderApp::create(config, session_path, metadata, force)?;
            app.save()?;
            println!("Created {}", app.session_path().display());
        }
        Command::Ocr { images, reprocess } => {
            let mut app = ZoneBuilderApp::open(config, session_path)?;
            let added = app.add_images(&images)?;
            println!("Added {} new image(s), {} loaded", added, app.session.images().len());

            let client = HttpOcrClient::new(&app.config.ocr)?;
            let summary = app.run_ocr(&client, reprocess)?;
            app.save()?;

            println!("OCR processed {} image(s)", summary.processed);
            for name in &summary.skipped {
                println!("  skipped {} (no image data in session)", name);
            }
            if !summary.failed.is_empty() {
                for (name, reason) in &summary.failed {
                    println!("  failed {}: {}", name, reason);
                }
                bail!("OCR failed for {} image(s)", summary.failed.len());
            }
        }
        Command::Words { image } => {
            let app = ZoneBuilderApp::open(config, session_path)?;
            let img = app.session.image(image)?;
            let words = img
                .words
                .as_ref()
                .with_context(|| format!("{} has no OCR results (run `zone-builder ocr`)", img.name))?;

            println!("{} ({}x{}), {} words", img.name, img.width, img.height, words.len());
            for word in words.words() {
                let b = &word.bbox;
                println!(
                    "{:>4}  {:<24} x {:.3}-{:.3}  y {:.3}-{:.3}",
                    word.order_index, word.text, b.x_min, b.x_max, b.y_min, b.y_max
                );
            }
        }
        Command::Field { action } => run_field(action, config, session_path)?,
        Command::Select {
            field,
            image,
            words,
            clear,
        } => {
            if words.is_empty() && !clear {
                bail!("Give --words or --clear");
            }
            let mut app = ZoneBuilderApp::open(config, session_path)?;
            let selected: BTreeSet<usize> = words.into_iter().collect();

            match app.select(&field, image, selected)? {
                Some(zone) => {
                    println!(
                        "Zone '{}': y {:.3}-{:.3}  x {:.3}-{:.3} ({} words)",
                        field,
                        zone.y_range.0,
                        zone.y_range.1,
                        zone.x_range.0,
                        zone.x_range.1,
                        zone.selected_count()
                    );
                    for (name, text) in app.zone_texts(&field)? {
                        println!("  {}: {}", name, text.unwrap_or_default());
                    }
                }
                None => println!("Zone '{}' removed (no words selected)", field),
            }
            app.save()?;
        }
        Command::Test { field, no_vote, json } => {
            let app = ZoneBuilderApp::open(config, session_path)?;
            let reports = app.test(field.as_deref(), !no_vote)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                }
            }
        }
        Command::Export { format, output } => {
            let app = ZoneBuilderApp::open(config, session_path)?;
            let text = match format {
                ExportFormat::Json => storage::template::export_json(&app.session)?,
                ExportFormat::Python => storage::template::export_python(&app.session)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", text),
            }
        }
        Command::Import { path } => {
            let mut app = ZoneBuilderApp::open(config, session_path)?;
            let count = storage::template::import_file(&mut app.session, &path)?;
            app.save()?;
            println!("Imported {} field(s)", count);
        }
        Command::Status => {
            let app = ZoneBuilderApp::open(config, session_path)?;
            let statuses = storage::template::preview_zone_status(&app.session);
            println!("{}", storage::template::render_status(&statuses));
        }
        Command::Info => {
            let app = ZoneBuilderApp::open(config, session_path)?;
            println!("{}", storage::session::summary(&app.session));
        }
        Command::Sessions => {
            let dir = storage::get_sessions_dir()?;
            let sessions = storage::session::list_saved_sessions(&dir)?;
            if sessions.is_empty() {
                println!("No autosaved sessions in {}", dir.display());
            }
            for saved in sessions {
                println!(
                    "{}  {}  {} images, {} fields, {} zones, {:.1} KB  {}",
                    saved.modified.format("%Y-%m-%d %H:%M:%S"),
                    saved.metadata.template_name,
                    saved.num_images,
                    saved.num_fields,
                    saved.num_zones,
                    saved.size as f64 / 1024.0,
                    saved.path.display()
                );
            }
        }
    }
    Ok(())
}

fn run_field(action: FieldAction, config: AppConfig, session_path: &Path) -> Result<()> {
    match action {
        FieldAction::Set(args) => {
            let mut app = ZoneBuilderApp::open(config, session_path)?;
            let mut spec = app
                .session
                .field(&args.name)
                .cloned()
                .unwrap_or_else(|| app.new_field_spec(&args.name));

            if let Some(format) = args.format {
                spec.format_kind = format;
            }
            if let Some(cleanup) = args.cleanup {
                spec.cleanup_pattern = cleanup;
            }
            let options = &mut spec.normalization_options;
            if let Some(date_format) = args.date_format {
                options.date_format = date_format;
            }
            if let Some(day_first) = args.day_first {
                options.source_day_first = day_first;
            }
            if let Some(mode) = args.height_mode {
                options.height_mode = mode;
            }
            if let Some(mode) = args.weight_mode {
                options.weight_mode = mode;
            }
            if let Some(title_case) = args.title_case {
                options.title_case = title_case;
            }
            if let Some(profile) = args.profile {
                options.text_profile = profile;
            }
            if let Some(validation) = args.validation {
                spec.validation_pattern = validation;
            } else if args.suggest || args.format.is_some() {
                spec.validation_pattern =
                    analysis::formats::suggested_validation_pattern(spec.format_kind, &spec.normalization_options);
            }

            println!(
                "{} [{}] cleanup: {:?} validation: {:?}",
                spec.field_name, spec.format_kind, spec.cleanup_pattern, spec.validation_pattern
            );
            app.session.set_field_spec(spec)?;
            app.save()?;
        }
        FieldAction::Remove { name } => {
            let mut app = ZoneBuilderApp::open(config, session_path)?;
            app.session.remove_field(&name)?;
            app.save()?;
            println!("Removed {}", name);
        }
        FieldAction::List => {
            let app = ZoneBuilderApp::open(config, session_path)?;
            for (name, spec) in app.session.fields() {
                let zone = if app.session.zone(name).is_some() { "zone" } else { "no zone" };
                let marker = if app.session.current_field.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{} {:<24} {:<8} {}", marker, name, spec.format_kind, zone);
            }
        }
        FieldAction::Formats => {
            for kind in FormatKind::ALL {
                println!("{:<8} {}", kind, kind.help_text());
            }
        }
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!(
        "{}: {}/{} valid ({:.0}%)",
        report.field_name,
        report.valid,
        report.total,
        report.success_rate * 100.0
    );
    for result in report.results.iter().filter(|r| r.is_valid) {
        match &result.consensus {
            Some(c) => println!(
                "  ok   {}: {} ({}/{} models, agreement {:.2})",
                result.image, result.value, c.votes, c.total, c.agreement
            ),
            None => println!("  ok   {}: {}", result.image, result.value),
        }
    }
    for failure in &report.failures {
        println!(
            "  FAIL {}: {} (raw {:?}, cleaned {:?})",
            failure.image, failure.reason, failure.raw, failure.cleaned
        );
    }
}
