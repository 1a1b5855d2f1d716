//! Field Analysis
//!
//! Zone geometry, the cleanup/validation/normalization pipeline and the
//! test sweep that runs a field over every loaded image.

pub mod formats;
pub mod normalize;
pub mod pipeline;
pub mod sweep;
pub mod zone;

pub use formats::{FormatKind, NormalizationOptions};
pub use pipeline::{run_pipeline, FailureReason, FieldSpec, PatternError, PipelineOutcome};
pub use sweep::{sweep_all, sweep_field, SweepImage, SweepOptions, SweepReport};
pub use zone::{compute_zone, Selection, Zone};
