//! Shared session state
//!
//! The session aggregate that every command loads, mutates and saves.

pub mod state;

pub use state::{content_hash, DocumentImage, Session, SessionError, TemplateMetadata, SESSION_VERSION};
