//! Storage Layer
//!
//! Handles persistence of sessions, autosaves and template exports.

mod python;
pub mod session;
pub mod template;

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "zonebuilder", "ZoneBuilder")
        .ok_or_else(|| anyhow::anyhow!("Could not determine application directories"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Get the autosave directory
pub fn get_sessions_dir() -> Result<PathBuf> {
    let sessions_dir = get_data_dir()?.join("sessions");
    std::fs::create_dir_all(&sessions_dir)?;

    Ok(sessions_dir)
}
