//! # Site Settings Loading
//!
//! Reads [`SiteSettings`] from a YAML file. Missing keys take their
//! defaults; an absent file means all defaults.

use std::path::Path;

use anyhow::{Context, Result};

use petitions_core::SiteSettings;

/// Load and validate site settings.
pub fn load_settings(path: Option<&Path>) -> Result<SiteSettings> {
    let settings = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            parse_settings(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => SiteSettings::default(),
    };
    settings.validate().context("invalid site settings")?;
    Ok(settings)
}

fn parse_settings(text: &str) -> Result<SiteSettings> {
    if text.trim().is_empty() {
        return Ok(SiteSettings::default());
    }
    Ok(serde_yaml::from_str(text)?)
}
