//! Stylesheet loading
//!
//! The sheet is read once and shared as an immutable `Arc<StyleSheet>`;
//! controllers only look entries up by name.

use crate::domain::style::StyleSheet;
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn load_stylesheet<P: AsRef<Path>>(path: P) -> anyhow::Result<Arc<StyleSheet>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read stylesheet: {}", path.display()))?;
    let sheet: StyleSheet = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse stylesheet: {}", path.display()))?;

    info!(
        file = %path.display(),
        layers = %sheet.layers.len(),
        amenities = %sheet.amenities.len(),
        path_types = %sheet.path_types.len(),
        "stylesheet_loaded"
    );
    Ok(Arc::new(sheet))
}

/// Configured stylesheet, or the empty sheet when none is set
pub fn load_optional(path: Option<&str>) -> anyhow::Result<Arc<StyleSheet>> {
    match path {
        Some(p) => load_stylesheet(p),
        None => Ok(Arc::new(StyleSheet::default())),
    }
}
