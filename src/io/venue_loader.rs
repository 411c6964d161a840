//! Venue description loading from JSON files

use crate::domain::venue::VenueData;
use anyhow::{bail, Context};
use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn load_venue<P: AsRef<Path>>(path: P) -> anyhow::Result<Arc<VenueData>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read venue file: {}", path.display()))?;
    let venue: VenueData = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse venue file: {}", path.display()))?;

    info!(
        venue_id = %venue.id,
        file = %path.display(),
        maps = %venue.maps.len(),
        waypoints = %venue.waypoints.len(),
        edges = %venue.edges.len(),
        "venue_loaded"
    );
    Ok(Arc::new(venue))
}

/// Load every configured venue file; venue ids must be unique
pub fn load_venues(paths: &[String]) -> anyhow::Result<Vec<Arc<VenueData>>> {
    let mut seen = FxHashSet::default();
    let mut venues = Vec::with_capacity(paths.len());
    for path in paths {
        let venue = load_venue(path)?;
        if !seen.insert(venue.id) {
            bail!("duplicate venue id {} in {}", venue.id, path);
        }
        venues.push(venue);
    }
    Ok(venues)
}
