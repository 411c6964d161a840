//! Multi-venue coordinator
//!
//! Holds one controller per active venue, keyed by venue id, plus the
//! "current" venue pointer. Batch operations fan out one task per venue and
//! join them all before reporting; a failing venue never stops the others.

use crate::domain::error::{Result, WayfindError};
use crate::domain::route::{IndoorRoute, VenueRoute};
use crate::domain::style::StyleSheet;
use crate::domain::types::{GlobalWaypoint, VenueId, WaypointId};
use crate::domain::venue::{VenueData, VenueLink};
use crate::io::surface::RenderSurface;
use crate::services::controller::{ControllerHandle, ControllerOptions, VenueController};
use crate::services::wayfinding::WayfindingEngine;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Span of canonical levels, `max - min + 1`, or 0 when there are none
pub fn level_span(levels: impl IntoIterator<Item = i32>) -> u32 {
    let (min, max) = levels
        .into_iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), l| (lo.min(l), hi.max(l)));
    if min > max {
        0
    } else {
        max.abs_diff(min).saturating_add(1)
    }
}

pub struct MultiVenueCoordinator {
    controllers: BTreeMap<VenueId, ControllerHandle>,
    current: Option<VenueId>,
    links: Vec<VenueLink>,
    engine: Arc<WayfindingEngine>,
    sheet: Arc<StyleSheet>,
    surface: Arc<dyn RenderSurface>,
    options: ControllerOptions,
}

impl MultiVenueCoordinator {
    pub fn new(
        engine: Arc<WayfindingEngine>,
        sheet: Arc<StyleSheet>,
        surface: Arc<dyn RenderSurface>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            controllers: BTreeMap::new(),
            current: None,
            links: Vec::new(),
            engine,
            sheet,
            surface,
            options,
        }
    }

    pub fn engine(&self) -> &Arc<WayfindingEngine> {
        &self.engine
    }

    /// Activate a venue. An already active venue keeps its controller.
    pub fn add_venue(&mut self, venue: Arc<VenueData>) -> ControllerHandle {
        let id = venue.id;
        let handle = self
            .controllers
            .entry(id)
            .or_insert_with(|| {
                info!(venue_id = %id, "venue_activated");
                VenueController::new(venue, self.sheet.clone(), self.surface.clone(), self.options.clone())
                    .into_handle()
            })
            .clone();
        if self.current.is_none() {
            self.current = Some(id);
        }
        handle
    }

    /// Make `venues` the active set: new venues get controllers, removed ones
    /// are dropped with their links, and `current` moves if its venue left.
    pub fn update_active_venues(&mut self, venues: Vec<Arc<VenueData>>) {
        let keep: Vec<VenueId> = venues.iter().map(|v| v.id).collect();
        self.controllers.retain(|id, _| {
            let kept = keep.contains(id);
            if !kept {
                info!(venue_id = %id, "venue_deactivated");
            }
            kept
        });
        self.links.retain(|l| keep.contains(&l.from.venue) && keep.contains(&l.to.venue));
        if self.current.is_some_and(|id| !self.controllers.contains_key(&id)) {
            self.current = None;
        }
        for venue in venues {
            self.add_venue(venue);
        }
        if self.current.is_none() {
            self.current = self.controllers.keys().next().copied();
        }
    }

    pub fn venue_ids(&self) -> Vec<VenueId> {
        self.controllers.keys().copied().collect()
    }

    pub fn controller(&self, venue: VenueId) -> Option<&ControllerHandle> {
        self.controllers.get(&venue)
    }

    fn require(&self, venue: VenueId) -> Result<&ControllerHandle> {
        self.controllers.get(&venue).ok_or_else(|| WayfindError::unknown_venue(venue))
    }

    pub fn current_active_venue(&self) -> Option<VenueId> {
        self.current
    }

    pub fn current_controller(&self) -> Option<&ControllerHandle> {
        self.current.and_then(|id| self.controllers.get(&id))
    }

    pub fn set_current_active_venue(&mut self, venue: VenueId) -> Result<()> {
        self.require(venue)?;
        self.current = Some(venue);
        info!(venue_id = %venue, "current_venue_set");
        Ok(())
    }

    /// Level span across the given venues; unknown venues contribute nothing
    pub fn level_range(&self, venues: &[VenueId]) -> u32 {
        level_span(
            venues
                .iter()
                .filter_map(|id| self.controllers.get(id))
                .flat_map(|h| h.lock().levels()),
        )
    }

    pub fn level_range_all(&self) -> u32 {
        level_span(self.controllers.values().flat_map(|h| h.lock().levels()))
    }

    /// Show the map at `level` in each targeted venue (all when `None`).
    /// Venues without that level are skipped. Returns the venues shown.
    pub fn show_maps_by_level(&self, level: i32, venues: Option<&[VenueId]>) -> Result<Vec<VenueId>> {
        let targets = venues.map_or_else(|| self.venue_ids(), <[VenueId]>::to_vec);
        let mut shown = Vec::new();
        let mut first_error = None;
        for id in targets {
            let result = self.require(id).and_then(|h| h.lock().show_map_by_level(level));
            match result {
                Ok(true) => shown.push(id),
                Ok(false) => info!(venue_id = %id, level, "level_missing_skipped"),
                Err(e) => {
                    warn!(venue_id = %id, level, error = %e, "show_level_failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(shown), Err)
    }

    /// Run `op` on every venue concurrently and wait for all of them.
    /// Reports the first error encountered.
    async fn fan_out<F>(&self, venues: &[VenueId], name: &'static str, op: F) -> Result<()>
    where
        F: Fn(&mut VenueController) -> Result<()> + Send + Sync + Clone + 'static,
    {
        let mut tasks = JoinSet::new();
        let mut first_error = None;
        for &id in venues {
            match self.require(id) {
                Ok(handle) => {
                    let (handle, op) = (handle.clone(), op.clone());
                    tasks.spawn(async move { (id, op(&mut *handle.lock())) });
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(e))) => {
                    warn!(venue_id = %id, op = name, error = %e, "venue_op_failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => error!(op = name, error = %e, "venue_task_failed"),
            }
        }
        info!(op = name, venues = venues.len(), failed = first_error.is_some(), "venue_batch_done");
        first_error.map_or(Ok(()), Err)
    }

    pub async fn show_default_maps_for_venues(&self, venues: &[VenueId]) -> Result<()> {
        self.fan_out(venues, "show_default_map", VenueController::show_default_map).await
    }

    pub async fn hide_maps_for_venues(&self, venues: &[VenueId]) -> Result<()> {
        self.fan_out(venues, "hide_map", VenueController::hide_map).await
    }

    pub async fn parse_venues(&self, venues: &[VenueId]) -> Result<()> {
        self.fan_out(venues, "parse_all_maps", VenueController::parse_all_maps).await
    }

    /// Register an indoor connection between two active venues
    pub fn add_venue_link(&mut self, link: VenueLink) -> Result<()> {
        for end in [link.from, link.to] {
            self.require(end.venue)?;
        }
        info!(from = %link.from, to = %link.to, weight = link.weight, "venue_link_added");
        self.links.push(link);
        Ok(())
    }

    pub fn links(&self) -> &[VenueLink] {
        &self.links
    }

    /// Indoor route within one active venue
    pub fn wayfind_indoor(
        &self,
        venue: VenueId,
        start: WaypointId,
        end: WaypointId,
        accessibility: Option<u8>,
    ) -> Result<IndoorRoute> {
        let handle = self.require(venue)?;
        self.engine.indoor_path(&mut handle.lock(), start, end, accessibility)
    }

    pub async fn wayfind_venue_to_venue(
        &self,
        start: GlobalWaypoint,
        end: GlobalWaypoint,
        accessibility: Option<u8>,
    ) -> Result<VenueRoute> {
        self.engine.venue_to_venue(&self.controllers, &self.links, start, end, accessibility).await
    }

    pub fn clear_wayfind_paths(&self) {
        for handle in self.controllers.values() {
            handle.lock().clear_wayfind_path();
        }
    }
}
