//! Wayfinding engine - indoor, indoor/outdoor and venue-to-venue routes
//!
//! Indoor search runs synchronously under the controller lock. Anything that
//! touches the outdoor router runs in three phases: compute the indoor legs
//! and issue a request token under the lock, await the router with the lock
//! released, then re-lock and render only if the token is still current.
//! A provider failure renders nothing, so a stitched route is never shown
//! half-built.

mod linked;

#[cfg(test)]
mod tests;

pub use linked::LinkedGraphs;

use crate::domain::error::{Result, WayfindError};
use crate::domain::route::{connecting_path, IndoorRoute, StitchedRoute, VenueRoute};
use crate::domain::types::{GeoCoord, GlobalWaypoint, Polyline, VenueId, WaypointId};
use crate::domain::venue::VenueLink;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::outdoor::OutdoorRouter;
use crate::services::controller::{ControllerHandle, VenueController};
use crate::services::path_overlay::RequestToken;
use crate::services::search::SearchPath;
use crate::services::venue_graph::VenueGraph;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_OUTDOOR_TIMEOUT: Duration = Duration::from_millis(5000);

/// Which end of the indoor leg touches the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitLeg {
    /// waypoint → exit
    Outbound,
    /// exit → waypoint
    Inbound,
}

fn new_route_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Legs worth drawing; a single coordinate is not a line
fn drawable(lines: impl IntoIterator<Item = Polyline>) -> Vec<Polyline> {
    lines.into_iter().filter(|l| l.len() > 1).collect()
}

pub struct WayfindingEngine {
    router: Arc<dyn OutdoorRouter>,
    metrics: Arc<Metrics>,
    outdoor_timeout: Duration,
    default_accessibility: u8,
}

impl WayfindingEngine {
    pub fn new(router: Arc<dyn OutdoorRouter>, metrics: Arc<Metrics>) -> Self {
        Self { router, metrics, outdoor_timeout: DEFAULT_OUTDOOR_TIMEOUT, default_accessibility: 0 }
    }

    pub fn from_config(config: &Config, router: Arc<dyn OutdoorRouter>, metrics: Arc<Metrics>) -> Self {
        Self {
            router,
            metrics,
            outdoor_timeout: Duration::from_millis(config.outdoor_timeout_ms()),
            default_accessibility: config.default_accessibility(),
        }
    }

    pub fn with_outdoor_timeout(mut self, timeout: Duration) -> Self {
        self.outdoor_timeout = timeout;
        self
    }

    pub fn with_default_accessibility(mut self, accessibility: u8) -> Self {
        self.default_accessibility = accessibility;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    #[inline]
    fn accessibility(&self, requested: Option<u8>) -> u8 {
        requested.unwrap_or(self.default_accessibility)
    }

    fn require_waypoint(graph: &VenueGraph, waypoint: WaypointId) -> Result<()> {
        if graph.waypoint(waypoint).is_some() {
            Ok(())
        } else {
            Err(WayfindError::unknown_waypoint(graph.venue(), waypoint))
        }
    }

    fn record_search(&self, started: Instant) {
        self.metrics.record_search_latency(started.elapsed().as_micros() as u64);
    }

    /// Shortest indoor route without touching the overlay; empty when unreachable
    pub fn compute_indoor(
        &self,
        controller: &VenueController,
        start: WaypointId,
        end: WaypointId,
        accessibility: Option<u8>,
    ) -> Result<IndoorRoute> {
        let graph = controller.require_graph()?;
        Self::require_waypoint(graph, start)?;
        Self::require_waypoint(graph, end)?;

        let min = self.accessibility(accessibility);
        let started = Instant::now();
        let path = graph.shortest_path(start, end, min);
        self.record_search(started);

        Ok(path.map_or_else(|| IndoorRoute::empty(graph.venue()), |p| graph.to_route(&p)))
    }

    /// Indoor route between two waypoints of one venue, rendered as the
    /// controller's current path. An unreachable end yields an empty route
    /// and clears the previous path.
    pub fn indoor_path(
        &self,
        controller: &mut VenueController,
        start: WaypointId,
        end: WaypointId,
        accessibility: Option<u8>,
    ) -> Result<IndoorRoute> {
        self.metrics.record_route_request();
        let route = self.compute_indoor(controller, start, end, accessibility)?;
        self.record_outcome(!route.is_empty());

        let token = controller.issue_token();
        controller.render_route(token, &route.segments, &[])?;
        info!(
            venue_id = %route.venue,
            start = %start,
            end = %end,
            cost = route.cost,
            segments = route.segments.len(),
            transitions = route.transitions,
            "indoor_path"
        );
        Ok(route)
    }

    fn record_outcome(&self, found: bool) {
        if found {
            self.metrics.record_route_found();
        } else {
            self.metrics.record_unreachable();
        }
    }

    /// Indoor leg between `waypoint` and the exit minimising indoor cost (in
    /// metres) plus straight-line distance to `outside`
    fn best_exit(
        graph: &VenueGraph,
        waypoint: WaypointId,
        outside: GeoCoord,
        min: u8,
        leg: ExitLeg,
    ) -> Option<SearchPath<WaypointId>> {
        let geo = graph.geo_reference();
        let candidates: Vec<(SearchPath<WaypointId>, f64)> = match leg {
            ExitLeg::Outbound => {
                let tree = graph.search_from(waypoint, min);
                graph
                    .exits()
                    .filter_map(|exit| {
                        let path = tree.path_to(exit.id)?;
                        let score = geo.to_metres(path.cost) + exit.geo.distance_m(&outside);
                        Some((path, score))
                    })
                    .collect()
            }
            ExitLeg::Inbound => graph
                .exits()
                .filter_map(|exit| {
                    let path = graph.shortest_path(exit.id, waypoint, min)?;
                    let score = geo.to_metres(path.cost) + exit.geo.distance_m(&outside);
                    Some((path, score))
                })
                .collect(),
        };

        candidates.into_iter().min_by(|a, b| a.1.total_cmp(&b.1)).map(|(path, _)| path)
    }

    /// Compute the exit leg and stamp a request, all under one lock
    fn begin_exit_leg(
        &self,
        handle: &ControllerHandle,
        waypoint: WaypointId,
        outside: GeoCoord,
        accessibility: Option<u8>,
        leg: ExitLeg,
    ) -> Result<(VenueId, RequestToken, Option<IndoorRoute>)> {
        let mut controller = handle.lock();
        let graph = controller.require_graph()?;
        Self::require_waypoint(graph, waypoint)?;

        let started = Instant::now();
        let indoor = Self::best_exit(graph, waypoint, outside, self.accessibility(accessibility), leg)
            .map(|p| graph.to_route(&p));
        self.record_search(started);

        let venue = graph.venue();
        let token = controller.issue_token();
        debug!(venue_id = %venue, token = %token, exit_found = indoor.is_some(), "exit_leg_computed");
        Ok((venue, token, indoor))
    }

    /// Outdoor leg bounded by the configured timeout. Failures and timeouts
    /// are `ProviderFailure`.
    async fn outdoor_leg(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.outdoor_timeout, self.router.route(from, to)).await;
        self.metrics.record_outdoor_latency(started.elapsed().as_micros() as u64);

        match result {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(e)) => {
                self.metrics.record_provider_failure();
                warn!(error = %e, "outdoor_route_failed");
                Err(match e {
                    WayfindError::ProviderFailure(_) => e,
                    other => WayfindError::ProviderFailure(other.to_string()),
                })
            }
            Err(_) => {
                self.metrics.record_provider_failure();
                let timeout_ms = self.outdoor_timeout.as_millis();
                warn!(timeout_ms = %timeout_ms, "outdoor_route_timeout");
                Err(WayfindError::ProviderFailure(format!("timed out after {timeout_ms} ms")))
            }
        }
    }

    /// Render under a fresh lock; a superseded token is counted and returned
    fn finish(
        &self,
        handle: &ControllerHandle,
        token: RequestToken,
        indoor: &IndoorRoute,
        outdoor: Vec<Polyline>,
    ) -> Result<()> {
        let result = handle.lock().render_route(token, &indoor.segments, &outdoor);
        if let Err(WayfindError::Superseded { token, latest }) = &result {
            self.metrics.record_stale_discarded();
            warn!(venue_id = %indoor.venue, token = %token, latest = %latest, "stale_route_discarded");
        }
        result
    }

    fn unreachable_stitch(&self, handle: &ControllerHandle, venue: VenueId, token: RequestToken) -> Result<StitchedRoute> {
        self.metrics.record_unreachable();
        let empty = IndoorRoute::empty(venue);
        self.finish(handle, token, &empty, Vec::new())?;
        Ok(StitchedRoute { route_id: new_route_id(), indoor: empty, connecting: Vec::new(), outdoor: Vec::new() })
    }

    /// Indoor leg from `start` to the best exit, then outdoor to `to`
    pub async fn indoor_to_outdoor(
        &self,
        handle: &ControllerHandle,
        start: WaypointId,
        to: GeoCoord,
        accessibility: Option<u8>,
    ) -> Result<StitchedRoute> {
        self.metrics.record_route_request();
        let (venue, token, indoor) = self.begin_exit_leg(handle, start, to, accessibility, ExitLeg::Outbound)?;
        let Some((indoor, exit)) = indoor.and_then(|r| r.last_geo().map(|g| (r, g))) else {
            return self.unreachable_stitch(handle, venue, token);
        };

        let Some(outdoor) = self.outdoor_leg(exit, to).await? else {
            return self.unreachable_stitch(handle, venue, token);
        };

        let connecting = connecting_path(Some(exit), outdoor.first().copied());
        self.finish(handle, token, &indoor, drawable([connecting.clone(), outdoor.clone()]))?;
        self.metrics.record_route_found();
        info!(venue_id = %venue, start = %start, outdoor_points = outdoor.len(), "indoor_to_outdoor");
        Ok(StitchedRoute { route_id: new_route_id(), indoor, connecting, outdoor })
    }

    /// Outdoor from `from` to the best exit, then indoor to `end`
    pub async fn outdoor_to_indoor(
        &self,
        handle: &ControllerHandle,
        from: GeoCoord,
        end: WaypointId,
        accessibility: Option<u8>,
    ) -> Result<StitchedRoute> {
        self.metrics.record_route_request();
        let (venue, token, indoor) = self.begin_exit_leg(handle, end, from, accessibility, ExitLeg::Inbound)?;
        let Some((indoor, entry)) = indoor.and_then(|r| r.first_geo().map(|g| (r, g))) else {
            return self.unreachable_stitch(handle, venue, token);
        };

        let Some(outdoor) = self.outdoor_leg(from, entry).await? else {
            return self.unreachable_stitch(handle, venue, token);
        };

        let connecting = connecting_path(outdoor.last().copied(), Some(entry));
        self.finish(handle, token, &indoor, drawable([outdoor.clone(), connecting.clone()]))?;
        self.metrics.record_route_found();
        info!(venue_id = %venue, end = %end, outdoor_points = outdoor.len(), "outdoor_to_indoor");
        Ok(StitchedRoute { route_id: new_route_id(), indoor, connecting, outdoor })
    }

    /// Pure delegation to the outdoor router
    pub async fn outdoor_to_outdoor(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>> {
        self.metrics.record_route_request();
        let line = self.outdoor_leg(from, to).await?;
        self.record_outcome(line.is_some());
        Ok(line)
    }

    /// Route between waypoints of two venues. Tries a pure indoor route
    /// across `links` first, then stitches exit, outdoor and entry legs.
    ///
    /// `controllers` is keyed by venue id; locks are always taken in key order.
    pub async fn venue_to_venue(
        &self,
        controllers: &BTreeMap<VenueId, ControllerHandle>,
        links: &[VenueLink],
        start: GlobalWaypoint,
        end: GlobalWaypoint,
        accessibility: Option<u8>,
    ) -> Result<VenueRoute> {
        let start_handle = controllers.get(&start.venue).ok_or_else(|| WayfindError::unknown_venue(start.venue))?;
        let end_handle = controllers.get(&end.venue).ok_or_else(|| WayfindError::unknown_venue(end.venue))?;

        if start.venue == end.venue {
            let route = self.indoor_path(&mut start_handle.lock(), start.waypoint, end.waypoint, accessibility)?;
            return Ok(if route.is_empty() {
                VenueRoute::Unreachable
            } else {
                VenueRoute::Indoor { route_id: new_route_id(), legs: vec![route] }
            });
        }

        self.metrics.record_route_request();
        let min = self.accessibility(accessibility);
        let plan = self.plan_venue_to_venue(controllers, links, start, end, min)?;

        let (start_leg, end_leg, start_token, end_token) = match plan {
            VenuePlan::Indoor(route) => {
                self.metrics.record_route_found();
                self.metrics.record_linked_indoor();
                return Ok(route);
            }
            VenuePlan::Unreachable => {
                self.metrics.record_unreachable();
                return Ok(VenueRoute::Unreachable);
            }
            VenuePlan::Stitch { start_leg, end_leg, start_token, end_token } => {
                (start_leg, end_leg, start_token, end_token)
            }
        };

        let start_empty = IndoorRoute::empty(start.venue);
        let end_empty = IndoorRoute::empty(end.venue);
        let unreachable = || -> Result<VenueRoute> {
            self.metrics.record_unreachable();
            self.render_pair(
                (start_handle, start_token, &start_empty, Vec::new()),
                (end_handle, end_token, &end_empty, Vec::new()),
            )?;
            Ok(VenueRoute::Unreachable)
        };

        let (Some(exit), Some(entry)) = (start_leg.last_geo(), end_leg.first_geo()) else {
            return unreachable();
        };
        let Some(outdoor) = self.outdoor_leg(exit, entry).await? else {
            return unreachable();
        };

        let departure = drawable([connecting_path(Some(exit), outdoor.first().copied()), outdoor.clone()]);
        let arrival = drawable([connecting_path(outdoor.last().copied(), Some(entry))]);
        self.render_pair((start_handle, start_token, &start_leg, departure), (end_handle, end_token, &end_leg, arrival))?;

        self.metrics.record_route_found();
        info!(start = %start, end = %end, outdoor_points = outdoor.len(), "venue_to_venue_stitched");
        Ok(VenueRoute::Stitched { route_id: new_route_id(), start: start_leg, outdoor, end: end_leg })
    }

    /// Render one request's legs in two venues. Locks are taken in venue id
    /// order and both tokens are checked before either venue is drawn.
    fn render_pair(
        &self,
        start: VenueLeg<'_>,
        end: VenueLeg<'_>,
    ) -> Result<()> {
        let start_first = start.2.venue < end.2.venue;
        let (first, second) = if start_first { (start.0, end.0) } else { (end.0, start.0) };
        let mut a = first.lock();
        let mut b = second.lock();
        let (start_ctl, end_ctl) = if start_first { (&mut *a, &mut *b) } else { (&mut *b, &mut *a) };

        for (ctl, token) in [(&*start_ctl, start.1), (&*end_ctl, end.1)] {
            if let Err(e) = ctl.check_token(token) {
                self.metrics.record_stale_discarded();
                warn!(venue_id = %ctl.venue_id(), token = %token, "stale_route_discarded");
                return Err(e);
            }
        }

        start_ctl.render_route(start.1, &start.2.segments, &start.3)?;
        end_ctl.render_route(end.1, &end.2.segments, &end.3)?;
        Ok(())
    }

    /// Synchronous part of a venue-to-venue request, under every venue lock
    fn plan_venue_to_venue(
        &self,
        controllers: &BTreeMap<VenueId, ControllerHandle>,
        links: &[VenueLink],
        start: GlobalWaypoint,
        end: GlobalWaypoint,
        min: u8,
    ) -> Result<VenuePlan> {
        let mut guards: Vec<_> = controllers.values().map(|h| h.lock()).collect();
        let position = |venue: VenueId| guards.iter().position(|g| g.venue_id() == venue);
        let (Some(si), Some(ei)) = (position(start.venue), position(end.venue)) else {
            return Err(WayfindError::unknown_venue(start.venue));
        };

        let started = Instant::now();
        let legs = {
            let start_graph = guards[si].require_graph()?;
            let end_graph = guards[ei].require_graph()?;
            Self::require_waypoint(start_graph, start.waypoint)?;
            Self::require_waypoint(end_graph, end.waypoint)?;

            if links.is_empty() {
                None
            } else {
                let linked = LinkedGraphs::new(guards.iter().filter_map(|g| g.graph()), links);
                linked.shortest_path(start, end, min).map(|p| linked.legs(&p))
            }
        };

        if let Some(legs) = legs {
            self.record_search(started);
            for leg in &legs {
                if let Some(ctl) = guards.iter_mut().find(|g| g.venue_id() == leg.venue) {
                    let token = ctl.issue_token();
                    ctl.render_route(token, &leg.segments, &[])?;
                }
            }
            debug!(start = %start, end = %end, legs = legs.len(), "venue_to_venue_linked");
            return Ok(VenuePlan::Indoor(VenueRoute::Indoor { route_id: new_route_id(), legs }));
        }

        let (start_leg, end_leg) = {
            let start_graph = guards[si].require_graph()?;
            let end_graph = guards[ei].require_graph()?;
            // Exits are ranked against the other venue's geo origin
            let toward_end = end_graph.geo_reference().origin;
            let toward_start = start_graph.geo_reference().origin;
            let start_leg = Self::best_exit(start_graph, start.waypoint, toward_end, min, ExitLeg::Outbound)
                .map(|p| start_graph.to_route(&p));
            let end_leg = Self::best_exit(end_graph, end.waypoint, toward_start, min, ExitLeg::Inbound)
                .map(|p| end_graph.to_route(&p));
            (start_leg, end_leg)
        };
        self.record_search(started);

        let (Some(start_leg), Some(end_leg)) = (start_leg, end_leg) else {
            // Nothing to stitch; clear the previous path in both venues
            for guard in [si, ei] {
                let token = guards[guard].issue_token();
                let venue = guards[guard].venue_id();
                guards[guard].render_route(token, &IndoorRoute::empty(venue).segments, &[])?;
            }
            return Ok(VenuePlan::Unreachable);
        };
        let start_token = guards[si].issue_token();
        let end_token = guards[ei].issue_token();
        Ok(VenuePlan::Stitch { start_leg, end_leg, start_token, end_token })
    }
}

/// Controller, token, indoor leg and outdoor lines drawn for one venue
type VenueLeg<'a> = (&'a ControllerHandle, RequestToken, &'a IndoorRoute, Vec<Polyline>);

enum VenuePlan {
    Indoor(VenueRoute),
    Unreachable,
    Stitch { start_leg: IndoorRoute, end_leg: IndoorRoute, start_token: RequestToken, end_token: RequestToken },
}
