//! Computed routes: indoor legs, outdoor legs and their stitched forms

use crate::domain::types::{EdgeId, GeoCoord, MapId, Polyline, VenueId, WaypointId};
use serde::Serialize;

/// Edge traversed by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeRef {
    Venue { venue: VenueId, edge: EdgeId },
    /// Index into the coordinator's venue links
    Link(usize),
}

/// Contiguous run of a route on one floor, rendered as one polyline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSegment {
    pub map: MapId,
    pub level: i32,
    pub waypoints: Vec<WaypointId>,
    pub polyline: Polyline,
}

/// Indoor route within one venue, segmented per floor in traversal order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndoorRoute {
    pub venue: VenueId,
    pub segments: Vec<PathSegment>,
    pub edges: Vec<EdgeRef>,
    /// Total weight in the venue's local units
    pub cost: f64,
    pub transitions: u32,
}

impl IndoorRoute {
    /// The "no path" result
    pub fn empty(venue: VenueId) -> Self {
        Self { venue, segments: Vec::new(), edges: Vec::new(), cost: 0.0, transitions: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn uses_edge(&self, edge: EdgeId) -> bool {
        self.edges
            .iter()
            .any(|e| matches!(e, EdgeRef::Venue { venue, edge: id } if *venue == self.venue && *id == edge))
    }

    pub fn waypoints(&self) -> impl Iterator<Item = WaypointId> + '_ {
        self.segments.iter().flat_map(|s| s.waypoints.iter().copied())
    }

    pub fn first_geo(&self) -> Option<GeoCoord> {
        self.segments.first().and_then(|s| s.polyline.first()).copied()
    }

    pub fn last_geo(&self) -> Option<GeoCoord> {
        self.segments.last().and_then(|s| s.polyline.last()).copied()
    }
}

/// Indoor leg joined to an outdoor leg through a connecting segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StitchedRoute {
    pub route_id: String,
    pub indoor: IndoorRoute,
    /// Joins the building connector to the outdoor path
    pub connecting: Polyline,
    pub outdoor: Polyline,
}

impl StitchedRoute {
    pub fn is_empty(&self) -> bool {
        self.indoor.is_empty() && self.outdoor.is_empty()
    }
}

/// Result of a venue-to-venue request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VenueRoute {
    /// Pure indoor route through linked venues, one leg per venue in order
    Indoor { route_id: String, legs: Vec<IndoorRoute> },
    /// Indoor (start venue) + outdoor + indoor (end venue)
    Stitched { route_id: String, start: IndoorRoute, outdoor: Polyline, end: IndoorRoute },
    Unreachable,
}

impl VenueRoute {
    pub fn is_indoor(&self) -> bool {
        matches!(self, VenueRoute::Indoor { .. })
    }
}

/// Segment joining two points, collapsed when they coincide
pub fn connecting_path(from: Option<GeoCoord>, to: Option<GeoCoord>) -> Polyline {
    match (from, to) {
        (Some(a), Some(b)) if a != b => vec![a, b],
        (Some(a), _) | (None, Some(a)) => vec![a],
        (None, None) => Vec::new(),
    }
}
