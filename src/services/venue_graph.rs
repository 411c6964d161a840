//! Per-venue indoor connectivity graph
//!
//! One graph spans every floor of a venue. Waypoints and edges come straight
//! from the venue description; shape associations are registered later, map
//! by map, as the controller parses geometry.

use crate::domain::route::{EdgeRef, IndoorRoute, PathSegment};
use crate::domain::types::{
    AmenityId, DestinationId, EdgeId, GeoCoord, MapId, PathTypeId, Point, ShapeId,
    TransitionKind, VenueId, WaypointId,
};
use crate::domain::venue::{GeoReference, VenueData};
use crate::services::search::{self, Hop, SearchGraph, SearchPath, SearchTree};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Weight of a floor-transition edge that carries no explicit weight
pub const DEFAULT_TRANSITION_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Waypoint {
    pub id: WaypointId,
    pub map: MapId,
    pub level: i32,
    pub position: Point,
    pub geo: GeoCoord,
    pub exit: bool,
    pub accessibility: u8,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from: WaypointId,
    pub to: WaypointId,
    pub weight: f64,
    pub accessibility: u8,
    pub transition: TransitionKind,
    pub bidirectional: bool,
    pub crosses_floors: bool,
}

#[derive(Debug, Default)]
pub struct VenueGraph {
    venue: VenueId,
    geo_reference: GeoReference,
    waypoints: Vec<Waypoint>,
    edges: Vec<Edge>,
    node_index: FxHashMap<WaypointId, usize>,
    edge_index: FxHashMap<EdgeId, usize>,
    /// Per waypoint index: (neighbor index, edge index)
    adjacency: Vec<SmallVec<[(usize, usize); 4]>>,
    map_levels: FxHashMap<MapId, i32>,
    waypoint_shapes: FxHashMap<WaypointId, SmallVec<[ShapeId; 2]>>,
    shape_waypoints: FxHashMap<ShapeId, SmallVec<[WaypointId; 2]>>,
    destination_waypoints: FxHashMap<DestinationId, Vec<WaypointId>>,
    waypoint_destinations: FxHashMap<WaypointId, SmallVec<[DestinationId; 1]>>,
    amenity_shapes: FxHashMap<AmenityId, Vec<(WaypointId, ShapeId)>>,
    path_type_shapes: FxHashMap<PathTypeId, Vec<(WaypointId, ShapeId)>>,
}

impl VenueGraph {
    pub fn build(data: &VenueData) -> Self {
        let map_levels: FxHashMap<MapId, i32> = data.maps.iter().map(|m| (m.id, m.level)).collect();
        let geo_reference = data.geo_reference;

        let mut graph = VenueGraph { venue: data.id, geo_reference, map_levels, ..Default::default() };

        for wp in &data.waypoints {
            let Some(&level) = graph.map_levels.get(&wp.map) else {
                warn!(venue_id = %data.id, waypoint_id = %wp.id, map_id = %wp.map, "waypoint_on_unknown_map");
                continue;
            };
            if graph.node_index.contains_key(&wp.id) {
                warn!(venue_id = %data.id, waypoint_id = %wp.id, "duplicate_waypoint");
                continue;
            }
            graph.node_index.insert(wp.id, graph.waypoints.len());
            graph.waypoints.push(Waypoint {
                id: wp.id,
                map: wp.map,
                level,
                position: wp.position,
                geo: geo_reference.to_geo(wp.position),
                exit: wp.exit,
                accessibility: wp.accessibility,
            });
            graph.adjacency.push(SmallVec::new());
        }

        for e in &data.edges {
            let (Some(&a), Some(&b)) = (graph.node_index.get(&e.from), graph.node_index.get(&e.to)) else {
                warn!(venue_id = %data.id, edge_id = %e.id, "edge_with_unknown_endpoint");
                continue;
            };
            let (wa, wb) = (&graph.waypoints[a], &graph.waypoints[b]);
            let crosses_floors = wa.map != wb.map;
            let weight = match e.weight {
                Some(w) if w.is_finite() && w >= 0.0 => w,
                Some(w) => {
                    warn!(venue_id = %data.id, edge_id = %e.id, weight = w, "invalid_edge_weight");
                    continue;
                }
                None if crosses_floors => DEFAULT_TRANSITION_WEIGHT,
                None => wa.position.distance(&wb.position),
            };

            let idx = graph.edges.len();
            graph.edges.push(Edge {
                id: e.id,
                from: e.from,
                to: e.to,
                weight,
                accessibility: e.accessibility.min(100),
                transition: e.transition,
                bidirectional: e.bidirectional,
                crosses_floors,
            });
            graph.edge_index.entry(e.id).or_insert(idx);
            graph.adjacency[a].push((b, idx));
            if e.bidirectional && a != b {
                graph.adjacency[b].push((a, idx));
            }
        }

        for dest in &data.destinations {
            let wps: Vec<WaypointId> =
                dest.waypoints.iter().copied().filter(|w| graph.node_index.contains_key(w)).collect();
            for w in &wps {
                graph.waypoint_destinations.entry(*w).or_default().push(dest.id);
            }
            graph.destination_waypoints.insert(dest.id, wps);
        }

        debug!(
            venue_id = %data.id,
            waypoints = graph.waypoints.len(),
            edges = graph.edges.len(),
            destinations = graph.destination_waypoints.len(),
            "venue_graph_built"
        );
        graph
    }

    pub fn venue(&self) -> VenueId {
        self.venue
    }

    pub fn geo_reference(&self) -> &GeoReference {
        &self.geo_reference
    }

    pub fn waypoint(&self, id: WaypointId) -> Option<&Waypoint> {
        self.node_index.get(&id).map(|&i| &self.waypoints[i])
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index.get(&id).map(|&i| &self.edges[i])
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn level_of(&self, map: MapId) -> Option<i32> {
        self.map_levels.get(&map).copied()
    }

    /// Connectors to the outside
    pub fn exits(&self) -> impl Iterator<Item = &Waypoint> + '_ {
        self.waypoints.iter().filter(|w| w.exit)
    }

    /// Associate a parsed shape with the waypoints it represents
    pub fn register_shape(&mut self, shape: ShapeId, waypoints: &[WaypointId]) {
        let known: SmallVec<[WaypointId; 2]> =
            waypoints.iter().copied().filter(|w| self.node_index.contains_key(w)).collect();
        if known.is_empty() {
            return;
        }
        for w in &known {
            let shapes = self.waypoint_shapes.entry(*w).or_default();
            if !shapes.contains(&shape) {
                shapes.push(shape);
            }
        }
        self.shape_waypoints.insert(shape, known);
    }

    pub fn register_amenity_shape(&mut self, amenity: AmenityId, waypoint: WaypointId, shape: ShapeId) {
        self.register_shape(shape, &[waypoint]);
        self.amenity_shapes.entry(amenity).or_default().push((waypoint, shape));
    }

    pub fn register_path_type_shape(&mut self, path_type: PathTypeId, waypoint: WaypointId, shape: ShapeId) {
        self.register_shape(shape, &[waypoint]);
        self.path_type_shapes.entry(path_type).or_default().push((waypoint, shape));
    }

    pub fn shapes_for_waypoint(&self, waypoint: WaypointId) -> &[ShapeId] {
        self.waypoint_shapes.get(&waypoint).map(|s| s.as_slice()).unwrap_or(&[])
    }

    pub fn waypoints_for_shape(&self, shape: ShapeId) -> &[WaypointId] {
        self.shape_waypoints.get(&shape).map(|w| w.as_slice()).unwrap_or(&[])
    }

    pub fn waypoints_for_destination(&self, destination: DestinationId) -> &[WaypointId] {
        self.destination_waypoints.get(&destination).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn destinations_for_waypoint(&self, waypoint: WaypointId) -> &[DestinationId] {
        self.waypoint_destinations.get(&waypoint).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Amenity shape pairs, optionally narrowed to one waypoint
    pub fn amenity_shapes(&self, amenity: AmenityId, waypoint: Option<WaypointId>) -> Vec<ShapeId> {
        scoped(self.amenity_shapes.get(&amenity), waypoint)
    }

    pub fn all_amenity_shapes(&self) -> Vec<ShapeId> {
        self.amenity_shapes.values().flatten().map(|&(_, s)| s).collect()
    }

    pub fn path_type_shapes(&self, path_type: PathTypeId, waypoint: Option<WaypointId>) -> Vec<ShapeId> {
        scoped(self.path_type_shapes.get(&path_type), waypoint)
    }

    pub fn all_path_type_shapes(&self) -> Vec<ShapeId> {
        self.path_type_shapes.values().flatten().map(|&(_, s)| s).collect()
    }

    /// Shortest admissible path between two waypoints of this venue
    pub fn shortest_path(&self, start: WaypointId, end: WaypointId, min_accessibility: u8) -> Option<SearchPath<WaypointId>> {
        search::shortest_path(self, start, end, min_accessibility)
    }

    /// Settled search from one waypoint, used to rank exits
    pub fn search_from(&self, start: WaypointId, min_accessibility: u8) -> SearchTree<WaypointId> {
        search::search(self, start, None, min_accessibility)
    }

    /// Turn a found path into per-floor segments in traversal order
    pub fn to_route(&self, path: &SearchPath<WaypointId>) -> IndoorRoute {
        IndoorRoute {
            venue: self.venue,
            segments: self.segments(&path.nodes),
            edges: path.edges.clone(),
            cost: path.cost,
            transitions: path.transitions,
        }
    }

    /// Split a waypoint sequence into contiguous same-floor runs
    pub fn segments(&self, nodes: &[WaypointId]) -> Vec<PathSegment> {
        let mut segments: Vec<PathSegment> = Vec::new();
        for wp in nodes.iter().filter_map(|id| self.waypoint(*id)) {
            match segments.last_mut() {
                Some(seg) if seg.map == wp.map => {
                    seg.waypoints.push(wp.id);
                    seg.polyline.push(wp.geo);
                }
                _ => segments.push(PathSegment {
                    map: wp.map,
                    level: wp.level,
                    waypoints: vec![wp.id],
                    polyline: vec![wp.geo],
                }),
            }
        }
        segments
    }
}

fn scoped(pairs: Option<&Vec<(WaypointId, ShapeId)>>, waypoint: Option<WaypointId>) -> Vec<ShapeId> {
    pairs
        .into_iter()
        .flatten()
        .filter(|(w, _)| waypoint.map_or(true, |scope| scope == *w))
        .map(|&(_, s)| s)
        .collect()
}

impl SearchGraph for VenueGraph {
    type Node = WaypointId;

    fn contains(&self, node: WaypointId) -> bool {
        self.node_index.contains_key(&node)
    }

    fn hops(&self, node: WaypointId, out: &mut Vec<Hop<WaypointId>>) {
        let Some(&idx) = self.node_index.get(&node) else {
            return;
        };
        for &(next, edge_idx) in &self.adjacency[idx] {
            let edge = &self.edges[edge_idx];
            let target = &self.waypoints[next];
            out.push(Hop {
                to: target.id,
                edge: EdgeRef::Venue { venue: self.venue, edge: edge.id },
                weight: edge.weight,
                // A waypoint rated below the request cannot be entered either
                accessibility: edge.accessibility.min(target.accessibility),
                floor_change: edge.crosses_floors,
            });
        }
    }
}
