//! Search graph spanning several venue graphs joined by venue links

use crate::domain::route::{EdgeRef, IndoorRoute};
use crate::domain::types::{GlobalWaypoint, TransitionKind, VenueId, WaypointId};
use crate::domain::venue::VenueLink;
use crate::services::search::{self, Hop, SearchGraph, SearchPath};
use crate::services::venue_graph::VenueGraph;
use rustc_hash::FxHashMap;

pub struct LinkedGraphs<'a> {
    graphs: FxHashMap<VenueId, &'a VenueGraph>,
    links: &'a [VenueLink],
}

impl<'a> LinkedGraphs<'a> {
    pub fn new(graphs: impl IntoIterator<Item = &'a VenueGraph>, links: &'a [VenueLink]) -> Self {
        Self { graphs: graphs.into_iter().map(|g| (g.venue(), g)).collect(), links }
    }

    pub fn shortest_path(
        &self,
        start: GlobalWaypoint,
        end: GlobalWaypoint,
        min_accessibility: u8,
    ) -> Option<SearchPath<GlobalWaypoint>> {
        search::shortest_path(self, start, end, min_accessibility)
    }

    /// Weight and floor change of one traversed edge
    fn edge_cost(&self, venue: VenueId, edge: EdgeRef) -> (f64, bool) {
        match edge {
            EdgeRef::Venue { edge, .. } => self
                .graphs
                .get(&venue)
                .and_then(|g| g.edge(edge))
                .map_or((0.0, false), |e| (e.weight, e.crosses_floors)),
            EdgeRef::Link(i) => self
                .links
                .get(i)
                .map_or((0.0, false), |l| (l.weight, l.transition != TransitionKind::None)),
        }
    }

    /// Split a cross-venue path into one indoor leg per venue run, in order
    pub fn legs(&self, path: &SearchPath<GlobalWaypoint>) -> Vec<IndoorRoute> {
        let mut runs: Vec<(VenueId, Vec<WaypointId>, Vec<EdgeRef>)> = Vec::new();
        for (i, node) in path.nodes.iter().enumerate() {
            match runs.last_mut() {
                Some((venue, waypoints, edges)) if *venue == node.venue => {
                    waypoints.push(node.waypoint);
                    if let Some(edge) = i.checked_sub(1).and_then(|j| path.edges.get(j)) {
                        edges.push(*edge);
                    }
                }
                _ => runs.push((node.venue, vec![node.waypoint], Vec::new())),
            }
        }

        runs.into_iter()
            .filter_map(|(venue, waypoints, edges)| {
                let graph = self.graphs.get(&venue)?;
                let (cost, transitions) = edges.iter().fold((0.0, 0u32), |(w, t), e| {
                    let (weight, floor_change) = self.edge_cost(venue, *e);
                    (w + weight, t + u32::from(floor_change))
                });
                Some(IndoorRoute { venue, segments: graph.segments(&waypoints), edges, cost, transitions })
            })
            .collect()
    }
}

impl SearchGraph for LinkedGraphs<'_> {
    type Node = GlobalWaypoint;

    fn contains(&self, node: GlobalWaypoint) -> bool {
        self.graphs.get(&node.venue).is_some_and(|g| g.contains(node.waypoint))
    }

    fn hops(&self, node: GlobalWaypoint, out: &mut Vec<Hop<GlobalWaypoint>>) {
        if let Some(graph) = self.graphs.get(&node.venue) {
            let mut local = Vec::new();
            graph.hops(node.waypoint, &mut local);
            out.extend(local.into_iter().map(|h| Hop {
                to: GlobalWaypoint::new(node.venue, h.to),
                edge: h.edge,
                weight: h.weight,
                accessibility: h.accessibility,
                floor_change: h.floor_change,
            }));
        }

        for (i, link) in self.links.iter().enumerate() {
            let to = if link.from == node {
                link.to
            } else if link.bidirectional && link.to == node {
                link.from
            } else {
                continue;
            };
            let Some(target) = self.graphs.get(&to.venue).and_then(|g| g.waypoint(to.waypoint)) else {
                continue;
            };
            out.push(Hop {
                to,
                edge: EdgeRef::Link(i),
                weight: link.weight,
                accessibility: link.accessibility.min(target.accessibility),
                floor_change: link.transition != TransitionKind::None,
            });
        }
    }
}
