//! Tests for the wayfinding engine

use super::*;
use crate::domain::route::EdgeRef;
use crate::domain::types::{EdgeId, TransitionKind};
use crate::io::outdoor::StraightLineRouter;
use crate::io::surface::{NullSurface, RenderSurface};
use crate::services::fixtures::{controller, VenueBuilder};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

fn null() -> Arc<dyn RenderSurface> {
    Arc::new(NullSurface)
}

fn engine(router: Arc<dyn OutdoorRouter>) -> WayfindingEngine {
    WayfindingEngine::new(router, Arc::new(Metrics::new()))
}

fn straight() -> WayfindingEngine {
    engine(Arc::new(StraightLineRouter))
}

fn parsed(builder: VenueBuilder) -> VenueController {
    let mut c = controller(builder.build(), null());
    c.parse_all_maps().unwrap();
    c
}

fn parsed_handle(builder: VenueBuilder) -> ControllerHandle {
    parsed(builder).into_handle()
}

fn venue_edge(venue: u32, edge: u32) -> EdgeRef {
    EdgeRef::Venue { venue: VenueId(venue), edge: EdgeId(edge) }
}

fn gw(venue: u32, waypoint: u32) -> GlobalWaypoint {
    GlobalWaypoint::new(VenueId(venue), WaypointId(waypoint))
}

/// P1 - P2 on one floor joined by the given (edge id, weight, rating) edges
fn pair(edges: &[(u32, f64, u8)]) -> VenueBuilder {
    let builder = VenueBuilder::new(1).level(0).waypoint(1, 0, 0.0, 0.0).waypoint(2, 0, 10.0, 0.0);
    edges.iter().fold(builder, |b, &(id, w, acc)| b.edge(id, 1, 2, w, acc))
}

/// Waypoint 1 between a west exit (2) and an east exit (3)
fn two_exits() -> VenueBuilder {
    VenueBuilder::new(1)
        .level(0)
        .waypoint(1, 0, 0.0, 0.0)
        .exit(2, 0, -50.0, 0.0)
        .exit(3, 0, 50.0, 0.0)
        .edge(1, 1, 2, 50.0, 100)
        .edge(2, 1, 3, 50.0, 100)
}

/// Second venue: entrance 1 leading to waypoint 2
fn second_venue() -> VenueBuilder {
    VenueBuilder::new(2).level(0).exit(1, 0, 0.0, 0.0).waypoint(2, 0, 10.0, 0.0).edge(1, 1, 2, 10.0, 100)
}

fn east_of_venue_one() -> GeoCoord {
    GeoCoord::new(43.01, -78.99)
}

fn west_of_venue_one() -> GeoCoord {
    GeoCoord::new(43.01, -79.01)
}

/// Blocks its first call until released; later calls answer at once
#[derive(Default)]
struct GatedRouter {
    calls: AtomicUsize,
    release: Notify,
}

#[async_trait]
impl OutdoorRouter for GatedRouter {
    async fn route(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.release.notified().await;
        }
        Ok(Some(vec![from, to]))
    }
}

impl GatedRouter {
    async fn wait_for_first_call(&self) {
        while self.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }
}

struct FailingRouter;

#[async_trait]
impl OutdoorRouter for FailingRouter {
    async fn route(&self, _from: GeoCoord, _to: GeoCoord) -> Result<Option<Polyline>> {
        Err(WayfindError::ProviderFailure("503 from upstream".to_string()))
    }
}

struct SlowRouter(Duration);

#[async_trait]
impl OutdoorRouter for SlowRouter {
    async fn route(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>> {
        tokio::time::sleep(self.0).await;
        Ok(Some(vec![from, to]))
    }
}

struct NoRouteRouter;

#[async_trait]
impl OutdoorRouter for NoRouteRouter {
    async fn route(&self, _from: GeoCoord, _to: GeoCoord) -> Result<Option<Polyline>> {
        Ok(None)
    }
}

// ----- indoor -----

#[test]
fn test_edge_included_when_request_at_or_below_rating() {
    let engine = straight();
    let mut c = parsed(pair(&[(7, 10.0, 60)]));

    let route = engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(60)).unwrap();
    assert!(route.uses_edge(EdgeId(7)));
    assert_eq!(route.cost, 10.0);

    let route = engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(61)).unwrap();
    assert!(!route.uses_edge(EdgeId(7)));
    assert!(route.is_empty());
}

#[test]
fn test_no_qualifying_edge_yields_empty_route() {
    let engine = straight();
    let mut c = parsed(pair(&[(7, 10.0, 20), (8, 12.0, 30)]));

    let route = engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(100)).unwrap();
    assert!(route.is_empty());
    assert_eq!(c.path_shape_count(), 0);
    assert_eq!(engine.metrics().unreachable_total(), 1);
    assert_eq!(engine.metrics().routes_found_total(), 0);
}

#[test]
fn test_lower_weight_wins_when_both_edges_qualify() {
    let engine = straight();
    let mut c = parsed(pair(&[(10, 10.0, 100), (11, 15.0, 40)]));

    let full = engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(100)).unwrap();
    assert_eq!(full.edges, vec![venue_edge(1, 10)]);

    let half = engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(50)).unwrap();
    assert_eq!(half.edges, vec![venue_edge(1, 10)]);
    assert_eq!(half.cost, 10.0);

    let any = engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(0)).unwrap();
    assert_eq!(any.edges, vec![venue_edge(1, 10)]);
}

#[test]
fn test_route_segments_follow_floor_order() {
    let engine = straight();
    let builder = VenueBuilder::new(1)
        .levels(&[-1, 0, 1])
        .waypoint(1, 1, 0.0, 0.0)
        .waypoint(2, 1, 5.0, 0.0)
        .waypoint(3, 0, 5.0, 0.0)
        .waypoint(4, -1, 5.0, 0.0)
        .waypoint(5, -1, 9.0, 0.0)
        .edge(1, 1, 2, 5.0, 100)
        .edge_with(2, 2, 3, None, 100, TransitionKind::Elevator)
        .edge_with(3, 3, 4, None, 100, TransitionKind::Elevator)
        .edge(4, 4, 5, 4.0, 100);
    let mut c = parsed(builder);

    let route = engine.indoor_path(&mut c, WaypointId(1), WaypointId(5), None).unwrap();
    let levels: Vec<i32> = route.segments.iter().map(|s| s.level).collect();
    assert_eq!(levels, vec![1, 0, -1]);
    assert_eq!(route.transitions, 2);
    assert_eq!(route.segments[2].waypoints, vec![WaypointId(4), WaypointId(5)]);
    assert_eq!(c.path_shape_count(), 3);
}

#[test]
fn test_default_accessibility_applies_when_unset() {
    let engine = straight().with_default_accessibility(50);
    let mut c = parsed(pair(&[(7, 10.0, 40)]));
    assert!(engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), None).unwrap().is_empty());
    assert!(!engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), Some(0)).unwrap().is_empty());
}

#[test]
fn test_indoor_path_errors() {
    let engine = straight();
    let mut unparsed = controller(pair(&[(7, 10.0, 100)]).build(), null());
    let err = engine.indoor_path(&mut unparsed, WaypointId(1), WaypointId(2), None).unwrap_err();
    assert!(matches!(err, WayfindError::InvalidState { required: "parsed", .. }));

    let mut c = parsed(pair(&[(7, 10.0, 100)]));
    let err = engine.indoor_path(&mut c, WaypointId(1), WaypointId(99), None).unwrap_err();
    assert!(matches!(err, WayfindError::InvalidReference(_)));
}

#[test]
fn test_new_request_replaces_previous_path() {
    let engine = straight();
    let builder = VenueBuilder::new(1)
        .levels(&[0, 1])
        .waypoint(1, 0, 0.0, 0.0)
        .waypoint(2, 0, 10.0, 0.0)
        .waypoint(3, 1, 10.0, 0.0)
        .edge(1, 1, 2, 10.0, 100)
        .edge(2, 2, 3, 5.0, 100);
    let mut c = parsed(builder);

    engine.indoor_path(&mut c, WaypointId(1), WaypointId(3), None).unwrap();
    assert_eq!(c.path_shape_count(), 2);
    engine.indoor_path(&mut c, WaypointId(1), WaypointId(2), None).unwrap();
    assert_eq!(c.path_shape_count(), 1);

    c.clear_wayfind_path();
    assert_eq!(c.path_shape_count(), 0);
    assert_eq!(c.applied_token(), None);
}

// ----- indoor / outdoor -----

#[tokio::test]
async fn test_indoor_to_outdoor_uses_nearest_exit() {
    let engine = straight();
    let h = parsed_handle(two_exits());

    let route = engine.indoor_to_outdoor(&h, WaypointId(1), east_of_venue_one(), None).await.unwrap();
    assert_eq!(route.indoor.waypoints().collect::<Vec<_>>(), vec![WaypointId(1), WaypointId(3)]);
    assert_eq!(route.outdoor.last(), Some(&east_of_venue_one()));
    // The straight-line leg starts at the exit, so the connector collapses
    assert_eq!(route.connecting.len(), 1);
    assert_eq!(h.lock().path_shape_count(), 2);

    let route = engine.indoor_to_outdoor(&h, WaypointId(1), west_of_venue_one(), None).await.unwrap();
    assert_eq!(route.indoor.waypoints().last(), Some(WaypointId(2)));
    assert_eq!(engine.metrics().routes_found_total(), 2);
}

#[tokio::test]
async fn test_outdoor_to_indoor_enters_through_nearest_exit() {
    let engine = straight();
    let h = parsed_handle(two_exits());

    let route = engine.outdoor_to_indoor(&h, west_of_venue_one(), WaypointId(1), None).await.unwrap();
    assert_eq!(route.indoor.waypoints().collect::<Vec<_>>(), vec![WaypointId(2), WaypointId(1)]);
    assert_eq!(route.outdoor.first(), Some(&west_of_venue_one()));
    assert_eq!(route.outdoor.last().copied(), route.indoor.first_geo());
}

#[tokio::test]
async fn test_no_accessible_exit_is_empty_not_error() {
    let engine = straight();
    let builder = VenueBuilder::new(1).level(0).waypoint(1, 0, 0.0, 0.0).exit(2, 0, 5.0, 0.0).edge(1, 1, 2, 5.0, 30);
    let h = parsed_handle(builder);

    let route = engine.indoor_to_outdoor(&h, WaypointId(1), east_of_venue_one(), Some(80)).await.unwrap();
    assert!(route.is_empty());
    assert_eq!(h.lock().path_shape_count(), 0);
}

#[tokio::test]
async fn test_provider_without_route_is_empty() {
    let engine = engine(Arc::new(NoRouteRouter));
    let h = parsed_handle(two_exits());
    let route = engine.indoor_to_outdoor(&h, WaypointId(1), east_of_venue_one(), None).await.unwrap();
    assert!(route.is_empty());
    assert_eq!(engine.metrics().unreachable_total(), 1);
}

#[tokio::test]
async fn test_provider_failure_renders_nothing() {
    let engine = engine(Arc::new(FailingRouter));
    let h = parsed_handle(two_exits());
    engine.indoor_path(&mut h.lock(), WaypointId(1), WaypointId(3), None).unwrap();
    assert_eq!(h.lock().path_shape_count(), 1);

    let err = engine.indoor_to_outdoor(&h, WaypointId(1), west_of_venue_one(), None).await.unwrap_err();
    assert!(matches!(err, WayfindError::ProviderFailure(_)));
    // Previous path untouched, no partial stitched render
    assert_eq!(h.lock().path_shape_count(), 1);
    assert!(h.lock().outdoor_store().shapes().next().is_none());
    assert_eq!(engine.metrics().provider_failures_total(), 1);
}

#[tokio::test]
async fn test_outdoor_timeout_is_provider_failure() {
    let engine = engine(Arc::new(SlowRouter(Duration::from_millis(500))))
        .with_outdoor_timeout(Duration::from_millis(20));
    let h = parsed_handle(two_exits());

    let err = engine.indoor_to_outdoor(&h, WaypointId(1), east_of_venue_one(), None).await.unwrap_err();
    assert!(matches!(err, WayfindError::ProviderFailure(ref msg) if msg.contains("timed out")));
    assert_eq!(h.lock().path_shape_count(), 0);
}

#[tokio::test]
async fn test_stale_outdoor_result_does_not_overwrite_newer_request() {
    let router = Arc::new(GatedRouter::default());
    let engine = Arc::new(engine(router.clone()));
    let h = parsed_handle(two_exits());

    let slow = tokio::spawn({
        let (engine, h) = (engine.clone(), h.clone());
        async move { engine.indoor_to_outdoor(&h, WaypointId(1), east_of_venue_one(), None).await }
    });
    router.wait_for_first_call().await;

    let fresh = engine.indoor_to_outdoor(&h, WaypointId(1), west_of_venue_one(), None).await.unwrap();
    assert_eq!(fresh.indoor.waypoints().last(), Some(WaypointId(2)));
    assert_eq!(h.lock().applied_token(), Some(2));

    router.release.notify_one();
    let stale = slow.await.unwrap();
    assert!(matches!(stale, Err(WayfindError::Superseded { token: 1, latest: 2 })));
    assert_eq!(h.lock().applied_token(), Some(2));
    assert_eq!(engine.metrics().stale_discarded_total(), 1);
}

#[tokio::test]
async fn test_clear_retires_in_flight_request() {
    let router = Arc::new(GatedRouter::default());
    let engine = Arc::new(engine(router.clone()));
    let h = parsed_handle(two_exits());

    let pending = tokio::spawn({
        let (engine, h) = (engine.clone(), h.clone());
        async move { engine.indoor_to_outdoor(&h, WaypointId(1), east_of_venue_one(), None).await }
    });
    router.wait_for_first_call().await;
    h.lock().clear_wayfind_path();

    router.release.notify_one();
    assert!(matches!(pending.await.unwrap(), Err(WayfindError::Superseded { .. })));
    assert_eq!(h.lock().path_shape_count(), 0);
}

#[tokio::test]
async fn test_outdoor_to_outdoor_delegates() {
    let engine = straight();
    let (a, b) = (east_of_venue_one(), west_of_venue_one());
    assert_eq!(engine.outdoor_to_outdoor(a, b).await.unwrap(), Some(vec![a, b]));

    let engine = self::engine(Arc::new(NoRouteRouter));
    assert_eq!(engine.outdoor_to_outdoor(a, b).await.unwrap(), None);
}

// ----- venue to venue -----

fn venues(builders: Vec<VenueBuilder>) -> BTreeMap<VenueId, ControllerHandle> {
    builders
        .into_iter()
        .map(|b| {
            let h = parsed_handle(b);
            let id = h.lock().venue_id();
            (id, h)
        })
        .collect()
}

#[tokio::test]
async fn test_venue_to_venue_prefers_linked_indoor_route() {
    let engine = straight();
    let set = venues(vec![two_exits(), second_venue()]);
    let links = vec![VenueLink::new(gw(1, 3), gw(2, 1), 20.0)];

    let route = engine.venue_to_venue(&set, &links, gw(1, 1), gw(2, 2), None).await.unwrap();
    let VenueRoute::Indoor { legs, .. } = route else {
        panic!("expected indoor route, got {route:?}");
    };
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0].waypoints().collect::<Vec<_>>(), vec![WaypointId(1), WaypointId(3)]);
    assert_eq!(legs[1].waypoints().collect::<Vec<_>>(), vec![WaypointId(1), WaypointId(2)]);
    assert_eq!(set[&VenueId(1)].lock().path_shape_count(), 1);
    assert_eq!(set[&VenueId(2)].lock().path_shape_count(), 1);
}

#[tokio::test]
async fn test_venue_to_venue_stitches_without_link() {
    let engine = straight();
    let set = venues(vec![two_exits(), second_venue()]);

    let route = engine.venue_to_venue(&set, &[], gw(1, 1), gw(2, 2), None).await.unwrap();
    let VenueRoute::Stitched { start, outdoor, end, .. } = route else {
        panic!("expected stitched route, got {route:?}");
    };
    let exit = start.waypoints().last().unwrap();
    assert!(exit == WaypointId(2) || exit == WaypointId(3));
    assert_eq!(end.waypoints().collect::<Vec<_>>(), vec![WaypointId(1), WaypointId(2)]);
    assert_eq!(outdoor.first().copied(), start.last_geo());
    assert_eq!(outdoor.last().copied(), end.first_geo());
    assert_eq!(set[&VenueId(1)].lock().path_shape_count(), 2);
    assert_eq!(set[&VenueId(2)].lock().path_shape_count(), 1);
}

#[tokio::test]
async fn test_venue_to_venue_link_below_accessibility_falls_back() {
    let engine = straight();
    let set = venues(vec![two_exits(), second_venue()]);
    let links = vec![VenueLink::new(gw(1, 3), gw(2, 1), 20.0).with_accessibility(10)];

    let route = engine.venue_to_venue(&set, &links, gw(1, 1), gw(2, 2), Some(50)).await.unwrap();
    assert!(matches!(route, VenueRoute::Stitched { .. }));
}

#[tokio::test]
async fn test_venue_to_venue_same_venue_and_errors() {
    let engine = straight();
    let set = venues(vec![two_exits(), second_venue()]);

    let route = engine.venue_to_venue(&set, &[], gw(1, 2), gw(1, 3), None).await.unwrap();
    assert!(route.is_indoor());

    let err = engine.venue_to_venue(&set, &[], gw(1, 1), gw(9, 1), None).await.unwrap_err();
    assert!(matches!(err, WayfindError::InvalidReference(_)));

    let err = engine.venue_to_venue(&set, &[], gw(1, 1), gw(2, 42), None).await.unwrap_err();
    assert!(matches!(err, WayfindError::InvalidReference(_)));
}

#[tokio::test]
async fn test_venue_to_venue_provider_failure_renders_nothing() {
    let engine = engine(Arc::new(FailingRouter));
    let set = venues(vec![two_exits(), second_venue()]);

    let err = engine.venue_to_venue(&set, &[], gw(1, 1), gw(2, 2), None).await.unwrap_err();
    assert!(matches!(err, WayfindError::ProviderFailure(_)));
    assert_eq!(set[&VenueId(1)].lock().path_shape_count(), 0);
    assert_eq!(set[&VenueId(2)].lock().path_shape_count(), 0);
}

#[tokio::test]
async fn test_venue_to_venue_without_outdoor_route_clears_both_venues() {
    let set = venues(vec![two_exits(), second_venue()]);
    let links = vec![VenueLink::new(gw(1, 3), gw(2, 1), 20.0)];
    straight().venue_to_venue(&set, &links, gw(1, 1), gw(2, 2), None).await.unwrap();
    assert_eq!(set[&VenueId(1)].lock().path_shape_count(), 1);
    assert_eq!(set[&VenueId(2)].lock().path_shape_count(), 1);

    let engine = engine(Arc::new(NoRouteRouter));
    let route = engine.venue_to_venue(&set, &[], gw(1, 1), gw(2, 2), None).await.unwrap();
    assert_eq!(route, VenueRoute::Unreachable);
    assert_eq!(set[&VenueId(1)].lock().path_shape_count(), 0);
    assert_eq!(set[&VenueId(2)].lock().path_shape_count(), 0);
    assert_eq!(engine.metrics().unreachable_total(), 1);
}

#[tokio::test]
async fn test_venue_to_venue_without_accessible_entry_clears_both_venues() {
    let annex = VenueBuilder::new(2).level(0).exit(1, 0, 0.0, 0.0).waypoint(2, 0, 10.0, 0.0).edge(1, 1, 2, 10.0, 30);
    let set = venues(vec![two_exits(), annex]);
    let engine = straight();

    let route = engine.venue_to_venue(&set, &[], gw(1, 1), gw(2, 2), None).await.unwrap();
    assert!(matches!(route, VenueRoute::Stitched { .. }));
    assert!(set[&VenueId(1)].lock().path_shape_count() > 0);

    let route = engine.venue_to_venue(&set, &[], gw(1, 1), gw(2, 2), Some(50)).await.unwrap();
    assert_eq!(route, VenueRoute::Unreachable);
    assert_eq!(set[&VenueId(1)].lock().path_shape_count(), 0);
    assert_eq!(set[&VenueId(2)].lock().path_shape_count(), 0);
}
