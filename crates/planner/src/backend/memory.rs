//! Scripted in-process backends.
//!
//! Public so crates embedding the planner can drive it without a network
//! service; the planner's own tests use it the same way.
//!
//! Responses are queued per operation and handed out in order; an optional
//! delay is slept before each response so timeouts can be exercised with a
//! paused tokio clock. With an empty queue, routing synthesizes a straight
//! route through the requested waypoints and search returns no features.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use foundation::math::{LonLat, polyline_length};
use parking_lot::Mutex;
use scene::{FeatureId, GeoJsonFeature, Properties};
use serde_json::json;

use super::{
    AddressSearch, AlongRouteSearch, BoxFuture, LegData, PoiSearch, ReverseSearch, RouteData,
    RoutePoint, RouteRequest, RouteResult, RoutingBackend, SearchBackend,
};
use crate::error::BackendError;
use crate::route::RouteSummary;

/// Vertices generated per leg of a synthesized route.
pub const POINTS_PER_LEG: usize = 250;

/// Assumed speed for synthesized travel times (50 km/h).
const SYNTH_SPEED_MPS: f64 = 13.9;

struct Scripted<T> {
    delay: Option<Duration>,
    response: Result<T, BackendError>,
}

async fn deliver<T>(
    next: Option<Scripted<T>>,
    fallback: impl FnOnce() -> T,
) -> Result<T, BackendError> {
    match next {
        None => Ok(fallback()),
        Some(s) => {
            if let Some(delay) = s.delay {
                tokio::time::sleep(delay).await;
            }
            s.response
        }
    }
}

#[derive(Default)]
pub struct MemoryRouting {
    scripted: Mutex<VecDeque<Scripted<RouteResult>>>,
    requests: Mutex<Vec<RouteRequest>>,
}

impl MemoryRouting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<RouteResult, BackendError>) {
        self.scripted.lock().push_back(Scripted {
            delay: None,
            response,
        });
    }

    pub fn push_delayed(&self, delay: Duration, response: Result<RouteResult, BackendError>) {
        self.scripted.lock().push_back(Scripted {
            delay: Some(delay),
            response,
        });
    }

    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().clone()
    }
}

impl RoutingBackend for MemoryRouting {
    fn calculate_route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'_, Result<RouteResult, BackendError>> {
        let waypoints = request.waypoints.clone();
        self.requests.lock().push(request);
        let next = self.scripted.lock().pop_front();
        Box::pin(deliver(next, move || straight_route(&waypoints)))
    }
}

/// Route visiting `waypoints` in order along straight segments.
pub fn straight_route(waypoints: &[LonLat]) -> RouteResult {
    let legs: Vec<LegData> = waypoints
        .windows(2)
        .map(|w| {
            let points: Vec<LonLat> = (0..POINTS_PER_LEG)
                .map(|i| {
                    let t = i as f64 / (POINTS_PER_LEG - 1) as f64;
                    [w[0][0] + t * (w[1][0] - w[0][0]), w[0][1] + t * (w[1][1] - w[0][1])]
                })
                .collect();
            LegData {
                summary: synth_summary(polyline_length(&points)),
                points: points.into_iter().map(RoutePoint::new).collect(),
            }
        })
        .collect();
    let total: f64 = legs.iter().map(|l| l.summary.length_in_meters).sum();
    RouteResult {
        routes: vec![RouteData {
            summary: synth_summary(total),
            legs,
        }],
        optimized_waypoints: Vec::new(),
    }
}

fn synth_summary(length_in_meters: f64) -> RouteSummary {
    RouteSummary {
        length_in_meters,
        travel_time_in_seconds: (length_in_meters / SYNTH_SPEED_MPS).round() as u64,
        ..RouteSummary::default()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SearchOp {
    Poi,
    AlongRoute,
    Address,
    Reverse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchCall {
    Poi(PoiSearch),
    AlongRoute(AlongRouteSearch),
    Address(AddressSearch),
    Reverse(ReverseSearch),
}

#[derive(Default)]
pub struct MemorySearch {
    scripts: Mutex<BTreeMap<SearchOp, VecDeque<Scripted<Vec<GeoJsonFeature>>>>>,
    calls: Mutex<Vec<SearchCall>>,
}

impl MemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, op: SearchOp, response: Result<Vec<GeoJsonFeature>, BackendError>) {
        self.enqueue(op, None, response);
    }

    pub fn push_delayed(
        &self,
        op: SearchOp,
        delay: Duration,
        response: Result<Vec<GeoJsonFeature>, BackendError>,
    ) {
        self.enqueue(op, Some(delay), response);
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().clone()
    }

    fn enqueue(
        &self,
        op: SearchOp,
        delay: Option<Duration>,
        response: Result<Vec<GeoJsonFeature>, BackendError>,
    ) {
        self.scripts
            .lock()
            .entry(op)
            .or_default()
            .push_back(Scripted { delay, response });
    }

    fn respond(
        &self,
        op: SearchOp,
        call: SearchCall,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        self.calls.lock().push(call);
        let next = self.scripts.lock().get_mut(&op).and_then(VecDeque::pop_front);
        Box::pin(deliver(next, Vec::new))
    }
}

impl SearchBackend for MemorySearch {
    fn search_poi(
        &self,
        request: PoiSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        self.respond(SearchOp::Poi, SearchCall::Poi(request))
    }

    fn search_along_route(
        &self,
        request: AlongRouteSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        self.respond(SearchOp::AlongRoute, SearchCall::AlongRoute(request))
    }

    fn search_address(
        &self,
        request: AddressSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        self.respond(SearchOp::Address, SearchCall::Address(request))
    }

    fn search_address_reverse(
        &self,
        request: ReverseSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        self.respond(SearchOp::Reverse, SearchCall::Reverse(request))
    }
}

/// Point feature shaped like a category search hit.
pub fn poi_feature(id: &str, position: LonLat, poi_name: &str) -> GeoJsonFeature {
    let mut properties = Properties::new();
    properties.insert("type".into(), json!("POI"));
    properties.insert("poi".into(), json!({ "name": poi_name }));
    GeoJsonFeature {
        id: Some(FeatureId::from(id)),
        ..GeoJsonFeature::point(position, properties)
    }
}

/// Point feature shaped like an address search hit.
pub fn address_feature(id: &str, position: LonLat, freeform: &str) -> GeoJsonFeature {
    let mut properties = Properties::new();
    properties.insert("type".into(), json!("Street"));
    properties.insert("address".into(), json!({ "freeformAddress": freeform }));
    GeoJsonFeature {
        id: Some(FeatureId::from(id)),
        ..GeoJsonFeature::point(position, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRouting, MemorySearch, POINTS_PER_LEG, SearchCall, SearchOp, straight_route};
    use crate::backend::{ReverseSearch, RouteResult, RoutingBackend, SearchBackend};
    use crate::error::{BackendError, BackendErrorKind};
    use std::time::Duration;

    #[test]
    fn straight_route_has_one_leg_per_hop() {
        let r = straight_route(&[[25.0, 44.0], [26.0, 45.0], [26.5, 45.0]]);
        let route = &r.routes[0];
        assert_eq!(route.legs.len(), 2);
        assert_eq!(route.legs[0].points.len(), POINTS_PER_LEG);
        assert!(route.summary.length_in_meters > 0.0);
        assert!(route.summary.travel_time_in_seconds > 0);
    }

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let routing = MemoryRouting::new();
        routing.push(Ok(RouteResult::default()));
        routing.push(Err(BackendError::new(BackendErrorKind::Status(500), "boom")));
        let request = crate::backend::RouteRequest {
            waypoints: vec![[25.0, 44.0], [26.0, 45.0]],
            profile: Default::default(),
            compute_best_order: true,
            route_type: "shortest".into(),
            traffic: false,
            timeout: Duration::from_secs(10),
        };
        assert!(routing.calculate_route(request.clone()).await.unwrap().routes.is_empty());
        assert!(routing.calculate_route(request.clone()).await.is_err());
        assert_eq!(routing.calculate_route(request).await.unwrap().routes.len(), 1);
        assert_eq!(routing.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_search_sleeps_before_answering() {
        let search = MemorySearch::new();
        search.push_delayed(SearchOp::Reverse, Duration::from_secs(30), Ok(vec![]));
        let request = ReverseSearch {
            position: [25.0, 44.0],
            timeout: Duration::from_secs(10),
        };
        let started = tokio::time::Instant::now();
        search.search_address_reverse(request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(matches!(search.calls()[0], SearchCall::Reverse(_)));
    }
}
