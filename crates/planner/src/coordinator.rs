use std::sync::Arc;

use foundation::math::{LonLat, sample_along_polyline};
use scene::GeoJsonFeature;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{
    AddressSearch, AlongRouteSearch, BoxFuture, PoiSearch, ReverseSearch, RouteRequest,
    RoutingBackend, SearchBackend,
};
use crate::config::PlannerConfig;
use crate::error::{BackendError, BackendErrorKind, PlannerError};
use crate::route::Route;
use crate::state::{RoutePublisher, SharedState};
use crate::vehicle::VehicleProfile;
use crate::waypoint::Waypoint;

pub const ROUTE_TYPE: &str = "shortest";

/// Search operations bounded by the request timeout.
///
/// Cheap to clone, so a search can run as a detached `'static` future while
/// the planner keeps handling input.
#[derive(Clone)]
pub struct SearchClient {
    backend: Arc<dyn SearchBackend>,
    config: Arc<PlannerConfig>,
}

impl SearchClient {
    pub fn new(backend: Arc<dyn SearchBackend>, config: Arc<PlannerConfig>) -> Self {
        Self { backend, config }
    }

    pub async fn search_address(
        &self,
        query: String,
        bias: LonLat,
    ) -> Result<Vec<GeoJsonFeature>, PlannerError> {
        let request = AddressSearch {
            query,
            bias,
            country_set: self.config.country_set.clone(),
            limit: self.config.address_limit,
            max_fuzzy_level: self.config.max_fuzzy_level,
            timeout: self.config.request_timeout(),
        };
        debug!(query = %request.query, "address search");
        self.bounded("search_address", self.backend.search_address(request)).await
    }

    /// Category search around `center`; hits are named after their POI.
    pub async fn search_poi(&self, center: LonLat) -> Result<Vec<GeoJsonFeature>, PlannerError> {
        let request = PoiSearch {
            center,
            category: self.config.poi_category.clone(),
            limit: self.config.poi_limit,
            timeout: self.config.request_timeout(),
        };
        let mut features = self.bounded("search_poi", self.backend.search_poi(request)).await?;
        merge_poi_names(&mut features);
        Ok(features)
    }

    /// Category search along the first route, over a downsampled polyline.
    pub async fn search_along_route(
        &self,
        route: &Route,
        category: &str,
        radius_m: u32,
        sample_count: usize,
    ) -> Result<Vec<GeoJsonFeature>, PlannerError> {
        let coords = route.coordinates();
        if coords.is_empty() {
            return Ok(Vec::new());
        }
        let sampled = sample_along_polyline(&coords, sample_count);
        debug!(points = coords.len(), sampled = sampled.len(), category, "search along route");
        let request = AlongRouteSearch {
            route: sampled,
            category: category.to_string(),
            radius_m,
            limit: self.config.along_route_limit,
            timeout: self.config.request_timeout(),
        };
        let mut features = self
            .bounded("search_along_route", self.backend.search_along_route(request))
            .await?;
        merge_poi_names(&mut features);
        Ok(features)
    }

    /// Address features at `position`, titled with their free-form address.
    pub async fn reverse_geocode(
        &self,
        position: LonLat,
    ) -> Result<Vec<GeoJsonFeature>, PlannerError> {
        let request = ReverseSearch {
            position,
            timeout: self.config.request_timeout(),
        };
        let mut features = self
            .bounded("reverse_geocode", self.backend.search_address_reverse(request))
            .await?;
        for f in &mut features {
            let freeform = f
                .properties
                .get("address")
                .and_then(|a| a.get("freeformAddress"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(freeform) = freeform {
                f.properties.insert("title".into(), Value::String(freeform.clone()));
                f.properties.insert("name".into(), Value::String(freeform));
            }
        }
        Ok(features)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: BoxFuture<'_, Result<T, BackendError>>,
    ) -> Result<T, PlannerError> {
        let after = self.config.request_timeout();
        match tokio::time::timeout(after, call).await {
            Err(_) => {
                warn!(operation, "search timed out");
                Err(PlannerError::SearchTimeout { operation, after })
            }
            Ok(Err(err)) => {
                warn!(operation, error = %err, "search backend failed");
                Err(PlannerError::from_search(operation, after, err))
            }
            Ok(Ok(v)) => Ok(v),
        }
    }
}

/// Copies `poi.name` into `name` for display.
fn merge_poi_names(features: &mut [GeoJsonFeature]) {
    for f in features {
        let poi_name = f
            .properties
            .get("poi")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(name) = poi_name {
            f.properties.insert("name".into(), Value::String(name));
        }
    }
}

/// Computes routes and owns the only writer of the current route.
pub struct RouteCoordinator {
    routing: Arc<dyn RoutingBackend>,
    search: SearchClient,
    config: Arc<PlannerConfig>,
    publisher: RoutePublisher,
    state: SharedState,
}

impl RouteCoordinator {
    pub fn new(
        routing: Arc<dyn RoutingBackend>,
        search: Arc<dyn SearchBackend>,
        config: Arc<PlannerConfig>,
        state: SharedState,
        publisher: RoutePublisher,
    ) -> Self {
        Self {
            routing,
            search: SearchClient::new(search, Arc::clone(&config)),
            config,
            publisher,
            state,
        }
    }

    pub fn search(&self) -> &SearchClient {
        &self.search
    }

    pub fn current_route(&self) -> Option<Arc<Route>> {
        self.state.current_route()
    }

    /// Requests an order-optimized route through `waypoints` and publishes it.
    ///
    /// On failure the previously published route stays current.
    pub async fn compute_route(
        &self,
        waypoints: &[Waypoint],
        profile: Option<&VehicleProfile>,
    ) -> Result<Arc<Route>, PlannerError> {
        if waypoints.len() < 2 {
            return Err(PlannerError::InsufficientWaypoints {
                count: waypoints.len(),
            });
        }
        let positions = waypoints
            .iter()
            .map(|w| w.position().ok_or(PlannerError::IncompleteRoute { missing: w.key }))
            .collect::<Result<Vec<_>, _>>()?;
        let names: Vec<String> = waypoints.iter().map(Waypoint::name).collect();

        let timeout = self.config.request_timeout();
        let request = RouteRequest {
            waypoints: positions,
            profile: profile.cloned().unwrap_or_default(),
            compute_best_order: true,
            route_type: ROUTE_TYPE.to_string(),
            traffic: false,
            timeout,
        };
        debug!(
            waypoints = waypoints.len(),
            travel_mode = %request.profile.travel_mode,
            "requesting route"
        );

        let pending = self.routing.calculate_route(request);
        let result = match tokio::time::timeout(timeout, pending).await {
            Err(_) => Err(BackendError::timeout(timeout)),
            Ok(r) => r,
        }
        .map_err(|err| {
            warn!(error = %err, "route computation failed, keeping previous route");
            PlannerError::RouteComputation(err)
        })?;

        let route = Route::from_result(result, names).ok_or_else(|| {
            warn!("routing backend returned no route");
            PlannerError::RouteComputation(BackendError::new(
                BackendErrorKind::Decode,
                "no route in response",
            ))
        })?;
        let route = Arc::new(route);
        self.publisher.replace(Some(Arc::clone(&route)));
        info!(
            legs = route.legs.len(),
            length_m = route.summary.length_in_meters,
            "route replaced"
        );
        Ok(route)
    }

    pub async fn search_along_route(
        &self,
        route: &Route,
        category: &str,
        radius_m: u32,
        sample_count: usize,
    ) -> Result<Vec<GeoJsonFeature>, PlannerError> {
        self.search
            .search_along_route(route, category, radius_m, sample_count)
            .await
    }

    pub fn clear_route(&self) {
        if self.state.current_route().is_some() {
            info!("route cleared");
        }
        self.publisher.replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::RouteCoordinator;
    use crate::backend::memory::{
        MemoryRouting, MemorySearch, SearchCall, SearchOp, address_feature, poi_feature,
        straight_route,
    };
    use crate::backend::{OptimizedWaypoint, RoutingBackend, SearchBackend};
    use crate::config::PlannerConfig;
    use crate::error::{BackendError, BackendErrorKind, PlannerError};
    use crate::state::channels;
    use crate::waypoint::{Waypoint, WaypointKey};
    use scene::{FeatureId, Geometry, GeometryKind, PointMeta, Properties};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        coordinator: RouteCoordinator,
        routing: Arc<MemoryRouting>,
        search: Arc<MemorySearch>,
    }

    fn fixture() -> Fixture {
        let routing = Arc::new(MemoryRouting::new());
        let search = Arc::new(MemorySearch::new());
        let (state, publisher, _location, _vehicle) = channels();
        let coordinator = RouteCoordinator::new(
            Arc::clone(&routing) as Arc<dyn RoutingBackend>,
            Arc::clone(&search) as Arc<dyn SearchBackend>,
            Arc::new(PlannerConfig::default()),
            state,
            publisher,
        );
        Fixture {
            coordinator,
            routing,
            search,
        }
    }

    fn waypoint(key: WaypointKey, name: &str, at: [f64; 2]) -> Waypoint {
        let mut properties = Properties::new();
        properties.insert("name".into(), json!(name));
        Waypoint {
            key,
            meta: Arc::new(PointMeta {
                id: Some(FeatureId::from(format!("id-{key}"))),
                source: None,
                properties,
                geometry: Some(Geometry::Point(at)),
                coordinates: Some(at),
                cluster: None,
                kind: Some(GeometryKind::Point),
            }),
        }
    }

    fn three_stops() -> Vec<Waypoint> {
        vec![
            waypoint(WaypointKey::Start, "A", [25.0, 44.0]),
            waypoint(WaypointKey::Intermediate(0), "B", [25.5, 44.5]),
            waypoint(WaypointKey::End, "C", [26.0, 45.0]),
        ]
    }

    #[tokio::test]
    async fn request_asks_for_optimized_shortest_route() {
        let f = fixture();
        let route = f.coordinator.compute_route(&three_stops(), None).await.unwrap();
        let request = &f.routing.requests()[0];
        assert!(request.compute_best_order);
        assert_eq!(request.route_type, "shortest");
        assert!(!request.traffic);
        assert_eq!(request.profile.travel_mode, "car");
        assert_eq!(request.timeout, Duration::from_secs(10));
        assert!(route.summary.length_in_meters > 0.0);
        assert!(Arc::ptr_eq(&route, &f.coordinator.current_route().unwrap()));
    }

    #[tokio::test]
    async fn permuted_order_names_legs_in_travel_order() {
        let f = fixture();
        let mut result = straight_route(&[[25.0, 44.0], [26.0, 45.0], [25.5, 44.5]]);
        result.optimized_waypoints = [0, 2, 1]
            .iter()
            .enumerate()
            .map(|(p, o)| OptimizedWaypoint {
                provided_index: p,
                optimized_index: *o,
            })
            .collect();
        f.routing.push(Ok(result));
        let route = f.coordinator.compute_route(&three_stops(), None).await.unwrap();
        let legs: Vec<String> = route.leg_names.iter().map(ToString::to_string).collect();
        assert_eq!(legs, vec!["A - C", "C - B"]);

        let route = f.coordinator.compute_route(&three_stops(), None).await.unwrap();
        let legs: Vec<String> = route.leg_names.iter().map(ToString::to_string).collect();
        assert_eq!(legs, vec!["A - B", "B - C"]);
    }

    #[tokio::test]
    async fn too_few_waypoints_is_rejected() {
        let f = fixture();
        let err = f
            .coordinator
            .compute_route(&three_stops()[..1], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::InsufficientWaypoints { count: 1 }));
        assert!(f.routing.requests().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_keeps_previous_route() {
        let f = fixture();
        let first = f.coordinator.compute_route(&three_stops(), None).await.unwrap();
        f.routing
            .push(Err(BackendError::new(BackendErrorKind::Status(500), "internal")));
        let err = f.coordinator.compute_route(&three_stops(), None).await.unwrap_err();
        assert!(matches!(err, PlannerError::RouteComputation(_)));
        assert!(Arc::ptr_eq(&first, &f.coordinator.current_route().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_routing_times_out() {
        let f = fixture();
        f.routing
            .push_delayed(Duration::from_secs(11), Ok(straight_route(&[[0.0, 0.0], [1.0, 1.0]])));
        let err = f.coordinator.compute_route(&three_stops(), None).await.unwrap_err();
        let PlannerError::RouteComputation(inner) = err else {
            panic!("expected route computation error");
        };
        assert_eq!(inner.kind, BackendErrorKind::Timeout);
        assert!(f.coordinator.current_route().is_none());
    }

    #[tokio::test]
    async fn along_route_search_downsamples_and_names_hits() {
        let f = fixture();
        let route = f.coordinator.compute_route(&three_stops(), None).await.unwrap();
        assert!(route.coordinates().len() > 100);
        f.search.push(
            SearchOp::AlongRoute,
            Ok(vec![poi_feature("p1", [25.2, 44.2], "Parcare Nord")]),
        );

        let hits = f
            .coordinator
            .search_along_route(&route, "PARKING", 3600, 0)
            .await
            .unwrap();
        assert_eq!(hits[0].properties["name"], json!("Parcare Nord"));
        let SearchCall::AlongRoute(call) = &f.search.calls()[0] else {
            panic!("expected along-route call");
        };
        assert_eq!(call.route.len(), 100);
        assert_eq!((call.category.as_str(), call.radius_m, call.limit), ("PARKING", 3600, 20));
    }

    #[tokio::test(start_paused = true)]
    async fn search_errors_are_classified() {
        let f = fixture();
        let client = f.coordinator.search();
        f.search
            .push_delayed(SearchOp::Poi, Duration::from_secs(20), Ok(vec![]));
        let err = client.search_poi([25.0, 44.0]).await.unwrap_err();
        assert!(err.is_retryable());

        f.search.push(
            SearchOp::Poi,
            Err(BackendError::new(BackendErrorKind::Status(403), "forbidden")),
        );
        let err = client.search_poi([25.0, 44.0]).await.unwrap_err();
        assert!(matches!(err, PlannerError::SearchBackend(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn reverse_geocode_titles_features() {
        let f = fixture();
        f.search.push(
            SearchOp::Reverse,
            Ok(vec![address_feature("r1", [25.0, 44.0], "Str. Lipscani 1")]),
        );
        let features = f.coordinator.search().reverse_geocode([25.0, 44.0]).await.unwrap();
        assert_eq!(features[0].properties["title"], json!("Str. Lipscani 1"));
        assert_eq!(features[0].properties["name"], json!("Str. Lipscani 1"));
    }
}
