//! Azure Maps REST adapter for the planner backends.

use std::time::Duration;

use planner::backend::{
    AddressSearch, AlongRouteSearch, BoxFuture, PoiSearch, ReverseSearch, RouteRequest, RouteResult,
    RoutingBackend, SearchBackend,
};
use planner::{BackendError, BackendErrorKind};
use scene::{FeatureId, GeoJsonFeature, Properties};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://atlas.microsoft.com";
const API_VERSION: &str = "1.0";

type Query = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct AzureMaps {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl AzureMaps {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            key: key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    fn with_auth(&self, mut query: Query) -> Query {
        query.push(("api-version", API_VERSION.to_string()));
        query.push(("subscription-key", self.key.clone()));
        query
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
        timeout: Duration,
    ) -> Result<T, BackendError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(&self.with_auth(query))
            .timeout(timeout)
            .send()
            .await;
        read_json(resp).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        query: Query,
        body: &B,
        timeout: Duration,
    ) -> Result<T, BackendError> {
        let resp = self
            .client
            .post(self.url(path))
            .query(&self.with_auth(query))
            .json(body)
            .timeout(timeout)
            .send()
            .await;
        read_json(resp).await
    }

    async fn search(
        &self,
        path: &str,
        query: Query,
        timeout: Duration,
    ) -> Result<Vec<GeoJsonFeature>, BackendError> {
        let body: SearchResponse = self.get_json(path, query, timeout).await?;
        Ok(body.results.into_iter().filter_map(result_feature).collect())
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Result<reqwest::Response>,
) -> Result<T, BackendError> {
    let resp = resp.map_err(transport)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(BackendError::new(
            BackendErrorKind::Status(status.as_u16()),
            format!("Azure Maps returned {status}"),
        ));
    }
    resp.json().await.map_err(|e| {
        BackendError::with_source(BackendErrorKind::Decode, "invalid response body", e)
    })
}

fn transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::with_source(BackendErrorKind::Timeout, "request timed out", err)
    } else {
        BackendError::with_source(BackendErrorKind::Transport, "HTTP request failed", err)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Properties>,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    addresses: Vec<Properties>,
}

/// Search result (`position: {lat, lon}`) as a point feature carrying the
/// remaining result fields.
fn result_feature(mut result: Properties) -> Option<GeoJsonFeature> {
    let position = result.remove("position")?;
    let lat = position.get("lat")?.as_f64()?;
    let lon = position.get("lon")?.as_f64()?;
    let id = result.get("id").and_then(Value::as_str).map(FeatureId::from);
    Some(GeoJsonFeature {
        id,
        ..GeoJsonFeature::point([lon, lat], result)
    })
}

/// Reverse geocoding hit; its position is a `"lat,lon"` string.
fn reverse_feature(mut address: Properties) -> Option<GeoJsonFeature> {
    let position = address.remove("position")?;
    let (lat, lon) = position.as_str()?.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    Some(GeoJsonFeature::point([lon, lat], address))
}

fn route_query(request: &RouteRequest) -> Query {
    let stops = request
        .waypoints
        .iter()
        .map(|p| format!("{},{}", p[1], p[0]))
        .collect::<Vec<_>>()
        .join(":");
    let profile = &request.profile;
    let mut query = vec![
        ("query", stops),
        ("computeBestOrder", request.compute_best_order.to_string()),
        ("routeType", request.route_type.clone()),
        ("traffic", request.traffic.to_string()),
        ("travelMode", profile.travel_mode.clone()),
    ];
    let limits = [
        ("vehicleLength", profile.length_m),
        ("vehicleWidth", profile.width_m),
        ("vehicleHeight", profile.height_m),
        ("vehicleWeight", profile.weight_kg),
        ("vehicleMaxSpeed", profile.max_speed_kmh),
    ];
    query.extend(limits.into_iter().filter_map(|(k, v)| v.map(|v| (k, v.to_string()))));
    query
}

impl RoutingBackend for AzureMaps {
    fn calculate_route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'_, Result<RouteResult, BackendError>> {
        Box::pin(async move {
            debug!(stops = request.waypoints.len(), "route directions");
            self.get_json("route/directions/json", route_query(&request), request.timeout)
                .await
        })
    }
}

impl SearchBackend for AzureMaps {
    fn search_poi(
        &self,
        request: PoiSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        Box::pin(async move {
            let query = vec![
                ("query", request.category),
                ("lon", request.center[0].to_string()),
                ("lat", request.center[1].to_string()),
                ("limit", request.limit.to_string()),
            ];
            self.search("search/poi/category/json", query, request.timeout).await
        })
    }

    fn search_along_route(
        &self,
        request: AlongRouteSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        Box::pin(async move {
            // The service bounds along-route hits by detour time in seconds.
            let query = vec![
                ("query", request.category),
                ("maxDetourTime", request.radius_m.to_string()),
                ("limit", request.limit.to_string()),
            ];
            let body = json!({ "route": { "type": "LineString", "coordinates": request.route } });
            let resp: SearchResponse = self
                .post_json("search/alongRoute/json", query, &body, request.timeout)
                .await?;
            Ok(resp.results.into_iter().filter_map(result_feature).collect())
        })
    }

    fn search_address(
        &self,
        request: AddressSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        Box::pin(async move {
            let query = vec![
                ("query", request.query),
                ("lon", request.bias[0].to_string()),
                ("lat", request.bias[1].to_string()),
                ("countrySet", request.country_set.join(",")),
                ("limit", request.limit.to_string()),
                ("maxFuzzyLevel", request.max_fuzzy_level.to_string()),
                ("view", "Auto".to_string()),
            ];
            self.search("search/address/json", query, request.timeout).await
        })
    }

    fn search_address_reverse(
        &self,
        request: ReverseSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>> {
        Box::pin(async move {
            let query = vec![(
                "query",
                format!("{},{}", request.position[1], request.position[0]),
            )];
            let resp: ReverseResponse = self
                .get_json("search/address/reverse/json", query, request.timeout)
                .await?;
            Ok(resp.addresses.into_iter().filter_map(reverse_feature).collect())
        })
    }
}
