//! Routing and search backend abstraction.
//!
//! The planner never talks HTTP itself. Hosts implement [`RoutingBackend`] and
//! [`SearchBackend`] over whatever service they use; `memory` provides
//! scripted in-process implementations.
//!
//! Search backends return GeoJSON features whose `properties` carry the raw
//! result fields (`poi`, `address`, ...). Naming and titling are applied by the
//! coordinator, not by the backend.

pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use foundation::math::LonLat;
use scene::GeoJsonFeature;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::route::RouteSummary;
use crate::vehicle::VehicleProfile;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub waypoints: Vec<LonLat>,
    pub profile: VehicleProfile,
    pub compute_best_order: bool,
    pub route_type: String,
    pub traffic: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    #[serde(default)]
    pub routes: Vec<RouteData>,
    #[serde(default)]
    pub optimized_waypoints: Vec<OptimizedWaypoint>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    pub summary: RouteSummary,
    #[serde(default)]
    pub legs: Vec<LegData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegData {
    pub summary: RouteSummary,
    #[serde(default)]
    pub points: Vec<RoutePoint>,
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutePoint {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl RoutePoint {
    pub fn new(position: LonLat) -> Self {
        Self {
            latitude: Some(position[1]),
            longitude: Some(position[0]),
        }
    }

    /// `[lon, lat]` when both parts are present and finite.
    pub fn lon_lat(&self) -> Option<LonLat> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Some([lon, lat]),
            _ => None,
        }
    }
}

/// Maps a requested waypoint index to its position in the traveled order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedWaypoint {
    pub provided_index: usize,
    pub optimized_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoiSearch {
    pub center: LonLat,
    pub category: String,
    pub limit: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlongRouteSearch {
    pub route: Vec<LonLat>,
    pub category: String,
    pub radius_m: u32,
    pub limit: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressSearch {
    pub query: String,
    pub bias: LonLat,
    pub country_set: Vec<String>,
    pub limit: u32,
    pub max_fuzzy_level: u8,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReverseSearch {
    pub position: LonLat,
    pub timeout: Duration,
}

/// Computes routes.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait RoutingBackend: Send + Sync {
    fn calculate_route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'_, Result<RouteResult, BackendError>>;
}

/// Address, category and reverse search.
pub trait SearchBackend: Send + Sync {
    fn search_poi(
        &self,
        request: PoiSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>>;

    fn search_along_route(
        &self,
        request: AlongRouteSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>>;

    fn search_address(
        &self,
        request: AddressSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>>;

    fn search_address_reverse(
        &self,
        request: ReverseSearch,
    ) -> BoxFuture<'_, Result<Vec<GeoJsonFeature>, BackendError>>;
}
