use chrono::{DateTime, FixedOffset};
use foundation::bounds::Aabb2;
use foundation::math::LonLat;
use serde::{Deserialize, Deserializer, Serialize};

use crate::backend::{OptimizedWaypoint, RouteResult};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub length_in_meters: f64,
    #[serde(default)]
    pub travel_time_in_seconds: u64,
    #[serde(default)]
    pub traffic_delay_in_seconds: u64,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub departure_time: Option<DateTime<FixedOffset>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub arrival_time: Option<DateTime<FixedOffset>>,
}

/// RFC 3339 timestamp with an offset; `T` or a space may separate date and time.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text).or_else(|_| text.parse()).ok()
}

/// An unparseable time drops the field instead of failing the whole route.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.as_deref().and_then(parse_timestamp))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLeg {
    pub summary: RouteSummary,
    pub points: Vec<LonLat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegName {
    pub from: String,
    pub to: String,
}

impl std::fmt::Display for LegName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.from, self.to)
    }
}

/// A computed route. Replaced wholesale on every recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub summary: RouteSummary,
    pub legs: Vec<RouteLeg>,
    pub optimized_waypoints: Vec<OptimizedWaypoint>,
    pub waypoint_names: Vec<String>,
    pub leg_names: Vec<LegName>,
}

impl Route {
    /// Builds a route from the first backend route. `None` when the backend
    /// returned no route at all.
    pub fn from_result(result: RouteResult, waypoint_names: Vec<String>) -> Option<Route> {
        let RouteResult {
            routes,
            optimized_waypoints,
        } = result;
        let first = routes.into_iter().next()?;
        let legs: Vec<RouteLeg> = first
            .legs
            .into_iter()
            .map(|leg| RouteLeg {
                summary: leg.summary,
                points: leg.points.iter().filter_map(|p| p.lon_lat()).collect(),
            })
            .collect();
        let leg_names = reconcile_leg_names(&waypoint_names, &optimized_waypoints, legs.len());
        Some(Route {
            summary: first.summary,
            legs,
            optimized_waypoints,
            waypoint_names,
            leg_names,
        })
    }

    /// All leg points in travel order.
    pub fn coordinates(&self) -> Vec<LonLat> {
        self.legs.iter().flat_map(|l| l.points.iter().copied()).collect()
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_points(self.coordinates())
    }
}

/// Names the endpoints of each traveled leg.
///
/// Leg `i` runs from `names[perm[i].optimized_index]` to
/// `names[perm[i + 1].optimized_index]`. A missing or out-of-range permutation
/// entry falls back to the positional index.
pub fn reconcile_leg_names(
    names: &[String],
    perm: &[OptimizedWaypoint],
    leg_count: usize,
) -> Vec<LegName> {
    let name_at = |i: usize| -> String {
        let idx = perm
            .get(i)
            .map(|w| w.optimized_index)
            .filter(|idx| *idx < names.len())
            .unwrap_or(i);
        names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("#{}", idx + 1))
    };
    (0..leg_count)
        .map(|i| LegName {
            from: name_at(i),
            to: name_at(i + 1),
        })
        .collect()
}
