use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::route::{Route, RouteSummary};

/// Popup data for a computed route; also the "copy as JSON" payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetails {
    pub length: String,
    pub travel_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_delay: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leg_summaries: Vec<LegDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub length: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_delay: Option<String>,
}

impl RouteDetails {
    /// Per-leg details are listed only for routes with more than one leg.
    /// A leg is labelled with its direction only while the reported
    /// permutation is shorter than the name list and the leg index is within it.
    pub fn from_route(route: &Route) -> Self {
        let s = &route.summary;
        let names = route.waypoint_names.len();
        let labelled = route.optimized_waypoints.len() < names;
        let leg_summaries = if route.legs.len() > 1 {
            route
                .legs
                .iter()
                .enumerate()
                .map(|(idx, leg)| LegDetails {
                    direction: route
                        .leg_names
                        .get(idx)
                        .filter(|_| labelled && idx < names)
                        .map(ToString::to_string),
                    length: km(&leg.summary),
                    arrival: leg.summary.arrival_time.as_ref().map(clock_time),
                    travel_time: nonzero(leg.summary.travel_time_in_seconds).map(hours_minutes),
                    traffic_delay: nonzero(leg.summary.traffic_delay_in_seconds).map(hours_minutes),
                })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            length: km(s),
            travel_time: hours_minutes(s.travel_time_in_seconds),
            departure_time: s.departure_time.as_ref().map(clock_time),
            arrival_time: s.arrival_time.as_ref().map(clock_time),
            traffic_delay: nonzero(s.traffic_delay_in_seconds).map(hours_minutes),
            leg_summaries,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn km(s: &RouteSummary) -> String {
    format!("{} km", (s.length_in_meters / 1000.0).round())
}

fn nonzero(v: u64) -> Option<u64> {
    (v > 0).then_some(v)
}

/// Whole hours and minutes rounded up, as `HH:MM`.
pub fn hours_minutes(seconds: u64) -> String {
    let mut hours = seconds / 3600;
    let mut minutes = (seconds % 3600).div_ceil(60);
    if minutes == 60 {
        hours += 1;
        minutes = 0;
    }
    format!("{hours:02}:{minutes:02}")
}

/// Local `HH:MM` of a timestamp, in its own offset.
pub fn clock_time(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%H:%M").to_string()
}
