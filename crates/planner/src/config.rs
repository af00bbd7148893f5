use std::str::FromStr;
use std::time::Duration;

use foundation::math::{DEFAULT_SAMPLE_COUNT, LonLat};
use serde::{Deserialize, Serialize};

/// Tunables for search, routing and camera behaviour.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub request_timeout_ms: u64,
    pub follow_interval_ms: u64,
    pub recenter_debounce_ms: u64,
    pub interaction_cooldown_ms: u64,
    pub sample_count: usize,

    pub along_route_category: String,
    pub along_route_radius_m: u32,
    pub along_route_limit: u32,
    pub poi_category: String,
    pub poi_limit: u32,
    pub address_limit: u32,
    pub max_fuzzy_level: u8,
    pub country_set: Vec<String>,

    pub route_padding: u32,
    pub follow_padding: u32,
    pub follow_max_zoom: u8,
    pub results_padding: u32,
    pub results_max_zoom: u8,
    pub cluster_leaf_limit: usize,
    pub default_center: LonLat,
    pub default_zoom: u8,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            follow_interval_ms: 3_000,
            recenter_debounce_ms: 15_000,
            interaction_cooldown_ms: 10_000,
            sample_count: DEFAULT_SAMPLE_COUNT,
            along_route_category: "PARKING".to_string(),
            along_route_radius_m: 3_600,
            along_route_limit: 20,
            poi_category: "PARKING".to_string(),
            poi_limit: 25,
            address_limit: 10,
            max_fuzzy_level: 2,
            country_set: vec!["RO".to_string()],
            route_padding: 80,
            follow_padding: 160,
            follow_max_zoom: 13,
            results_padding: 80,
            results_max_zoom: 8,
            cluster_leaf_limit: 50,
            default_center: [25.32, 44.71],
            default_zoom: 8,
        }
    }
}

impl PlannerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Overrides fields from `ROUTE_PLANNER_*` environment variables.
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let l = &lookup;
        self.request_timeout_ms =
            env_var(l, "ROUTE_PLANNER_REQUEST_TIMEOUT_MS", self.request_timeout_ms);
        self.follow_interval_ms =
            env_var(l, "ROUTE_PLANNER_FOLLOW_INTERVAL_MS", self.follow_interval_ms);
        self.recenter_debounce_ms =
            env_var(l, "ROUTE_PLANNER_RECENTER_DEBOUNCE_MS", self.recenter_debounce_ms);
        self.interaction_cooldown_ms =
            env_var(l, "ROUTE_PLANNER_INTERACTION_COOLDOWN_MS", self.interaction_cooldown_ms);
        self.sample_count = env_var(l, "ROUTE_PLANNER_SAMPLE_COUNT", self.sample_count);
        self.along_route_radius_m =
            env_var(l, "ROUTE_PLANNER_ALONG_ROUTE_RADIUS_M", self.along_route_radius_m);
        self.along_route_limit =
            env_var(l, "ROUTE_PLANNER_ALONG_ROUTE_LIMIT", self.along_route_limit);
        self.poi_limit = env_var(l, "ROUTE_PLANNER_POI_LIMIT", self.poi_limit);
        self.address_limit = env_var(l, "ROUTE_PLANNER_ADDRESS_LIMIT", self.address_limit);
        if let Some(category) = lookup("ROUTE_PLANNER_CATEGORY").filter(|c| !c.trim().is_empty()) {
            self.along_route_category = category.trim().to_string();
            self.poi_category = self.along_route_category.clone();
        }
        if let Some(countries) = lookup("ROUTE_PLANNER_COUNTRY_SET") {
            self.country_set = countries
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn follow_interval(&self) -> Duration {
        Duration::from_millis(self.follow_interval_ms)
    }

    pub fn recenter_debounce(&self) -> Duration {
        Duration::from_millis(self.recenter_debounce_ms)
    }

    pub fn interaction_cooldown(&self) -> Duration {
        Duration::from_millis(self.interaction_cooldown_ms)
    }
}

fn env_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::PlannerConfig;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn defaults_match_backend_contract() {
        let c = PlannerConfig::default();
        assert_eq!(c.request_timeout(), Duration::from_secs(10));
        assert_eq!(c.follow_interval(), Duration::from_secs(3));
        assert_eq!(c.recenter_debounce(), Duration::from_secs(15));
        assert_eq!(c.interaction_cooldown(), Duration::from_secs(10));
        assert_eq!(c.sample_count, 100);
        assert_eq!(c.country_set, vec!["RO".to_string()]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c =
            PlannerConfig::from_json(r#"{"poi_limit": 5, "country_set": ["RO", "BG"]}"#).unwrap();
        assert_eq!(c.poi_limit, 5);
        assert_eq!(c.country_set.len(), 2);
        assert_eq!(c.along_route_limit, 20);
        assert!(PlannerConfig::from_json("{").is_err());
    }

    #[test]
    fn env_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ROUTE_PLANNER_REQUEST_TIMEOUT_MS", "2500"),
            ("ROUTE_PLANNER_SAMPLE_COUNT", "not-a-number"),
            ("ROUTE_PLANNER_COUNTRY_SET", "RO, MD,"),
            ("ROUTE_PLANNER_CATEGORY", "PETROL_STATION"),
        ]);
        let c = PlannerConfig::default().apply_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.request_timeout_ms, 2500);
        assert_eq!(c.sample_count, 100);
        assert_eq!(c.country_set, vec!["RO".to_string(), "MD".to_string()]);
        assert_eq!(c.poi_category, "PETROL_STATION");
    }
}
