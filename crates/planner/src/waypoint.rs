use std::sync::Arc;

use foundation::math::LonLat;
use scene::PointMeta;
use serde::{Serialize, Serializer};

/// Stable waypoint identity.
///
/// Intermediate keys are allocated once and never reused, so a key always
/// refers to the same form row, placeholder shape and result set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WaypointKey {
    Start,
    End,
    Intermediate(u32),
}

impl std::fmt::Display for WaypointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaypointKey::Start => f.write_str("start"),
            WaypointKey::End => f.write_str("end"),
            WaypointKey::Intermediate(k) => write!(f, "{k}"),
        }
    }
}

impl Serialize for WaypointKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved waypoint handed to routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub key: WaypointKey,
    pub meta: Arc<PointMeta>,
}

impl Waypoint {
    pub fn position(&self) -> Option<LonLat> {
        self.meta.point()
    }

    /// `title`, then `name`, then the key itself.
    pub fn name(&self) -> String {
        let props = &self.meta.properties;
        props
            .get("title")
            .and_then(|v| v.as_str())
            .or_else(|| props.get("name").and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| self.key.to_string())
    }
}

/// Ordered intermediate stops between the fixed start and end.
///
/// An intermediate's ordinal is its index in the list, so ordinal order and
/// list order cannot diverge.
#[derive(Debug, Clone, Default)]
pub struct WaypointRegistry {
    intermediates: Vec<u32>,
    next_key: u32,
}

impl WaypointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new intermediate right after ordinal `after`, or first when
    /// `after` is `None`. Later intermediates shift by one.
    pub fn insert_intermediate(&mut self, after: Option<usize>) -> WaypointKey {
        let at = after.map_or(0, |o| o.saturating_add(1));
        self.insert_at(at)
    }

    /// Inserts at ordinal `at`, clamped to the end of the list.
    pub fn insert_at(&mut self, at: usize) -> WaypointKey {
        let key = self.next_key;
        self.next_key += 1;
        let at = at.min(self.intermediates.len());
        self.intermediates.insert(at, key);
        WaypointKey::Intermediate(key)
    }

    /// Returns the removed intermediate's former ordinal.
    pub fn remove_intermediate(&mut self, key: WaypointKey) -> Option<usize> {
        let at = self.ordinal(key)?;
        self.intermediates.remove(at);
        Some(at)
    }

    pub fn ordinal(&self, key: WaypointKey) -> Option<usize> {
        let WaypointKey::Intermediate(k) = key else {
            return None;
        };
        self.intermediates.iter().position(|x| *x == k)
    }

    pub fn key_at(&self, ordinal: usize) -> Option<WaypointKey> {
        self.intermediates.get(ordinal).map(|k| WaypointKey::Intermediate(*k))
    }

    pub fn contains(&self, key: WaypointKey) -> bool {
        match key {
            WaypointKey::Start | WaypointKey::End => true,
            WaypointKey::Intermediate(_) => self.ordinal(key).is_some(),
        }
    }

    pub fn intermediates(&self) -> impl Iterator<Item = WaypointKey> + '_ {
        self.intermediates.iter().map(|k| WaypointKey::Intermediate(*k))
    }

    pub fn intermediate_count(&self) -> usize {
        self.intermediates.len()
    }

    /// `[start, intermediates in ordinal order, end]`.
    pub fn ordered_keys(&self) -> Vec<WaypointKey> {
        let mut keys = Vec::with_capacity(self.intermediates.len() + 2);
        keys.push(WaypointKey::Start);
        keys.extend(self.intermediates());
        keys.push(WaypointKey::End);
        keys
    }

    pub fn clear(&mut self) {
        self.intermediates.clear();
    }
}
