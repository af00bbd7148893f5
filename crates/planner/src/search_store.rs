use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::math::LonLat;
use scene::{FeatureId, PointMeta};

use crate::waypoint::WaypointKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Empty,
    Searching,
    Ambiguous,
    Resolved,
}

/// Identifies one issued search. A response is applied only while its ticket
/// is still the newest one for its key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub key: WaypointKey,
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Slot {
    query: String,
    state: SlotState,
    candidates: Vec<Arc<PointMeta>>,
    selected: Option<Arc<PointMeta>>,
    generation: u64,
}

impl Slot {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn candidates(&self) -> &[Arc<PointMeta>] {
        &self.candidates
    }

    pub fn selected(&self) -> Option<&Arc<PointMeta>> {
        self.selected.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryChange {
    Updated,
    /// The query was emptied; `previous` are the dropped candidates.
    Cleared { previous: Vec<Arc<PointMeta>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub state: SlotState,
    /// Candidates replaced by this record; their markers should be removed.
    pub previous: Vec<Arc<PointMeta>>,
    pub selected: Option<Arc<PointMeta>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(RecordOutcome),
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    Selected(Arc<PointMeta>),
    /// The id names an aggregate; its leaves must be recorded first.
    NeedsExpansion(u64),
    /// No candidate matched; the slot has no selection.
    Cleared,
}

/// Per-waypoint query, candidates and selection.
///
/// Invariants:
/// - `selected`, when set, is one of the slot's `candidates`.
/// - A cluster is never selected.
/// - A candidate without a point is never selected.
#[derive(Debug, Default)]
pub struct SearchResultStore {
    slots: BTreeMap<WaypointKey, Slot>,
    next_generation: u64,
}

impl SearchResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, key: WaypointKey) -> Option<&Slot> {
        self.slots.get(&key)
    }

    pub fn state(&self, key: WaypointKey) -> SlotState {
        self.slots.get(&key).map_or(SlotState::Empty, |s| s.state)
    }

    pub fn is_resolved(&self, key: WaypointKey) -> bool {
        self.state(key) == SlotState::Resolved
    }

    pub fn selected(&self, key: WaypointKey) -> Option<&Arc<PointMeta>> {
        self.slots.get(&key).and_then(|s| s.selected.as_ref())
    }

    pub fn candidates(&self, key: WaypointKey) -> &[Arc<PointMeta>] {
        self.slots.get(&key).map_or(&[], |s| s.candidates.as_slice())
    }

    /// Records the query text. Empty text resets the slot and invalidates any
    /// search still in flight for it.
    pub fn set_query(&mut self, key: WaypointKey, text: &str) -> QueryChange {
        if text.trim().is_empty() {
            let generation = self.bump();
            let slot = self.slots.entry(key).or_default();
            let previous = std::mem::take(&mut slot.candidates);
            *slot = Slot {
                generation,
                ..Slot::default()
            };
            return QueryChange::Cleared { previous };
        }
        self.slots.entry(key).or_default().query = text.to_string();
        QueryChange::Updated
    }

    pub fn begin_search(&mut self, key: WaypointKey) -> SearchTicket {
        let generation = self.bump();
        let slot = self.slots.entry(key).or_default();
        slot.generation = generation;
        slot.state = SlotState::Searching;
        SearchTicket { key, generation }
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.slots
            .get(&ticket.key)
            .is_some_and(|s| s.generation == ticket.generation && s.state == SlotState::Searching)
    }

    /// Applies a search response unless a newer search, a cleared query or a
    /// removed waypoint superseded it.
    pub fn apply_results(
        &mut self,
        ticket: SearchTicket,
        candidates: Vec<Arc<PointMeta>>,
    ) -> ApplyOutcome {
        if !self.is_current(ticket) {
            return ApplyOutcome::Stale;
        }
        ApplyOutcome::Applied(self.record_results(ticket.key, candidates))
    }

    /// Ends a failed search. Previous candidates stay; the slot leaves
    /// `Searching`. Returns `false` for a stale ticket.
    pub fn fail_search(&mut self, ticket: SearchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if let Some(slot) = self.slots.get_mut(&ticket.key) {
            slot.state = if slot.selected.is_some() {
                SlotState::Resolved
            } else {
                SlotState::Ambiguous
            };
        }
        true
    }

    /// Replaces the candidates for `key`. A single non-cluster candidate with
    /// a point is selected; anything else leaves the slot ambiguous.
    pub fn record_results(
        &mut self,
        key: WaypointKey,
        candidates: Vec<Arc<PointMeta>>,
    ) -> RecordOutcome {
        let generation = self.bump();
        let slot = self.slots.entry(key).or_default();
        slot.generation = generation;
        let previous = std::mem::replace(&mut slot.candidates, candidates);

        slot.selected = match slot.candidates.as_slice() {
            [only] if selectable(only) => Some(Arc::clone(only)),
            _ => None,
        };
        slot.state = if slot.selected.is_some() {
            SlotState::Resolved
        } else {
            SlotState::Ambiguous
        };
        RecordOutcome {
            state: slot.state,
            previous,
            selected: slot.selected.clone(),
        }
    }

    pub fn select_candidate(&mut self, key: WaypointKey, id: &FeatureId) -> SelectOutcome {
        let Some(slot) = self.slots.get_mut(&key) else {
            return SelectOutcome::Cleared;
        };
        let found = slot
            .candidates
            .iter()
            .find(|c| c.id.as_ref().is_some_and(|cid| cid.matches(id)))
            .cloned();

        match found {
            Some(meta) if meta.is_cluster() => {
                slot.selected = None;
                slot.state = SlotState::Ambiguous;
                SelectOutcome::NeedsExpansion(meta.cluster.unwrap_or_default())
            }
            Some(meta) if selectable(&meta) => {
                slot.selected = Some(Arc::clone(&meta));
                slot.state = SlotState::Resolved;
                SelectOutcome::Selected(meta)
            }
            _ => {
                slot.selected = None;
                if slot.state == SlotState::Resolved {
                    slot.state = SlotState::Ambiguous;
                }
                SelectOutcome::Cleared
            }
        }
    }

    pub fn remove(&mut self, key: WaypointKey) -> Option<Slot> {
        self.slots.remove(&key)
    }

    pub fn clear(&mut self) -> Vec<Arc<PointMeta>> {
        let slots = std::mem::take(&mut self.slots);
        slots.into_values().flat_map(|s| s.candidates).collect()
    }

    /// Every candidate position across all slots.
    pub fn known_points(&self) -> Vec<LonLat> {
        self.slots
            .values()
            .flat_map(|s| s.candidates.iter())
            .filter_map(|c| c.point())
            .collect()
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

fn selectable(meta: &PointMeta) -> bool {
    !meta.is_cluster() && meta.point().is_some()
}

#[cfg(test)]
mod tests {
    use super::{ApplyOutcome, QueryChange, SearchResultStore, SelectOutcome, SlotState};
    use crate::waypoint::WaypointKey;
    use scene::{FeatureId, Geometry, GeometryKind, PointMeta, Properties};
    use serde_json::json;
    use std::sync::Arc;

    fn point(id: i64, x: f64) -> Arc<PointMeta> {
        Arc::new(PointMeta {
            id: Some(FeatureId::Number(id)),
            source: None,
            properties: Properties::new(),
            geometry: Some(Geometry::Point([x, 44.0])),
            coordinates: Some([x, 44.0]),
            cluster: None,
            kind: Some(GeometryKind::Point),
        })
    }

    fn cluster(id: i64, cluster_id: u64) -> Arc<PointMeta> {
        let mut meta = (*point(id, 0.0)).clone();
        meta.properties.insert("cluster_id".into(), json!(cluster_id));
        meta.cluster = Some(cluster_id);
        Arc::new(meta)
    }

    fn unplaced(id: i64) -> Arc<PointMeta> {
        let mut meta = (*point(id, 0.0)).clone();
        meta.geometry = None;
        meta.coordinates = None;
        meta.kind = None;
        Arc::new(meta)
    }

    #[test]
    fn single_result_resolves_the_slot() {
        let mut store = SearchResultStore::new();
        store.set_query(WaypointKey::Start, "Bucuresti");
        let ticket = store.begin_search(WaypointKey::Start);
        assert_eq!(store.state(WaypointKey::Start), SlotState::Searching);

        let outcome = store.apply_results(ticket, vec![point(1, 25.0)]);
        let ApplyOutcome::Applied(outcome) = outcome else {
            panic!("expected applied");
        };
        assert_eq!(outcome.state, SlotState::Resolved);
        assert!(store.is_resolved(WaypointKey::Start));
        assert_eq!(store.slot(WaypointKey::Start).unwrap().query(), "Bucuresti");
    }

    #[test]
    fn several_results_are_ambiguous_until_picked() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::End;
        store.record_results(key, vec![point(1, 25.0), point(2, 26.0)]);
        assert_eq!(store.state(key), SlotState::Ambiguous);
        assert!(store.selected(key).is_none());

        let picked = store.select_candidate(key, &FeatureId::from("2"));
        assert!(matches!(
            picked,
            SelectOutcome::Selected(ref m) if m.coordinates == Some([26.0, 44.0])
        ));
        assert!(store.is_resolved(key));

        assert_eq!(store.select_candidate(key, &FeatureId::from(99)), SelectOutcome::Cleared);
        assert!(store.selected(key).is_none());
        assert_eq!(store.state(key), SlotState::Ambiguous);
    }

    #[test]
    fn clusters_need_expansion() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::Start;
        let outcome = store.record_results(key, vec![cluster(5, 77)]);
        assert_eq!(outcome.state, SlotState::Ambiguous);
        assert_eq!(
            store.select_candidate(key, &FeatureId::from(5)),
            SelectOutcome::NeedsExpansion(77)
        );
        assert!(store.selected(key).is_none());

        store.record_results(key, vec![point(6, 25.5)]);
        assert!(store.is_resolved(key));
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::Start;
        store.set_query(key, "a");
        let first = store.begin_search(key);
        store.set_query(key, "ab");
        let second = store.begin_search(key);

        assert_eq!(store.apply_results(first, vec![point(1, 25.0)]), ApplyOutcome::Stale);
        assert!(matches!(
            store.apply_results(second, vec![point(2, 26.0)]),
            ApplyOutcome::Applied(_)
        ));
        assert_eq!(store.apply_results(second, vec![]), ApplyOutcome::Stale);
    }

    #[test]
    fn responses_land_on_their_own_key() {
        let mut store = SearchResultStore::new();
        let start = store.begin_search(WaypointKey::Start);
        let end = store.begin_search(WaypointKey::End);
        store.apply_results(end, vec![point(2, 26.0)]);
        store.apply_results(start, vec![point(1, 25.0)]);
        assert_eq!(store.selected(WaypointKey::Start).unwrap().coordinates, Some([25.0, 44.0]));
        assert_eq!(store.selected(WaypointKey::End).unwrap().coordinates, Some([26.0, 44.0]));
    }

    #[test]
    fn clearing_the_query_empties_the_slot_and_invalidates_search() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::Intermediate(0);
        store.record_results(key, vec![point(1, 25.0)]);
        let ticket = store.begin_search(key);

        let QueryChange::Cleared { previous } = store.set_query(key, "  ") else {
            panic!("expected cleared");
        };
        assert_eq!(previous.len(), 1);
        assert_eq!(store.state(key), SlotState::Empty);
        assert!(store.candidates(key).is_empty());
        assert_eq!(store.apply_results(ticket, vec![point(3, 1.0)]), ApplyOutcome::Stale);
        assert!(!store.fail_search(ticket));
    }

    #[test]
    fn failed_search_keeps_previous_candidates() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::End;
        store.record_results(key, vec![point(1, 25.0), point(2, 26.0)]);
        let ticket = store.begin_search(key);
        assert!(store.fail_search(ticket));
        assert_eq!(store.state(key), SlotState::Ambiguous);
        assert_eq!(store.known_points().len(), 2);
    }

    #[test]
    fn candidates_without_a_point_are_never_selected() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::Start;
        let outcome = store.record_results(key, vec![unplaced(4)]);
        assert_eq!(outcome.state, SlotState::Ambiguous);
        assert!(outcome.selected.is_none());

        store.record_results(key, vec![point(1, 25.0), unplaced(4)]);
        store.select_candidate(key, &FeatureId::from(1));
        assert!(store.is_resolved(key));
        assert_eq!(store.select_candidate(key, &FeatureId::from(4)), SelectOutcome::Cleared);
        assert!(store.selected(key).is_none());
        assert_eq!(store.state(key), SlotState::Ambiguous);
    }

    #[test]
    fn editing_the_query_keeps_the_search_in_flight() {
        let mut store = SearchResultStore::new();
        let key = WaypointKey::End;
        let ticket = store.begin_search(key);
        assert_eq!(store.set_query(key, "Brasov"), QueryChange::Updated);
        assert!(store.is_current(ticket));
        assert!(matches!(
            store.apply_results(ticket, vec![point(2, 25.6)]),
            ApplyOutcome::Applied(_)
        ));
        assert_eq!(store.slot(key).unwrap().query(), "Brasov");
    }
}
