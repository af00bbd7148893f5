use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::bounds::Aabb2;
use foundation::math::LonLat;
use runtime::{EventBus, Metrics};
use scene::{
    GeoJsonFeature, Geometry, PointMeta, Properties, RawFeature, Selection, ShapeId,
    ShapeMetadataCache, VectorShape, World,
};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{BoxFuture, RoutingBackend, SearchBackend};
use crate::config::PlannerConfig;
use crate::coordinator::RouteCoordinator;
use crate::details::RouteDetails;
use crate::error::PlannerError;
use crate::events::{CameraCommand, PlaceholderUpdate, PlannerEvent, ResultSet};
use crate::locations::{LocationGeo, location_features};
use crate::route::Route;
use crate::search_store::{
    ApplyOutcome, QueryChange, RecordOutcome, SearchResultStore, SearchTicket, SelectOutcome,
    SlotState,
};
use crate::state::{RoutePublisher, SharedState};
use crate::waypoint::{Waypoint, WaypointKey, WaypointRegistry};

pub const ROUTE_SHAPE: &str = "route";
pub const CLUSTER_PROMPT: &str = "Select a value from cluster";

const SEARCH_SOURCE: &str = "search";
const ROUTE_SOURCE: &str = "route";
const STORE_SOURCE: &str = "stores";

pub const STALE_DISCARDED: &str = "search.stale_discarded";

/// An address search that has been issued but not applied yet.
///
/// `request` owns everything it needs, so it can be awaited while the planner
/// keeps handling input; hand its output to [`RoutePlanner::complete_search`].
pub struct PendingSearch {
    pub ticket: SearchTicket,
    pub request: BoxFuture<'static, Result<Vec<GeoJsonFeature>, PlannerError>>,
}

fn placeholder_name(key: WaypointKey) -> String {
    format!("id-{key}")
}

/// Multi-stop route planning session.
///
/// Owns the shape world, the metadata cache, waypoints and their result slots.
/// Changes the rendering surface must apply are queued as [`PlannerEvent`]s.
pub struct RoutePlanner {
    config: Arc<PlannerConfig>,
    world: World,
    cache: ShapeMetadataCache,
    registry: WaypointRegistry,
    results: SearchResultStore,
    displayed: BTreeMap<ResultSet, Vec<ShapeId>>,
    selection: Selection,
    coordinator: RouteCoordinator,
    state: SharedState,
    events: EventBus<PlannerEvent>,
    metrics: Metrics,
    camera_center: LonLat,
}

impl RoutePlanner {
    pub fn new(
        config: PlannerConfig,
        routing: Arc<dyn RoutingBackend>,
        search: Arc<dyn SearchBackend>,
        state: SharedState,
        publisher: RoutePublisher,
    ) -> Self {
        let config = Arc::new(config);
        let coordinator =
            RouteCoordinator::new(routing, search, Arc::clone(&config), state.clone(), publisher);
        let mut planner = Self {
            camera_center: config.default_center,
            config,
            world: World::new(),
            cache: ShapeMetadataCache::new(),
            registry: WaypointRegistry::new(),
            results: SearchResultStore::new(),
            displayed: BTreeMap::new(),
            selection: Selection::new(),
            coordinator,
            state,
            events: EventBus::new(),
            metrics: Metrics::new(),
        };
        planner.ensure_placeholder(WaypointKey::Start);
        planner.ensure_placeholder(WaypointKey::End);
        planner
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn registry(&self) -> &WaypointRegistry {
        &self.registry
    }

    pub fn results(&self) -> &SearchResultStore {
        &self.results
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Spawns a shape owned by the map (e.g. a clicked marker).
    pub fn spawn_shape(&mut self, raw: impl Into<RawFeature>) -> ShapeId {
        self.world.spawn(raw)
    }

    pub fn resolve(&mut self, id: ShapeId) -> Option<Arc<PointMeta>> {
        self.cache.resolve(&self.world, id)
    }

    pub fn slot_state(&self, key: WaypointKey) -> SlotState {
        self.results.state(key)
    }

    pub fn set_camera_center(&mut self, center: LonLat) {
        self.camera_center = center;
    }

    pub fn drain_events(&mut self) -> Vec<PlannerEvent> {
        self.events.drain_payloads()
    }

    // --- waypoints -------------------------------------------------------

    pub fn insert_intermediate(&mut self, after: Option<usize>) -> WaypointKey {
        let key = self.registry.insert_intermediate(after);
        self.ensure_placeholder(key);
        key
    }

    /// Removes an intermediate with its slot, result markers and placeholder.
    pub fn remove_intermediate(&mut self, key: WaypointKey) -> bool {
        if self.registry.remove_intermediate(key).is_none() {
            return false;
        }
        self.results.remove(key);
        self.clear_displayed(ResultSet::Waypoint(key));
        self.remove_placeholder(key);
        true
    }

    /// True once both endpoints are resolved. Intermediates never block.
    pub fn can_route(&self) -> bool {
        self.results.is_resolved(WaypointKey::Start) && self.results.is_resolved(WaypointKey::End)
    }

    /// `[start, resolved intermediates in order, end]`, read back from the
    /// placeholders.
    pub fn ordered_waypoints(&mut self) -> Result<Vec<Waypoint>, PlannerError> {
        for key in [WaypointKey::Start, WaypointKey::End] {
            if !self.results.is_resolved(key) {
                return Err(PlannerError::IncompleteRoute { missing: key });
            }
        }
        let mut out = Vec::with_capacity(self.registry.intermediate_count() + 2);
        for key in self.registry.ordered_keys() {
            if matches!(key, WaypointKey::Intermediate(_)) && !self.results.is_resolved(key) {
                continue;
            }
            let meta = self
                .world
                .find_by_name(&placeholder_name(key))
                .and_then(|id| self.cache.resolve(&self.world, id))
                .ok_or(PlannerError::IncompleteRoute { missing: key })?;
            out.push(Waypoint { key, meta });
        }
        Ok(out)
    }

    // --- search ----------------------------------------------------------

    /// Records query text for a known waypoint. Clearing it drops the slot's
    /// results and hides the placeholder unless a route is shown.
    pub fn set_query(&mut self, key: WaypointKey, text: &str) {
        if !self.registry.contains(key) {
            debug!(%key, "query for unknown waypoint ignored");
            return;
        }
        if let QueryChange::Cleared { .. } = self.results.set_query(key, text) {
            self.clear_displayed(ResultSet::Waypoint(key));
            if self.state.current_route().is_none() {
                self.hide_placeholder(key);
            }
        }
    }

    /// Issues an address search for the slot's query, biased to the live
    /// location or else the camera center. `None` for an empty query or an
    /// unknown waypoint.
    pub fn begin_search(&mut self, key: WaypointKey) -> Option<PendingSearch> {
        if !self.registry.contains(key) {
            return None;
        }
        let query = self
            .results
            .slot(key)
            .map(|s| s.query().trim().to_string())
            .filter(|q| !q.is_empty())?;
        let ticket = self.results.begin_search(key);
        let bias = self.state.current_location().unwrap_or(self.camera_center);
        let client = self.coordinator.search().clone();
        debug!(%key, generation = ticket.generation, "search dispatched");
        Some(PendingSearch {
            ticket,
            request: Box::pin(async move { client.search_address(query, bias).await }),
        })
    }

    /// Applies a search response to the slot it was issued for. Responses
    /// superseded in the meantime are dropped and counted.
    pub fn complete_search(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<GeoJsonFeature>, PlannerError>,
    ) -> Option<RecordOutcome> {
        let set = ResultSet::Waypoint(ticket.key);
        let features = match result {
            Ok(features) => features,
            Err(err) => {
                if !self.results.fail_search(ticket) {
                    self.discard_stale(ticket.key);
                    return None;
                }
                self.events.emit(PlannerEvent::SearchFailed {
                    set,
                    retryable: err.is_retryable(),
                    message: err.to_string(),
                });
                return None;
            }
        };

        let (ids, metas) = self.spawn_features(features, SEARCH_SOURCE);
        match self.results.apply_results(ticket, metas.clone()) {
            ApplyOutcome::Stale => {
                self.dispose_all(&ids);
                self.discard_stale(ticket.key);
                None
            }
            ApplyOutcome::Applied(outcome) => {
                self.replace_displayed(set, ids, metas);
                self.after_record(ticket.key, &outcome);
                self.fit_results();
                Some(outcome)
            }
        }
    }

    pub async fn search_address(&mut self, key: WaypointKey) -> Option<RecordOutcome> {
        let pending = self.begin_search(key)?;
        let result = pending.request.await;
        self.complete_search(pending.ticket, result)
    }

    /// Category search around `center` whose hits become the slot's candidates.
    pub async fn search_poi(&mut self, key: WaypointKey, center: LonLat) -> Option<RecordOutcome> {
        if !self.registry.contains(key) {
            return None;
        }
        let text = format!("{},{}", center[0], center[1]);
        self.results.set_query(key, &text);
        self.events.emit(PlannerEvent::QueryText { key, text });
        let ticket = self.results.begin_search(key);
        let result = self.coordinator.search().search_poi(center).await;
        self.complete_search(ticket, result)
    }

    pub fn select_candidate(&mut self, key: WaypointKey, id: &scene::FeatureId) -> SelectOutcome {
        let outcome = self.results.select_candidate(key, id);
        match &outcome {
            SelectOutcome::Selected(meta) => {
                let meta = Arc::clone(meta);
                self.write_selection(key, &meta);
            }
            SelectOutcome::NeedsExpansion(cluster) => {
                debug!(%key, cluster, "cluster selected, expansion required");
            }
            SelectOutcome::Cleared => self.hide_placeholder(key),
        }
        outcome
    }

    /// Replaces a cluster candidate with its leaves (at most
    /// `cluster_leaf_limit`).
    pub fn expand_cluster(
        &mut self,
        key: WaypointKey,
        mut leaves: Vec<GeoJsonFeature>,
    ) -> RecordOutcome {
        leaves.truncate(self.config.cluster_leaf_limit);
        let (ids, metas) = self.spawn_features(leaves, SEARCH_SOURCE);
        let outcome = self.results.record_results(key, metas.clone());
        self.replace_displayed(ResultSet::Waypoint(key), ids, metas);
        if outcome.state == SlotState::Ambiguous {
            self.events.emit(PlannerEvent::QueryText {
                key,
                text: CLUSTER_PROMPT.to_string(),
            });
        }
        self.after_record(key, &outcome);
        outcome
    }

    pub fn set_map_selection(&mut self, shapes: impl IntoIterator<Item = ShapeId>) {
        self.selection.replace(shapes);
    }

    pub fn map_selection(&self) -> &Selection {
        &self.selection
    }

    /// Writes the shapes picked on the map into `key`'s slot. One shape
    /// resolves it; several leave it ambiguous with a prompt.
    pub fn add_position(&mut self, key: WaypointKey) -> Option<RecordOutcome> {
        if !self.registry.contains(key) {
            return None;
        }
        let metas = self.selection.resolve_all(&self.world, &mut self.cache);
        self.selection.clear();
        if metas.is_empty() {
            return None;
        }

        let text = match metas.as_slice() {
            [only] => only
                .properties
                .get("name")
                .or_else(|| only.properties.get("title"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => CLUSTER_PROMPT.to_string(),
        };
        if !text.is_empty() {
            self.results.set_query(key, &text);
            self.events.emit(PlannerEvent::QueryText { key, text });
        }
        self.clear_displayed(ResultSet::Waypoint(key));
        let outcome = self.results.record_results(key, metas);
        self.after_record(key, &outcome);
        Some(outcome)
    }

    pub fn add_selected_shapes(
        &mut self,
        key: WaypointKey,
        shapes: &[ShapeId],
    ) -> Option<RecordOutcome> {
        self.set_map_selection(shapes.iter().copied());
        self.add_position(key)
    }

    /// Address features at `position`, normalized for a popup.
    pub async fn reverse_geocode(
        &mut self,
        position: LonLat,
    ) -> Result<Vec<Arc<PointMeta>>, PlannerError> {
        let features = self.coordinator.search().reverse_geocode(position).await?;
        Ok(features
            .into_iter()
            .map(|f| Arc::new(ShapeMetadataCache::normalize(&RawFeature::from(f))))
            .collect())
    }

    pub fn show_store_locations(&mut self, locations: &[LocationGeo]) -> usize {
        let (ids, metas) = self.spawn_features(location_features(locations), STORE_SOURCE);
        let count = ids.len();
        self.replace_displayed(ResultSet::StoreLocations, ids, metas);
        count
    }

    // --- routing ---------------------------------------------------------

    /// Routes through the ordered waypoints with the current vehicle. On
    /// failure the previous route and its shape stay in place.
    pub async fn compute_route(&mut self) -> Result<Arc<Route>, PlannerError> {
        let waypoints = self.ordered_waypoints()?;
        let vehicle = self.state.current_vehicle();
        let started = Instant::now();
        let route = match self.coordinator.compute_route(&waypoints, vehicle.as_ref()).await {
            Ok(route) => route,
            Err(err) => {
                self.metrics.incr("route.failed");
                return Err(err);
            }
        };
        self.metrics.record_latency("route.compute", started.elapsed());

        self.draw_route(&route);
        self.events.emit(PlannerEvent::RouteReplaced(Arc::clone(&route)));
        if let Some(bounds) = route.bounds() {
            self.events.emit(PlannerEvent::Camera(CameraCommand::FitBounds {
                bounds,
                padding: self.config.route_padding,
                max_zoom: None,
            }));
        }
        Ok(route)
    }

    pub fn route_details(&self) -> Option<RouteDetails> {
        self.state.current_route().map(|r| RouteDetails::from_route(&r))
    }

    /// Route details when `id` is the drawn route.
    pub fn details_for(&mut self, id: ShapeId) -> Option<RouteDetails> {
        let meta = self.cache.resolve(&self.world, id)?;
        if !meta.is_route_summary() {
            return None;
        }
        self.route_details()
    }

    /// Category search along the current route. Failures yield an empty list
    /// and a `SearchFailed` event.
    pub async fn search_along_route(&mut self) -> Vec<Arc<PointMeta>> {
        let Some(route) = self.state.current_route() else {
            return Vec::new();
        };
        let result = self
            .coordinator
            .search_along_route(
                &route,
                &self.config.along_route_category,
                self.config.along_route_radius_m,
                self.config.sample_count,
            )
            .await;
        match result {
            Ok(features) if features.is_empty() => Vec::new(),
            Ok(features) => {
                let (ids, metas) = self.spawn_features(features, ROUTE_SOURCE);
                self.replace_displayed(ResultSet::AlongRoute, ids, metas.clone());
                metas
            }
            Err(err) => {
                self.events.emit(PlannerEvent::SearchFailed {
                    set: ResultSet::AlongRoute,
                    retryable: err.is_retryable(),
                    message: err.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Drops every result, intermediate, placeholder and the current route.
    pub fn clear_search(&mut self) {
        let sets: Vec<ResultSet> = self.displayed.keys().copied().collect();
        for set in sets {
            self.clear_displayed(set);
        }
        self.results.clear();
        self.selection.clear();

        let intermediates: Vec<WaypointKey> = self.registry.intermediates().collect();
        for key in intermediates {
            self.remove_placeholder(key);
        }
        self.registry.clear();
        for key in [WaypointKey::Start, WaypointKey::End] {
            self.remove_placeholder(key);
            self.ensure_placeholder(key);
        }

        if let Some(id) = self.world.find_by_name(ROUTE_SHAPE) {
            self.world.dispose(id);
        }
        let swept = self.cache.sweep(&self.world);
        self.coordinator.clear_route();
        self.events.emit(PlannerEvent::RouteCleared);
        info!(swept, "search cleared");
    }

    /// The surface disposed `id`; forget everything derived from it.
    pub fn dispose_shape(&mut self, id: ShapeId) -> bool {
        let existed = self.world.dispose(id).is_some();
        self.cache.release(id);
        self.selection.remove(id);
        for ids in self.displayed.values_mut() {
            ids.retain(|x| *x != id);
        }
        existed
    }

    // --- internals -------------------------------------------------------

    fn ensure_placeholder(&mut self, key: WaypointKey) -> ShapeId {
        let name = placeholder_name(key);
        if let Some(id) = self.world.find_by_name(&name) {
            return id;
        }
        let mut properties = Properties::new();
        properties.insert("isVisible".into(), json!(false));
        properties.insert("name".into(), json!(key.to_string()));
        let shape = VectorShape::new(Geometry::Point([0.0, 0.0]), properties).with_id(name.clone());
        let id = self.world.spawn_named(name, shape);
        self.events
            .emit(PlannerEvent::Placeholder(PlaceholderUpdate::Add { key, shape: id }));
        id
    }

    fn remove_placeholder(&mut self, key: WaypointKey) {
        if let Some(id) = self.world.find_by_name(&placeholder_name(key)) {
            self.world.dispose(id);
            self.cache.release(id);
            self.events
                .emit(PlannerEvent::Placeholder(PlaceholderUpdate::Remove { key }));
        }
    }

    fn hide_placeholder(&mut self, key: WaypointKey) {
        if let Some(id) = self.world.find_by_name(&placeholder_name(key)) {
            self.world.add_property(id, "isVisible", json!(false));
            self.events.emit(PlannerEvent::Placeholder(PlaceholderUpdate::SetVisible {
                key,
                visible: false,
            }));
        }
    }

    /// Copies the selected point into the key's placeholder and shows it.
    /// Without a point the placeholder is left as it was.
    fn write_selection(&mut self, key: WaypointKey, meta: &PointMeta) {
        let Some(position) = meta.point() else {
            warn!(%key, "selection has no point, placeholder unchanged");
            return;
        };
        let id = self.ensure_placeholder(key);
        let mut properties = meta.properties.clone();
        properties.insert("isVisible".into(), json!(true));
        self.world.set_properties(id, properties);
        self.events.emit(PlannerEvent::Placeholder(PlaceholderUpdate::SetVisible {
            key,
            visible: true,
        }));
        self.world.set_coordinates(id, position);
        self.events.emit(PlannerEvent::Placeholder(
            PlaceholderUpdate::SetCoordinates { key, position },
        ));
    }

    fn after_record(&mut self, key: WaypointKey, outcome: &RecordOutcome) {
        if let Some(selected) = &outcome.selected {
            self.write_selection(key, selected);
        }
    }

    fn spawn_features(
        &mut self,
        features: Vec<GeoJsonFeature>,
        source: &str,
    ) -> (Vec<ShapeId>, Vec<Arc<PointMeta>>) {
        let mut ids = Vec::with_capacity(features.len());
        let mut metas = Vec::with_capacity(features.len());
        for mut feature in features {
            if feature.source.is_none() {
                feature.source = Some(source.to_string());
            }
            let id = self.world.spawn(feature);
            if let Some(meta) = self.cache.resolve(&self.world, id) {
                metas.push(meta);
            }
            ids.push(id);
        }
        (ids, metas)
    }

    fn replace_displayed(&mut self, set: ResultSet, ids: Vec<ShapeId>, metas: Vec<Arc<PointMeta>>) {
        self.clear_displayed(set);
        self.displayed.insert(set, ids);
        self.events
            .emit(PlannerEvent::ShowFeatures { set, features: metas });
    }

    fn clear_displayed(&mut self, set: ResultSet) {
        if let Some(ids) = self.displayed.remove(&set) {
            self.dispose_all(&ids);
            self.events
                .emit(PlannerEvent::RemoveFeatures { set, shapes: ids });
        }
    }

    fn dispose_all(&mut self, ids: &[ShapeId]) {
        for id in ids {
            self.world.dispose(*id);
            self.cache.release(*id);
        }
    }

    fn discard_stale(&mut self, key: WaypointKey) {
        self.metrics.incr(STALE_DISCARDED);
        debug!(%key, "stale search response discarded");
        self.events
            .emit(PlannerEvent::StaleResponseDiscarded { key });
    }

    /// Fits the camera to all displayed search results once more than one
    /// point is known.
    fn fit_results(&mut self) {
        let mut points = Vec::new();
        for (set, ids) in &self.displayed {
            if *set == ResultSet::StoreLocations {
                continue;
            }
            for id in ids {
                if let Some(p) = self.cache.resolve(&self.world, *id).and_then(|m| m.point()) {
                    points.push(p);
                }
            }
        }
        if points.len() < 2 {
            return;
        }
        if let Some(bounds) = Aabb2::from_points(points) {
            self.events.emit(PlannerEvent::Camera(CameraCommand::FitBounds {
                bounds,
                padding: self.config.results_padding,
                max_zoom: Some(self.config.results_max_zoom),
            }));
        }
    }

    fn draw_route(&mut self, route: &Route) {
        let lines: Vec<Vec<LonLat>> = route.legs.iter().map(|l| l.points.clone()).collect();
        let mut properties = Properties::new();
        properties.insert("isVisible".into(), json!(true));
        if let Ok(summary) = serde_json::to_value(&route.summary) {
            properties.insert("summary".into(), summary);
        }
        properties.insert("names".into(), json!(route.waypoint_names));
        let shape = VectorShape::new(Geometry::MultiLineString(lines), properties)
            .with_source(ROUTE_SOURCE);
        self.world.spawn_named(ROUTE_SHAPE, shape);
    }
}
