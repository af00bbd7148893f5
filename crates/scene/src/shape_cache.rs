use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::ShapeId;
use crate::point_meta::{PointMeta, cluster_id};
use crate::raw::RawFeature;
use crate::world::World;

#[derive(Debug, Clone)]
struct CachedMeta {
    revision: u64,
    meta: Arc<PointMeta>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes [`PointMeta`] per live shape.
///
/// Notes:
/// - Entries are keyed by shape identity, never by shape contents: two shapes
///   with equal geometry and properties get distinct entries.
/// - A hit requires the shape's current world revision; any mutation through
///   [`World`] forces re-normalization on the next `resolve`.
/// - Entries for disposed shapes are dropped by [`ShapeMetadataCache::release`]
///   or [`ShapeMetadataCache::sweep`].
#[derive(Debug, Default)]
pub struct ShapeMetadataCache {
    entries: BTreeMap<ShapeId, CachedMeta>,
    stats: CacheStats,
}

impl ShapeMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure conversion of either raw form to canonical metadata.
    pub fn normalize(raw: &RawFeature) -> PointMeta {
        let geometry = raw.geometry().clone();
        let properties = raw.properties().clone();
        PointMeta {
            id: raw.id().cloned(),
            source: raw.source().map(str::to_string),
            cluster: cluster_id(&properties),
            coordinates: geometry.point(),
            kind: Some(geometry.kind()),
            geometry: Some(geometry),
            properties,
        }
    }

    /// Returns the shared metadata for `id`, normalizing on first use or after
    /// the shape changed. `None` once the shape is gone from `world`.
    pub fn resolve(&mut self, world: &World, id: ShapeId) -> Option<Arc<PointMeta>> {
        let Some(raw) = world.get(id) else {
            self.entries.remove(&id);
            return None;
        };
        let revision = world.revision(id)?;

        if let Some(cached) = self.entries.get(&id)
            && cached.revision == revision
        {
            self.stats.hits += 1;
            return Some(Arc::clone(&cached.meta));
        }

        self.stats.misses += 1;
        let meta = Arc::new(Self::normalize(raw));
        self.entries.insert(
            id,
            CachedMeta {
                revision,
                meta: Arc::clone(&meta),
            },
        );
        Some(meta)
    }

    /// Cached metadata without normalizing; may be stale.
    pub fn peek(&self, id: ShapeId) -> Option<&Arc<PointMeta>> {
        self.entries.get(&id).map(|c| &c.meta)
    }

    pub fn release(&mut self, id: ShapeId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Drops entries whose shapes no longer exist. Returns the number dropped.
    pub fn sweep(&mut self, world: &World) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| world.contains(*id));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::ShapeMetadataCache;
    use crate::point_meta::{FeatureId, Geometry, GeometryKind, Properties};
    use crate::raw::{GeoJsonFeature, RawFeature, VectorShape};
    use crate::world::World;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn props(v: serde_json::Value) -> Properties {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn resolve_returns_same_instance_until_mutated() {
        let mut world = World::new();
        let mut cache = ShapeMetadataCache::new();
        let shape = VectorShape::new(Geometry::Point([1.0, 2.0]), props(json!({"name": "a"})));
        let id = world.spawn(shape);

        let a = cache.resolve(&world, id).unwrap();
        let b = cache.resolve(&world, id).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().hits, 1);

        world.add_property(id, "isVisible", json!(true));
        let c = cache.resolve(&world, id).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.properties["isVisible"], json!(true));
    }

    #[test]
    fn equal_shapes_get_distinct_entries() {
        let mut world = World::new();
        let mut cache = ShapeMetadataCache::new();
        let shape = VectorShape::new(Geometry::Point([1.0, 2.0]), props(json!({"name": "a"})));
        let a = world.spawn(shape.clone());
        let b = world.spawn(shape);

        let ma = cache.resolve(&world, a).unwrap();
        let mb = cache.resolve(&world, b).unwrap();
        assert_eq!(*ma, *mb);
        assert!(!Arc::ptr_eq(&ma, &mb));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn normalize_feature_literal() {
        let raw = RawFeature::from(GeoJsonFeature {
            id: Some(FeatureId::from(4)),
            geometry: Geometry::Point([25.0, 44.0]),
            properties: props(json!({"cluster_id": 9, "point_count": 3})),
            source: Some("search".to_string()),
        });
        let meta = ShapeMetadataCache::normalize(&raw);
        assert_eq!(meta.id, Some(FeatureId::Number(4)));
        assert_eq!(meta.source.as_deref(), Some("search"));
        assert_eq!(meta.cluster, Some(9));
        assert_eq!(meta.kind, Some(GeometryKind::Point));
        assert_eq!(meta.coordinates, Some([25.0, 44.0]));
    }

    #[test]
    fn non_point_shapes_have_no_coordinates() {
        let raw = RawFeature::from(VectorShape::new(
            Geometry::LineString(vec![[0.0, 0.0], [1.0, 1.0]]),
            Properties::new(),
        ));
        let meta = ShapeMetadataCache::normalize(&raw);
        assert_eq!(meta.coordinates, None);
        assert_eq!(meta.cluster, None);
    }

    #[test]
    fn disposed_shapes_are_released() {
        let mut world = World::new();
        let mut cache = ShapeMetadataCache::new();
        let a = world.spawn(VectorShape::new(Geometry::Point([0.0, 0.0]), Properties::new()));
        let b = world.spawn(VectorShape::new(Geometry::Point([1.0, 0.0]), Properties::new()));
        cache.resolve(&world, a);
        cache.resolve(&world, b);

        world.dispose(a);
        assert_eq!(cache.sweep(&world), 1);
        assert!(cache.peek(a).is_none());

        world.dispose(b);
        assert!(cache.resolve(&world, b).is_none());
        assert!(cache.is_empty());
        assert!(!cache.release(b));
    }
}
