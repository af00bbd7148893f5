use std::sync::Arc;

use crate::entity::ShapeId;
use crate::point_meta::PointMeta;
use crate::shape_cache::ShapeMetadataCache;
use crate::world::World;

/// Shapes currently selected on the map (clicked markers, cluster leaves).
///
/// Ordering contract:
/// - Iteration yields shapes in insertion order; duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    shapes: Vec<ShapeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains(&id)
    }

    /// Returns `true` if the selection changed.
    pub fn insert(&mut self, id: ShapeId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.shapes.push(id);
        true
    }

    pub fn remove(&mut self, id: ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| *s != id);
        before != self.shapes.len()
    }

    pub fn replace(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        self.shapes.clear();
        for id in ids {
            self.insert(id);
        }
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.shapes.iter().copied()
    }

    /// Metadata for every selected shape still alive, in selection order.
    pub fn resolve_all(
        &self,
        world: &World,
        cache: &mut ShapeMetadataCache,
    ) -> Vec<Arc<PointMeta>> {
        self.shapes
            .iter()
            .filter_map(|id| cache.resolve(world, *id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Selection;
    use crate::point_meta::{Geometry, Properties};
    use crate::raw::VectorShape;
    use crate::shape_cache::ShapeMetadataCache;
    use crate::world::World;

    #[test]
    fn keeps_insertion_order_without_duplicates() {
        let mut world = World::new();
        let a = world.spawn(VectorShape::new(Geometry::Point([0.0, 0.0]), Properties::new()));
        let b = world.spawn(VectorShape::new(Geometry::Point([1.0, 0.0]), Properties::new()));

        let mut s = Selection::new();
        assert!(s.insert(b));
        assert!(s.insert(a));
        assert!(!s.insert(b));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![b, a]);

        assert!(s.remove(b));
        assert!(!s.remove(b));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn resolve_all_skips_disposed_shapes() {
        let mut world = World::new();
        let mut cache = ShapeMetadataCache::new();
        let a = world.spawn(VectorShape::new(Geometry::Point([0.0, 0.0]), Properties::new()));
        let b = world.spawn(VectorShape::new(Geometry::Point([1.0, 0.0]), Properties::new()));

        let mut s = Selection::new();
        s.replace([a, b]);
        world.dispose(a);
        let metas = s.resolve_all(&world, &mut cache);
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].coordinates, Some([1.0, 0.0]));
    }
}
