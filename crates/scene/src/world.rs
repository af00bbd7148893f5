use crate::entity::ShapeId;
use crate::point_meta::{Geometry, Properties};
use crate::raw::RawFeature;
use foundation::arena::Arena;
use foundation::math::LonLat;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug)]
struct ShapeEntry {
    raw: RawFeature,
    revision: u64,
    name: Option<String>,
}

/// Owner of every live map shape.
///
/// Each mutation stamps the shape with a fresh revision drawn from a single
/// counter, so `(ShapeId, revision)` never repeats for different contents.
#[derive(Debug, Default)]
pub struct World {
    shapes: Arena<ShapeEntry>,
    names: BTreeMap<String, ShapeId>,
    next_revision: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn spawn(&mut self, raw: impl Into<RawFeature>) -> ShapeId {
        let revision = self.bump();
        ShapeId(self.shapes.alloc(ShapeEntry {
            raw: raw.into(),
            revision,
            name: None,
        }))
    }

    /// Spawns a shape reachable through [`World::find_by_name`].
    ///
    /// A shape already registered under `name` is disposed first.
    pub fn spawn_named(&mut self, name: impl Into<String>, raw: impl Into<RawFeature>) -> ShapeId {
        let name = name.into();
        if let Some(old) = self.names.get(&name).copied() {
            self.dispose(old);
        }
        let revision = self.bump();
        let id = ShapeId(self.shapes.alloc(ShapeEntry {
            raw: raw.into(),
            revision,
            name: Some(name.clone()),
        }));
        self.names.insert(name, id);
        id
    }

    pub fn find_by_name(&self, name: &str) -> Option<ShapeId> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains(id.0)
    }

    pub fn get(&self, id: ShapeId) -> Option<&RawFeature> {
        self.shapes.get(id.0).map(|e| &e.raw)
    }

    pub fn revision(&self, id: ShapeId) -> Option<u64> {
        self.shapes.get(id.0).map(|e| e.revision)
    }

    pub fn dispose(&mut self, id: ShapeId) -> Option<RawFeature> {
        let entry = self.shapes.remove(id.0)?;
        if let Some(name) = &entry.name {
            self.names.remove(name);
        }
        Some(entry.raw)
    }

    pub fn set_properties(&mut self, id: ShapeId, properties: Properties) -> bool {
        self.mutate(id, |raw| *raw.properties_mut() = properties)
    }

    pub fn add_property(&mut self, id: ShapeId, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        self.mutate(id, |raw| {
            raw.properties_mut().insert(key, value);
        })
    }

    pub fn set_coordinates(&mut self, id: ShapeId, position: LonLat) -> bool {
        self.mutate(id, |raw| raw.set_geometry(Geometry::Point(position)))
    }

    pub fn set_geometry(&mut self, id: ShapeId, geometry: Geometry) -> bool {
        self.mutate(id, |raw| raw.set_geometry(geometry))
    }

    pub fn ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.shapes.iter().map(|(h, _)| ShapeId(h))
    }

    fn mutate(&mut self, id: ShapeId, f: impl FnOnce(&mut RawFeature)) -> bool {
        let revision = self.next_revision;
        let Some(entry) = self.shapes.get_mut(id.0) else {
            return false;
        };
        f(&mut entry.raw);
        entry.revision = revision;
        self.next_revision += 1;
        true
    }

    fn bump(&mut self) -> u64 {
        let r = self.next_revision;
        self.next_revision += 1;
        r
    }
}
