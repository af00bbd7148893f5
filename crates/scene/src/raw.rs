use crate::point_meta::{FeatureId, Geometry, GeometryKind, Properties};
use foundation::math::LonLat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutable shape kept by a rendering surface, exposed through accessors.
///
/// Waypoint placeholders and drawn routes are held in this form.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorShape {
    id: Option<FeatureId>,
    source: Option<String>,
    geometry: Geometry,
    properties: Properties,
}

impl VectorShape {
    pub fn new(geometry: Geometry, properties: Properties) -> Self {
        Self {
            id: None,
            source: None,
            geometry,
            properties,
        }
    }

    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn id(&self) -> Option<&FeatureId> {
        self.id.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn shape_type(&self) -> GeometryKind {
        self.geometry.kind()
    }

    /// Point position; `None` for every other geometry.
    pub fn coordinates(&self) -> Option<LonLat> {
        self.geometry.point()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: Properties) {
        self.properties = properties;
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn set_coordinates(&mut self, position: LonLat) {
        self.geometry = Geometry::Point(position);
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }
}

/// GeoJSON feature literal as returned by search backends and cluster expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl GeoJsonFeature {
    pub fn point(position: LonLat, properties: Properties) -> Self {
        Self {
            id: None,
            geometry: Geometry::Point(position),
            properties,
            source: None,
        }
    }
}

/// Either raw form a shape can take before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFeature {
    Shape(VectorShape),
    Feature(GeoJsonFeature),
}

impl RawFeature {
    pub fn properties(&self) -> &Properties {
        match self {
            RawFeature::Shape(s) => s.properties(),
            RawFeature::Feature(f) => &f.properties,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        match self {
            RawFeature::Shape(s) => s.geometry(),
            RawFeature::Feature(f) => &f.geometry,
        }
    }

    pub fn id(&self) -> Option<&FeatureId> {
        match self {
            RawFeature::Shape(s) => s.id(),
            RawFeature::Feature(f) => f.id.as_ref(),
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            RawFeature::Shape(s) => s.source(),
            RawFeature::Feature(f) => f.source.as_deref(),
        }
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Properties {
        match self {
            RawFeature::Shape(s) => &mut s.properties,
            RawFeature::Feature(f) => &mut f.properties,
        }
    }

    pub(crate) fn set_geometry(&mut self, geometry: Geometry) {
        match self {
            RawFeature::Shape(s) => s.geometry = geometry,
            RawFeature::Feature(f) => f.geometry = geometry,
        }
    }
}

impl From<VectorShape> for RawFeature {
    fn from(v: VectorShape) -> Self {
        RawFeature::Shape(v)
    }
}

impl From<GeoJsonFeature> for RawFeature {
    fn from(v: GeoJsonFeature) -> Self {
        RawFeature::Feature(v)
    }
}
