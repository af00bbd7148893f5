use foundation::bounds::Aabb2;
use foundation::math::LonLat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open attribute bag carried by every feature (name, address, poi, route annotations).
pub type Properties = Map<String, Value>;

/// Backend-assigned feature identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(i64),
    Text(String),
}

impl FeatureId {
    /// Loose comparison: `7` matches `"7"`.
    ///
    /// Ids reach us both from JSON numbers and from UI strings, so a typed
    /// mismatch must not hide an otherwise equal id.
    pub fn matches(&self, other: &FeatureId) -> bool {
        match (self, other) {
            (FeatureId::Number(a), FeatureId::Number(b)) => a == b,
            (FeatureId::Text(a), FeatureId::Text(b)) => a == b,
            (FeatureId::Number(n), FeatureId::Text(s))
            | (FeatureId::Text(s), FeatureId::Number(n)) => {
                s.trim().parse::<i64>().is_ok_and(|v| v == *n)
            }
        }
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureId::Number(n) => write!(f, "{n}"),
            FeatureId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(v: i64) -> Self {
        FeatureId::Number(v)
    }
}

impl From<&str> for FeatureId {
    fn from(v: &str) -> Self {
        FeatureId::Text(v.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(v: String) -> Self {
        FeatureId::Text(v)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::LineString => "LineString",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::Polygon => "Polygon",
        }
    }
}

/// GeoJSON geometry (`{"type": ..., "coordinates": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(LonLat),
    MultiPoint(Vec<LonLat>),
    LineString(Vec<LonLat>),
    MultiLineString(Vec<Vec<LonLat>>),
    Polygon(Vec<Vec<LonLat>>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
        }
    }

    pub fn point(&self) -> Option<LonLat> {
        match self {
            Geometry::Point(p) => Some(*p),
            _ => None,
        }
    }

    /// All vertices in document order.
    pub fn positions(&self) -> Vec<LonLat> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.clone(),
            Geometry::MultiLineString(parts) | Geometry::Polygon(parts) => {
                parts.iter().flatten().copied().collect()
            }
        }
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_points(self.positions())
    }
}

/// Canonical metadata for any searchable or selectable map entity.
///
/// Instances are produced by [`crate::ShapeMetadataCache`] and shared behind an
/// `Arc`; they are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMeta {
    pub id: Option<FeatureId>,
    pub source: Option<String>,
    pub properties: Properties,
    pub geometry: Option<Geometry>,
    pub coordinates: Option<LonLat>,
    /// Set iff the raw feature carries `properties.cluster_id`.
    pub cluster: Option<u64>,
    #[serde(rename = "type")]
    pub kind: Option<GeometryKind>,
}

impl PointMeta {
    pub fn is_cluster(&self) -> bool {
        self.cluster.is_some()
    }

    /// Representative position, only for point geometries.
    pub fn point(&self) -> Option<LonLat> {
        match self.kind {
            Some(GeometryKind::Point) => self.coordinates,
            _ => None,
        }
    }

    /// `title`, then `poi.name`, then `name`.
    pub fn display_title(&self) -> Option<&str> {
        str_at(&self.properties, &["title"])
            .or_else(|| str_at(&self.properties, &["poi", "name"]))
            .or_else(|| str_at(&self.properties, &["name"]))
    }

    /// Free-form address, then the raw `address.coordinates` text.
    pub fn location_text(&self) -> Option<String> {
        if let Some(addr) = str_at(&self.properties, &["address", "freeformAddress"]) {
            return Some(addr.to_string());
        }
        match value_at(&self.properties, &["address", "coordinates"])? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Route features carry a `summary` annotation or a multi-line geometry.
    pub fn is_route_summary(&self) -> bool {
        self.properties.contains_key("summary") || self.kind == Some(GeometryKind::MultiLineString)
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        self.geometry
            .as_ref()
            .and_then(Geometry::bounds)
            .or_else(|| self.coordinates.and_then(|c| Aabb2::from_points([c])))
    }
}

/// Reads `properties.cluster_id` as an aggregate id.
pub fn cluster_id(properties: &Properties) -> Option<u64> {
    let v = properties.get("cluster_id")?;
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
}

fn value_at<'a>(properties: &'a Properties, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut cur = properties.get(*first)?;
    for key in rest {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn str_at<'a>(properties: &'a Properties, path: &[&str]) -> Option<&'a str> {
    value_at(properties, path)?.as_str()
}
