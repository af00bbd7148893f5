pub mod entity;
pub mod point_meta;
pub mod raw;
pub mod selection;
pub mod shape_cache;
pub mod world;

pub use entity::ShapeId;
pub use point_meta::{FeatureId, Geometry, GeometryKind, PointMeta, Properties};
pub use raw::{GeoJsonFeature, RawFeature, VectorShape};
pub use selection::Selection;
pub use shape_cache::{CacheStats, ShapeMetadataCache};
pub use world::World;
