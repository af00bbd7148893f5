use std::sync::Arc;

use foundation::bounds::Aabb2;
use foundation::math::LonLat;
use scene::{PointMeta, ShapeId};

use crate::route::Route;
use crate::waypoint::WaypointKey;

/// A named group of displayed result markers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultSet {
    Waypoint(WaypointKey),
    AlongRoute,
    StoreLocations,
}

/// Change to a waypoint's placeholder marker (`id-<key>`).
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderUpdate {
    Add { key: WaypointKey, shape: ShapeId },
    Remove { key: WaypointKey },
    SetVisible { key: WaypointKey, visible: bool },
    SetCoordinates { key: WaypointKey, position: LonLat },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommand {
    CenterOn { center: LonLat, max_zoom: u8 },
    FitBounds { bounds: Aabb2, padding: u32, max_zoom: Option<u8> },
}

/// Everything the rendering surface and form layer must apply.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerEvent {
    Placeholder(PlaceholderUpdate),
    ShowFeatures { set: ResultSet, features: Vec<Arc<PointMeta>> },
    RemoveFeatures { set: ResultSet, shapes: Vec<ShapeId> },
    /// Text the form should show for a waypoint (e.g. a picked name).
    QueryText { key: WaypointKey, text: String },
    Camera(CameraCommand),
    RouteReplaced(Arc<Route>),
    RouteCleared,
    SearchFailed { set: ResultSet, retryable: bool, message: String },
    StaleResponseDiscarded { key: WaypointKey },
}
