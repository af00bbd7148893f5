//! Multi-stop route planning core.
//!
//! [`RoutePlanner`] owns the waypoint form model, per-waypoint search results
//! and the rendered shape world. Routing and geocoding go through the
//! [`backend`] traits; camera follow and auto-recenter run as tokio tasks fed
//! by the [`state`] watch channels.

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod details;
pub mod error;
pub mod events;
pub mod follow;
pub mod locations;
pub mod recenter;
pub mod route;
pub mod route_planner;
pub mod search_store;
pub mod state;
pub mod vehicle;
pub mod waypoint;

pub use backend::{RoutingBackend, SearchBackend};
pub use config::PlannerConfig;
pub use coordinator::{RouteCoordinator, SearchClient};
pub use details::RouteDetails;
pub use error::{BackendError, BackendErrorKind, PlannerError};
pub use events::{CameraCommand, PlaceholderUpdate, PlannerEvent, ResultSet};
pub use follow::FollowController;
pub use locations::LocationGeo;
pub use recenter::{InteractionClock, RecenterGate, spawn_auto_recenter};
pub use route::{LegName, Route, RouteSummary};
pub use route_planner::{PendingSearch, RoutePlanner};
pub use search_store::{SearchResultStore, SearchTicket, SlotState};
pub use state::{LocationFeed, RoutePublisher, SharedState, VehicleSelector, channels};
pub use vehicle::{VehicleCategory, VehicleProfile};
pub use waypoint::{Waypoint, WaypointKey, WaypointRegistry};
