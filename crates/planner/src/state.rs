use std::sync::Arc;

use foundation::math::LonLat;
use tokio::sync::watch;

use crate::route::Route;
use crate::vehicle::VehicleProfile;

/// Read side of the shared planner state.
///
/// Each field has exactly one writer: [`RoutePublisher`] (owned by the
/// coordinator), [`LocationFeed`] and [`VehicleSelector`]. Readers always see a
/// whole value, never a partial update.
#[derive(Debug, Clone)]
pub struct SharedState {
    route: watch::Receiver<Option<Arc<Route>>>,
    location: watch::Receiver<Option<LonLat>>,
    vehicle: watch::Receiver<Option<VehicleProfile>>,
}

impl SharedState {
    pub fn current_route(&self) -> Option<Arc<Route>> {
        self.route.borrow().clone()
    }

    pub fn current_location(&self) -> Option<LonLat> {
        *self.location.borrow()
    }

    pub fn current_vehicle(&self) -> Option<VehicleProfile> {
        self.vehicle.borrow().clone()
    }

    pub fn subscribe_route(&self) -> watch::Receiver<Option<Arc<Route>>> {
        self.route.clone()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<Option<LonLat>> {
        self.location.clone()
    }
}

#[derive(Debug)]
pub struct RoutePublisher(watch::Sender<Option<Arc<Route>>>);

impl RoutePublisher {
    pub(crate) fn replace(&self, route: Option<Arc<Route>>) {
        self.0.send_replace(route);
    }
}

/// Sole writer of the live location.
#[derive(Debug)]
pub struct LocationFeed(watch::Sender<Option<LonLat>>);

impl LocationFeed {
    /// Non-finite positions are ignored.
    pub fn publish(&self, position: LonLat) {
        if position.iter().all(|c| c.is_finite()) {
            self.0.send_replace(Some(position));
        }
    }

    pub fn clear(&self) {
        self.0.send_replace(None);
    }
}

#[derive(Debug)]
pub struct VehicleSelector(watch::Sender<Option<VehicleProfile>>);

impl VehicleSelector {
    pub fn select(&self, profile: Option<VehicleProfile>) {
        self.0.send_replace(profile);
    }
}

pub fn channels() -> (SharedState, RoutePublisher, LocationFeed, VehicleSelector) {
    let (route_tx, route) = watch::channel(None);
    let (location_tx, location) = watch::channel(None);
    let (vehicle_tx, vehicle) = watch::channel(None);
    (
        SharedState {
            route,
            location,
            vehicle,
        },
        RoutePublisher(route_tx),
        LocationFeed(location_tx),
        VehicleSelector(vehicle_tx),
    )
}

#[cfg(test)]
mod tests {
    use super::channels;
    use crate::vehicle::VehicleProfile;

    #[test]
    fn writers_publish_to_every_reader() {
        let (state, _route, location, vehicle) = channels();
        let reader = state.clone();
        assert_eq!(reader.current_location(), None);

        location.publish([25.0, 44.0]);
        location.publish([f64::NAN, 44.0]);
        assert_eq!(reader.current_location(), Some([25.0, 44.0]));
        location.clear();
        assert_eq!(state.current_location(), None);

        vehicle.select(Some(VehicleProfile::default()));
        assert_eq!(reader.current_vehicle().unwrap().travel_mode, "car");
        assert!(reader.current_route().is_none());
    }
}
