use serde::{Deserialize, Serialize};

pub const DEFAULT_TRAVEL_MODE: &str = "car";

/// Fleet vehicle category as stored by the logistics backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub category_name: String,
    #[serde(default)]
    pub capacity: f64,
    #[serde(default)]
    pub vehicle_length: f64,
    #[serde(default)]
    pub vehicle_height: f64,
    #[serde(default)]
    pub vehicle_width: f64,
    #[serde(default)]
    pub vehicle_max_speed: f64,
    #[serde(default)]
    pub vehicle_weight: f64,
    #[serde(default)]
    pub vehicle_type: String,
}

/// Routing constraints for one vehicle. Dimensions in metres, weight in kg,
/// speed in km/h; `None` leaves the constraint to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub travel_mode: String,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    pub weight_kg: Option<f64>,
    pub max_speed_kmh: Option<f64>,
}

impl Default for VehicleProfile {
    fn default() -> Self {
        Self {
            travel_mode: DEFAULT_TRAVEL_MODE.to_string(),
            length_m: None,
            width_m: None,
            height_m: None,
            weight_kg: None,
            max_speed_kmh: None,
        }
    }
}

impl From<&VehicleCategory> for VehicleProfile {
    fn from(c: &VehicleCategory) -> Self {
        let travel_mode = match c.vehicle_type.trim() {
            "" => DEFAULT_TRAVEL_MODE.to_string(),
            t => t.to_string(),
        };
        Self {
            travel_mode,
            length_m: positive(c.vehicle_length),
            width_m: positive(c.vehicle_width),
            height_m: positive(c.vehicle_height),
            weight_kg: positive(c.vehicle_weight),
            max_speed_kmh: positive(c.vehicle_max_speed),
        }
    }
}

fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::{VehicleCategory, VehicleProfile};

    #[test]
    fn category_converts_to_profile() {
        let c: VehicleCategory = serde_json::from_str(
            r#"{"id": 3, "categoryName": "Heavy", "capacity": 20, "vehicleLength": 16.5,
                "vehicleHeight": 4, "vehicleWidth": 2.5, "vehicleMaxSpeed": 0,
                "vehicleWeight": 18000, "vehicleType": "truck"}"#,
        )
        .unwrap();
        let p = VehicleProfile::from(&c);
        assert_eq!(p.travel_mode, "truck");
        assert_eq!(p.length_m, Some(16.5));
        assert_eq!(p.weight_kg, Some(18000.0));
        assert_eq!(p.max_speed_kmh, None);
    }

    #[test]
    fn blank_vehicle_type_means_car() {
        let c: VehicleCategory = serde_json::from_str(r#"{"categoryName": "Van"}"#).unwrap();
        assert_eq!(VehicleProfile::from(&c), VehicleProfile::default());
    }
}
