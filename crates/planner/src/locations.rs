use scene::{FeatureId, GeoJsonFeature, Properties};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Store location record from the logistics backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationGeo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location_name: String,
    #[serde(default)]
    pub is_active: bool,
}

impl LocationGeo {
    /// Point feature for the store layer; `None` without a usable, non-zero
    /// latitude and longitude.
    pub fn to_feature(&self) -> Option<GeoJsonFeature> {
        let lat = self.latitude.filter(|v| v.is_finite() && *v != 0.0)?;
        let lon = self.longitude.filter(|v| v.is_finite() && *v != 0.0)?;

        let mut properties = Properties::new();
        properties.insert("name".into(), json!(self.location_name));
        properties.insert("address".into(), json!({ "freeformAddress": self.address }));
        if let Ok(location) = serde_json::to_value(self) {
            properties.insert("location".into(), location);
        }
        Some(GeoJsonFeature {
            id: self.id.map(FeatureId::Number),
            ..GeoJsonFeature::point([lon, lat], properties)
        })
    }
}

pub fn location_features(locations: &[LocationGeo]) -> Vec<GeoJsonFeature> {
    locations.iter().filter_map(LocationGeo::to_feature).collect()
}

#[cfg(test)]
mod tests {
    use super::{LocationGeo, location_features};
    use serde_json::json;

    #[test]
    fn unusable_coordinates_are_skipped() {
        let locations: Vec<LocationGeo> = serde_json::from_value(json!([
            {
                "id": 1,
                "latitude": 44.43,
                "longitude": 26.1,
                "address": "Bd. Unirii 1",
                "locationName": "Depozit",
                "isActive": true
            },
            {"id": 2, "latitude": 0, "longitude": 26.1, "locationName": "Zero"},
            {"id": 3, "longitude": 26.1, "locationName": "Missing"}
        ]))
        .unwrap();
        let features = location_features(&locations);
        assert_eq!(features.len(), 1);
        let f = &features[0];
        assert_eq!(f.geometry.point(), Some([26.1, 44.43]));
        assert_eq!(f.properties["name"], json!("Depozit"));
        assert_eq!(f.properties["address"]["freeformAddress"], json!("Bd. Unirii 1"));
        assert_eq!(f.properties["location"]["locationName"], json!("Depozit"));
    }
}
