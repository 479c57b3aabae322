use crate::models::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One hit from the geocoder's text search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub place_id: u64,
    #[serde(default)]
    pub osm_type: Option<String>,
    #[serde(default)]
    pub osm_id: Option<u64>,
    /// Upstream sends coordinates as strings
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub address: HashMap<String, String>,
}

impl Place {
    pub fn coordinate(&self) -> Option<Coordinate> {
        let lat = self.lat.trim().parse::<f64>().ok()?;
        let lon = self.lon.trim().parse::<f64>().ok()?;
        Some(Coordinate::new(lat, lon)).filter(Coordinate::is_valid)
    }
}

/// Structured address returned by a reverse lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaceAddress {
    #[serde(default)]
    pub address: HashMap<String, String>,
}

impl PlaceAddress {
    /// The most specific settlement name available.
    pub fn city(&self) -> Option<&str> {
        ["city", "town", "village", "municipality", "hamlet"]
            .iter()
            .find_map(|key| self.address.get(*key))
            .map(String::as_str)
            .filter(|c| !c.trim().is_empty())
    }

    pub fn country(&self) -> Option<&str> {
        self.address.get("country").map(String::as_str)
    }
}

/// Inputs for one run of the generative search adapter
#[derive(Debug, Clone)]
pub struct GenerativeQuery {
    pub city: String,
    pub country: String,
    /// Country-specific youth organization categories
    pub known_types: Vec<String>,
    pub center: Coordinate,
    pub radius_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_parses_string_coordinates() {
        let place: Place = serde_json::from_str(
            r#"{"place_id": 12, "lat": "51.0697", "lon": "3.1040", "display_name": "Torhout, West-Vlaanderen, België"}"#,
        )
        .unwrap();
        assert_eq!(place.coordinate(), Some(Coordinate::new(51.0697, 3.1040)));
        assert!(place.address.is_empty());
    }

    #[test]
    fn place_with_garbage_coordinates_is_unplaceable() {
        let place: Place = serde_json::from_str(r#"{"place_id": 1, "lat": "north", "lon": "3.1"}"#).unwrap();
        assert_eq!(place.coordinate(), None);
    }

    #[test]
    fn reverse_lookup_prefers_city_over_village() {
        let reverse: PlaceAddress = serde_json::from_str(
            r#"{"address": {"village": "Wijnendale", "town": "Torhout", "country": "België"}}"#,
        )
        .unwrap();
        assert_eq!(reverse.city(), Some("Torhout"));
        assert_eq!(reverse.country(), Some("België"));
    }
}
