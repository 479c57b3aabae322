use crate::error::SourceError;
use crate::models::{Accommodation, AccommodationType, Coordinate, Source};
use crate::sources::tags::youth_keyword;
use crate::sources::traits::{AccommodationSource, Geocoder};
use crate::sources::types::Place;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SOURCE: &str = "Address search";

/// Organization prefixes combined with the city name, one search each
pub const DEFAULT_PREFIXES: &[&str] = &["Chiro", "Scouts", "KSA", "KLJ", "Jeugdhuis"];

/// Finds youth-club premises through "{prefix} {city}" geocoder searches
pub struct AddressSearchSource {
    geocoder: Arc<dyn Geocoder>,
    prefixes: Vec<String>,
    hits_per_search: usize,
}

impl AddressSearchSource {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            hits_per_search: 15,
        }
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = prefixes;
        self
    }
}

/// The comma segment of `display_name` holding the organization token.
pub fn organization_name(display_name: &str) -> Option<String> {
    let segments: Vec<&str> = display_name
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    segments
        .iter()
        .find(|segment| youth_keyword(segment).is_some())
        .or_else(|| segments.first())
        .map(|s| s.to_string())
}

fn address_line(place: &Place) -> Option<String> {
    let field = |key: &str| {
        place
            .address
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let mut parts = Vec::new();
    if let Some(road) = field("road") {
        parts.push(match field("house_number") {
            Some(number) => format!("{road} {number}"),
            None => road.to_string(),
        });
    }
    let locality: Vec<&str> = [
        field("postcode"),
        field("city").or_else(|| field("town")).or_else(|| field("village")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !locality.is_empty() {
        parts.push(locality.join(" "));
    }

    if parts.is_empty() {
        // Drop the leading name segment of the verbose display string
        let rest: Vec<&str> = place.display_name.split(',').skip(1).map(str::trim).collect();
        return Some(rest.join(", ")).filter(|s| !s.is_empty());
    }
    Some(parts.join(", "))
}

/// Converts one geocoder hit, or `None` when it is out of range or not a youth club.
pub fn to_accommodation(place: &Place, center: Coordinate, radius_km: f64) -> Option<Accommodation> {
    let position = place.coordinate()?;
    let distance = crate::geo::distance_km(center.lat, center.lon, position.lat, position.lon);
    if distance > radius_km {
        return None;
    }

    let serialized_address = serde_json::to_string(&place.address).unwrap_or_default();
    youth_keyword(&place.display_name).or_else(|| youth_keyword(&serialized_address))?;

    let name = organization_name(&place.display_name)?;
    let id = format!("{}-{}", Source::Nominatim.id_prefix(), place.place_id);

    let mut accommodation =
        Accommodation::new(id, name, AccommodationType::YouthMovement, Source::Nominatim).placed_at(position, center);
    accommodation.address = address_line(place);
    accommodation.city = ["city", "town", "village"]
        .iter()
        .find_map(|key| place.address.get(*key))
        .cloned();
    accommodation.country = place.address.get("country").cloned();
    Some(accommodation)
}

#[async_trait]
impl AccommodationSource for AddressSearchSource {
    async fn search(&self, center: Coordinate, radius_km: f64) -> Result<Vec<Accommodation>, SourceError> {
        let city = match self.geocoder.reverse(center).await? {
            Some(reverse) => match reverse.city() {
                Some(city) => city.to_string(),
                None => {
                    warn!(?center, "Reverse lookup returned no city name");
                    return Ok(Vec::new());
                }
            },
            None => {
                warn!(?center, "Reverse lookup found nothing");
                return Ok(Vec::new());
            }
        };

        let mut seen_places = HashSet::new();
        let mut accommodations = Vec::new();

        for prefix in &self.prefixes {
            let term = format!("{prefix} {city}");
            let places = match self.geocoder.search(&term, self.hits_per_search).await {
                Ok(places) => places,
                Err(e) => {
                    warn!(%term, error = %e, "Address search term failed");
                    continue;
                }
            };
            debug!(%term, hits = places.len(), "Address search term finished");

            for place in &places {
                if !seen_places.insert(place.place_id) {
                    continue;
                }
                if let Some(accommodation) = to_accommodation(place, center, radius_km) {
                    accommodations.push(accommodation);
                }
            }
        }

        accommodations.sort_by(|a, b| {
            a.distance
                .unwrap_or(f64::MAX)
                .total_cmp(&b.distance.unwrap_or(f64::MAX))
        });
        info!(%city, found = accommodations.len(), "Address search finished");
        Ok(accommodations)
    }

    fn source_name(&self) -> &'static str {
        SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::PlaceAddress;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const TORHOUT: Coordinate = Coordinate { lat: 51.0697, lon: 3.1040 };

    fn place(id: u64, lat: f64, lon: f64, display_name: &str) -> Place {
        Place {
            place_id: id,
            osm_type: Some("way".into()),
            osm_id: Some(id * 10),
            lat: lat.to_string(),
            lon: lon.to_string(),
            display_name: display_name.into(),
            address: HashMap::new(),
        }
    }

    struct FakeGeocoder {
        hits: HashMap<String, Result<Vec<Place>, u16>>,
        searched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Place>, SourceError> {
            self.searched.lock().unwrap().push(query.to_string());
            match self.hits.get(query) {
                Some(Ok(places)) => Ok(places.clone()),
                Some(Err(status)) => Err(SourceError::Unavailable { source_name: "fake", status: *status }),
                None => Ok(Vec::new()),
            }
        }

        async fn reverse(&self, _position: Coordinate) -> Result<Option<PlaceAddress>, SourceError> {
            let address = HashMap::from([("town".to_string(), "Torhout".to_string())]);
            Ok(Some(PlaceAddress { address }))
        }
    }

    #[test]
    fn organization_name_comes_from_matching_segment() {
        assert_eq!(
            organization_name("Lokaal, Chiro Sint-Henricus, Bosstraat, Torhout, België").as_deref(),
            Some("Chiro Sint-Henricus")
        );
        assert_eq!(organization_name("Markt, Torhout").as_deref(), Some("Markt"));
    }

    #[test]
    fn hits_outside_radius_or_unrelated_are_skipped() {
        let near_club = place(1, 51.08, 3.10, "KSA Torhout, Oostendestraat, Torhout, België");
        let far_club = place(2, 51.50, 3.10, "KSA Verweg, Brugge, België");
        let bakery = place(3, 51.07, 3.10, "Bakkerij, Markt, Torhout, België");

        assert!(to_accommodation(&near_club, TORHOUT, 25.0).is_some());
        assert!(to_accommodation(&far_club, TORHOUT, 25.0).is_none());
        assert!(to_accommodation(&bakery, TORHOUT, 25.0).is_none());
    }

    #[test]
    fn address_falls_back_to_display_string_tail() {
        let club = place(1, 51.08, 3.10, "KSA Torhout, Oostendestraat, Torhout, België");
        let a = to_accommodation(&club, TORHOUT, 25.0).unwrap();
        assert_eq!(a.id, "nominatim-1");
        assert_eq!(a.name, "KSA Torhout");
        assert_eq!(a.address.as_deref(), Some("Oostendestraat, Torhout, België"));
    }

    #[tokio::test]
    async fn failing_term_does_not_abort_others_and_duplicates_are_dropped() {
        let club = place(1, 51.08, 3.10, "Chiro Torhout, Bosstraat, Torhout, België");
        let hits = HashMap::from([
            ("Chiro Torhout".to_string(), Ok(vec![club.clone()])),
            ("Scouts Torhout".to_string(), Err(503)),
            ("KSA Torhout".to_string(), Ok(vec![club])),
        ]);
        let geocoder = Arc::new(FakeGeocoder { hits, searched: Mutex::new(Vec::new()) });
        let source = AddressSearchSource::new(geocoder.clone());

        let found = source.search(TORHOUT, 25.0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].city.as_deref(), None);
        assert_eq!(geocoder.searched.lock().unwrap().len(), DEFAULT_PREFIXES.len());
    }
}
