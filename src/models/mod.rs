use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data source an accommodation was produced by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Tagged map features from the spatial query service
    Overpass,
    /// Name-pattern searches against the geocoder
    Nominatim,
    /// Free-text generative search
    Generative,
}

impl Source {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Source::Overpass => "osm",
            Source::Nominatim => "nominatim",
            Source::Generative => "ai",
        }
    }
}

/// Accommodation category, decided once when an entity is created
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccommodationType {
    Hostel,
    Camping,
    YouthMovement,
}

impl AccommodationType {
    pub const ALL: [AccommodationType; 3] = [
        AccommodationType::Hostel,
        AccommodationType::Camping,
        AccommodationType::YouthMovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccommodationType::Hostel => "hostel",
            AccommodationType::Camping => "camping",
            AccommodationType::YouthMovement => "youth_movement",
        }
    }
}

impl fmt::Display for AccommodationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccommodationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "hostel" => Ok(AccommodationType::Hostel),
            "camping" | "campsite" => Ok(AccommodationType::Camping),
            "youth_movement" | "youth" => Ok(AccommodationType::YouthMovement),
            other => Err(format!("unknown accommodation type: {other}")),
        }
    }
}

/// A WGS84 coordinate pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Core accommodation data model, shared by every source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccommodationType,
    pub source: Source,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Kilometres from the search origin, fixed at creation
    pub distance: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// Set when the position could not be confirmed and was pinned at the origin
    #[serde(default)]
    pub approximate_location: bool,
    pub description: Option<String>,
    pub capacity: Option<u32>,
    pub price_range: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Accommodation {
    /// Creates an entity with only the required fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AccommodationType, source: Source) -> Self {
        Self {
            id: id.into(),
            name: name.into().trim().to_string(),
            kind,
            source,
            address: None,
            city: None,
            country: None,
            latitude: None,
            longitude: None,
            distance: None,
            phone: None,
            email: None,
            website: None,
            approximate_location: false,
            description: None,
            capacity: None,
            price_range: None,
            amenities: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Places the entity and records its distance from `origin`.
    pub fn placed_at(mut self, position: Coordinate, origin: Coordinate) -> Self {
        self.latitude = Some(position.lat);
        self.longitude = Some(position.lon);
        self.distance = Some(crate::geo::distance_km(
            origin.lat,
            origin.lon,
            position.lat,
            position.lon,
        ));
        self
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn is_placeable(&self) -> bool {
        self.coordinate().is_some_and(|c| c.is_valid())
    }

    /// Number of non-empty fields among website, phone and address.
    pub fn completeness_score(&self) -> usize {
        [&self.website, &self.phone, &self.address]
            .into_iter()
            .filter(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count()
    }
}

/// Final results partitioned by type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupedResults {
    pub hostel: Vec<Accommodation>,
    pub camping: Vec<Accommodation>,
    pub youth_movement: Vec<Accommodation>,
}

impl GroupedResults {
    pub fn from_results(results: &[Accommodation]) -> Self {
        let mut grouped = Self::default();
        for accommodation in results {
            grouped.bucket_mut(accommodation.kind).push(accommodation.clone());
        }
        grouped
    }

    pub fn get(&self, kind: AccommodationType) -> &[Accommodation] {
        match kind {
            AccommodationType::Hostel => &self.hostel,
            AccommodationType::Camping => &self.camping,
            AccommodationType::YouthMovement => &self.youth_movement,
        }
    }

    fn bucket_mut(&mut self, kind: AccommodationType) -> &mut Vec<Accommodation> {
        match kind {
            AccommodationType::Hostel => &mut self.hostel,
            AccommodationType::Camping => &mut self.camping,
            AccommodationType::YouthMovement => &mut self.youth_movement,
        }
    }
}

/// Output of one search invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Accommodation>,
    pub grouped: GroupedResults,
    pub search_coordinates: Option<Coordinate>,
    pub logs: Vec<String>,
    pub searched_at: DateTime<Utc>,
}

impl SearchResponse {
    pub fn new(results: Vec<Accommodation>, origin: Coordinate, logs: Vec<String>) -> Self {
        let grouped = GroupedResults::from_results(&results);
        Self {
            results,
            grouped,
            search_coordinates: Some(origin),
            logs,
            searched_at: Utc::now(),
        }
    }

    pub fn of_type(&self, kind: AccommodationType) -> &[Accommodation] {
        self.grouped.get(kind)
    }

    pub fn count(&self, kind: AccommodationType) -> usize {
        self.grouped.get(kind).len()
    }
}
