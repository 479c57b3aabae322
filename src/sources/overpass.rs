use crate::config::Config;
use crate::error::SourceError;
use crate::models::{Accommodation, Coordinate, Source};
use crate::sources::tags::{self, Suitability, Tags};
use crate::sources::throttle::Throttle;
use crate::sources::traits::AccommodationSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

const SOURCE: &str = "Overpass";

/// Tag predicates selecting candidate venues. Each line is one query statement.
const TAG_PREDICATES: &[&str] = &[
    r#"["tourism"="camp_site"]"#,
    r#"["tourism"="hostel"]"#,
    r#"["hostel"="yes"]"#,
    r#"["group_accommodation"="yes"]"#,
    r#"["club"="scout"]"#,
    r#"["amenity"="community_centre"]"#,
    r#"["leisure"="club"]"#,
];

/// Raw response envelope. Elements stay untyped so one bad feature cannot
/// fail the batch.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: u64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<Coordinate>,
    #[serde(default)]
    pub tags: Tags,
}

impl OsmElement {
    /// Node coordinate, or the precomputed centre of a way or relation.
    pub fn position(&self) -> Option<Coordinate> {
        let position = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => self.center,
        };
        position.filter(Coordinate::is_valid)
    }
}

/// Why a feature did not become an accommodation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Unnamed,
    NotForGroups(&'static str),
    Unclassified,
    NoPosition,
    TooLittleInformation,
}

/// Builds the compound around-query for every tag predicate.
pub fn build_query(center: Coordinate, radius_km: f64) -> String {
    let radius_m = (radius_km * 1000.0).round() as u64;
    let around = format!("(around:{},{},{})", radius_m, center.lat, center.lon);

    let statements: String = TAG_PREDICATES
        .iter()
        .map(|predicate| format!("  nwr{predicate}{around};\n"))
        .collect();

    format!("[out:json][timeout:25];\n(\n{statements});\nout center tags;")
}

/// Turns one raw feature into an accommodation, or says why not.
pub fn to_accommodation(element: &OsmElement, center: Coordinate) -> Result<Accommodation, Skip> {
    let name = tags::tag(&element.tags, "name").unwrap_or_default();
    if tags::is_placeholder_name(name) {
        return Err(Skip::Unnamed);
    }

    if let Suitability::Reject(reason) = tags::group_suitability(&element.tags) {
        return Err(Skip::NotForGroups(reason));
    }

    let kind = tags::classify(&element.tags, name).ok_or(Skip::Unclassified)?;
    let position = element.position().ok_or(Skip::NoPosition)?;

    let address = tags::assemble_address(&element.tags);
    let website = tags::website(&element.tags);
    let phone = tags::phone(&element.tags);

    if !tags::passes_information_gate(kind, address.as_deref(), website.as_deref(), phone.as_deref()) {
        return Err(Skip::TooLittleInformation);
    }

    let id = format!("{}-{}-{}", Source::Overpass.id_prefix(), element.element_type, element.id);
    let mut accommodation = Accommodation::new(id, name, kind, Source::Overpass).placed_at(position, center);
    accommodation.address = address;
    accommodation.city = tags::tag(&element.tags, "addr:city").map(str::to_string);
    accommodation.country = tags::tag(&element.tags, "addr:country").map(str::to_string);
    accommodation.website = website;
    accommodation.phone = phone;
    accommodation.email = tags::email(&element.tags);
    accommodation.capacity = tags::capacity(&element.tags);
    accommodation.description = tags::tag(&element.tags, "description").map(str::to_string);
    Ok(accommodation)
}

/// Converts a batch of features, sorted by ascending distance.
pub fn collect_accommodations(elements: &[OsmElement], center: Coordinate) -> Vec<Accommodation> {
    let mut accommodations = Vec::new();
    for element in elements {
        match to_accommodation(element, center) {
            Ok(accommodation) => accommodations.push(accommodation),
            Err(skip) => debug!(id = element.id, ?skip, "Skipped map feature"),
        }
    }

    accommodations.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::MAX)
            .total_cmp(&b.distance.unwrap_or(f64::MAX))
    });
    accommodations
}

/// Parses a response body, skipping elements that do not match the feature shape.
pub fn parse_elements(body: &str) -> Result<Vec<OsmElement>, SourceError> {
    let response: OverpassResponse = serde_json::from_str(body).map_err(|e| SourceError::malformed(SOURCE, e))?;

    let mut elements = Vec::with_capacity(response.elements.len());
    for raw in response.elements {
        match serde_json::from_value::<OsmElement>(raw) {
            Ok(element) => elements.push(element),
            Err(e) => warn!(error = %e, "Skipping malformed map feature"),
        }
    }
    Ok(elements)
}

/// Spatial-tag search against an Overpass-compatible query service
pub struct OverpassSource {
    client: Client,
    url: String,
    throttle: Throttle,
}

impl OverpassSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create Overpass HTTP client")?;

        Ok(Self {
            client,
            url: config.overpass_url.clone(),
            throttle: Throttle::new(SOURCE, config.intervals.overpass),
        })
    }
}

#[async_trait]
impl AccommodationSource for OverpassSource {
    async fn search(&self, center: Coordinate, radius_km: f64) -> Result<Vec<Accommodation>, SourceError> {
        let query = build_query(center, radius_km);
        debug!(%query, "Overpass query");

        self.throttle.wait().await;
        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable {
                source_name: SOURCE,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let elements = parse_elements(&body)?;

        let accommodations = collect_accommodations(&elements, center);
        info!(
            features = elements.len(),
            kept = accommodations.len(),
            "Overpass search finished"
        );
        Ok(accommodations)
    }

    fn source_name(&self) -> &'static str {
        SOURCE
    }
}
