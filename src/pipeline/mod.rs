//! Search orchestration.
//!
//! A search geocodes the requested location, then consults the map-feature,
//! address and generative sources strictly in that order, one request at a
//! time. Results are folded into the session as each source answers (and, for
//! the generative source, as each organization is confirmed), so listeners see
//! partial results early. A final pass collapses entities sharing a coordinate
//! bucket, keeping the most complete one.

pub mod events;
pub mod merge;
mod session;

pub use events::{SearchEvent, SearchStage};

use crate::config::Config;
use crate::error::SearchError;
use crate::models::{AccommodationType, Coordinate, SearchResponse};
use crate::sources::{
    AccommodationSource, AddressSearchSource, GeminiClient, GenerativeQuery, GenerativeSearch, GenerativeSource,
    Geocoder, NominatimClient, OverpassSource,
};
use anyhow::Result;
use session::SearchSession;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Capacity of the event channel handed out by [`Pipeline::spawn_search`]
pub const EVENT_BUFFER: usize = 64;

/// Accommodation search over all configured sources
#[derive(Clone)]
pub struct Pipeline {
    geocoder: Arc<dyn Geocoder>,
    spatial: Arc<dyn AccommodationSource>,
    address: Arc<dyn AccommodationSource>,
    generative: Arc<dyn GenerativeSearch>,
}

/// City and trailing segment of a "City, Region, Country" location string.
///
/// The trailing segment is only a fallback for the country.
pub fn split_location(location: &str) -> (String, String) {
    let parts: Vec<&str> = location
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let city = parts.first().copied().unwrap_or_default().to_string();
    let country = if parts.len() > 1 {
        parts[parts.len() - 1].to_string()
    } else {
        String::new()
    };
    (city, country)
}

impl Pipeline {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        spatial: Arc<dyn AccommodationSource>,
        address: Arc<dyn AccommodationSource>,
        generative: Arc<dyn GenerativeSearch>,
    ) -> Self {
        Self {
            geocoder,
            spatial,
            address,
            generative,
        }
    }

    /// Wires the real upstream clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimClient::new(config)?);
        let spatial = Arc::new(OverpassSource::new(config)?);
        let address = Arc::new(AddressSearchSource::new(geocoder.clone()));
        let model = Arc::new(GeminiClient::new(config)?);
        let generative = Arc::new(GenerativeSource::new(model, geocoder.clone()));
        Ok(Self::new(geocoder, spatial, address, generative))
    }

    /// Full search around `location`.
    ///
    /// Only a location that cannot be geocoded fails the search; a failing
    /// source just contributes nothing. Progress goes to `events` when given,
    /// and dropping its receiver cancels the search at the next step.
    pub async fn search(
        &self,
        location: &str,
        radius_km: f64,
        events: Option<mpsc::Sender<SearchEvent>>,
    ) -> Result<SearchResponse, SearchError> {
        self.run(location, radius_km, None, events).await
    }

    /// Supplementary search for a single category.
    ///
    /// Only sources able to produce `kind` are consulted, and only entities of
    /// that kind are returned.
    pub async fn search_category(
        &self,
        location: &str,
        radius_km: f64,
        kind: AccommodationType,
        events: Option<mpsc::Sender<SearchEvent>>,
    ) -> Result<SearchResponse, SearchError> {
        self.run(location, radius_km, Some(kind), events).await
    }

    /// Runs [`Pipeline::search`] on its own task.
    pub fn spawn_search(
        &self,
        location: impl Into<String>,
        radius_km: f64,
    ) -> (mpsc::Receiver<SearchEvent>, JoinHandle<Result<SearchResponse, SearchError>>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        let location = location.into();
        let handle = tokio::spawn(async move { pipeline.search(&location, radius_km, Some(tx)).await });
        (rx, handle)
    }

    async fn run(
        &self,
        location: &str,
        radius_km: f64,
        only: Option<AccommodationType>,
        events: Option<mpsc::Sender<SearchEvent>>,
    ) -> Result<SearchResponse, SearchError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(SearchError::InvalidRadius(radius_km));
        }

        let mut session = SearchSession::new(radius_km, only, events);
        session.enter(SearchStage::Geocoding).await;
        session.log(format!("Looking up \"{location}\" (radius {radius_km} km)"));

        let Some(origin) = self.geocoder.geocode(location).await else {
            session.log(format!("Location \"{location}\" not found"));
            session.enter(SearchStage::Failed).await;
            return Err(SearchError::LocationNotFound(location.to_string()));
        };
        session.set_origin(origin);
        session.log(format!("Found location at {:.4}, {:.4}", origin.lat, origin.lon));
        session.checkpoint()?;

        session.enter(SearchStage::SourceSpatial).await;
        self.run_source(self.spatial.as_ref(), "Map features", origin, radius_km, &mut session)
            .await;
        session.checkpoint()?;

        let wants_youth = only.map_or(true, |kind| kind == AccommodationType::YouthMovement);
        if wants_youth {
            session.enter(SearchStage::SourceAddress).await;
            self.run_source(self.address.as_ref(), "Address search", origin, radius_km, &mut session)
                .await;
            session.checkpoint()?;

            session.enter(SearchStage::SourceGenerative).await;
            self.run_generative(location, origin, radius_km, &mut session).await;
            session.checkpoint()?;
        }

        session.enter(SearchStage::Deduplicating).await;
        let results = merge::deduplicate(session.accumulated());
        session.log(format!(
            "{} unique accommodations after deduplicating {} candidates",
            results.len(),
            session.accumulated().len()
        ));

        session.enter(SearchStage::Done).await;
        Ok(session.finish(results, origin))
    }

    async fn run_source(
        &self,
        source: &dyn AccommodationSource,
        label: &str,
        origin: Coordinate,
        radius_km: f64,
        session: &mut SearchSession,
    ) {
        session.log(format!("{label}: searching ({})", source.source_name()));
        match source.search(origin, radius_km).await {
            Ok(found) => {
                let added = session.fold_all(&found);
                session.log(format!("{label}: {} results, {added} new", found.len()));
            }
            Err(e) => {
                warn!(source = source.source_name(), error = %e, "Source unavailable");
                session.log(format!("{label}: unavailable ({e}), 0 results"));
            }
        }
        session.publish_progress().await;
    }

    async fn run_generative(&self, location: &str, origin: Coordinate, radius_km: f64, session: &mut SearchSession) {
        let (city, typed_country) = split_location(location);
        let looked_up = match self.geocoder.reverse(origin).await {
            Ok(address) => address.and_then(|a| a.country().map(str::trim).map(str::to_string)),
            Err(e) => {
                warn!(error = %e, "Reverse lookup for country failed");
                None
            }
        };
        // The trailing segment can be a province
        let country = looked_up.filter(|c| !c.is_empty()).unwrap_or(typed_country);

        session.log(format!("Generative search: asking for organization types in {country}"));
        let known_types = self.generative.known_types(&country).await;
        session.log(format!(
            "Generative search: {} organization types ({})",
            known_types.len(),
            known_types.join(", ")
        ));

        let query = GenerativeQuery {
            city,
            country,
            known_types,
            center: origin,
            radius_km,
        };
        let before = session.merged_len();
        let found = self.generative.search(&query, &mut *session).await;
        session.log(format!(
            "Generative search: {} results, {} new",
            found.len(),
            session.merged_len() - before
        ));
        session.publish_progress().await;
    }
}
