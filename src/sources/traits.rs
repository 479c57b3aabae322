use crate::error::SourceError;
use crate::models::{Accommodation, Coordinate};
use crate::sources::types::{GenerativeQuery, Place, PlaceAddress};
use async_trait::async_trait;
use std::ops::ControlFlow;
use tracing::warn;

/// Place-name search and reverse lookup
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Text search, highest-ranked hit first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, SourceError>;

    async fn reverse(&self, position: Coordinate) -> Result<Option<PlaceAddress>, SourceError>;

    /// Coordinate of the best hit for `query`. Fails soft: any error is `None`.
    async fn geocode(&self, query: &str) -> Option<Coordinate> {
        match self.search(query, 1).await {
            Ok(places) => places.first().and_then(Place::coordinate),
            Err(e) => {
                warn!(query, error = %e, "Geocoding failed");
                None
            }
        }
    }
}

/// A source producing accommodations around a point
#[async_trait]
pub trait AccommodationSource: Send + Sync {
    async fn search(&self, center: Coordinate, radius_km: f64) -> Result<Vec<Accommodation>, SourceError>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}

/// Receives generative search output while the adapter is still running.
///
/// Returning `ControlFlow::Break` asks the adapter to stop its term loop.
#[async_trait]
pub trait CandidateSink: Send {
    async fn query_logged(&mut self, prompt_summary: &str, response_excerpt: &str) -> ControlFlow<()>;

    async fn found(&mut self, accommodation: Accommodation) -> ControlFlow<()>;
}

/// Free-text search backed by a generative model
#[async_trait]
pub trait GenerativeSearch: Send + Sync {
    /// Country-specific youth organization categories. Empty on any failure.
    async fn known_types(&self, country: &str) -> Vec<String>;

    /// Runs every search term in turn, streaming results into `sink`.
    async fn search(&self, query: &GenerativeQuery, sink: &mut dyn CandidateSink) -> Vec<Accommodation>;
}

/// Single-prompt text completion
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SourceError>;
}
