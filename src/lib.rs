//! Group accommodation finder for youth camp planning.
//!
//! Aggregates hostels, campsites and youth-movement premises around a place
//! from map data, geocoder name searches and a generative model, and merges
//! them into one deduplicated result set.

pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod pipeline;
pub mod sources;

pub use config::Config;
pub use error::{SearchError, SourceError};
pub use models::{Accommodation, AccommodationType, Coordinate, GroupedResults, SearchResponse, Source};
pub use pipeline::{Pipeline, SearchEvent, SearchStage};
