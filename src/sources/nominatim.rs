use crate::config::Config;
use crate::error::SourceError;
use crate::models::Coordinate;
use crate::sources::throttle::Throttle;
use crate::sources::traits::Geocoder;
use crate::sources::types::{Place, PlaceAddress};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

const SOURCE: &str = "Nominatim";

/// Geocoder backed by a Nominatim-compatible search service
pub struct NominatimClient {
    client: Client,
    base_url: String,
    throttle: Throttle,
}

impl NominatimClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create geocoder HTTP client")?;

        Ok(Self {
            client,
            base_url: config.nominatim_url.trim_end_matches('/').to_string(),
            throttle: Throttle::new(SOURCE, config.intervals.geocoder),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        self.throttle.wait().await;

        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, ?query, "Geocoder request");

        let response = self.client.get(&url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Unavailable {
                source_name: SOURCE,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::malformed(SOURCE, e))
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, SourceError> {
        self.get_json(
            "search",
            &[
                ("q", query.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("limit", limit.max(1).to_string()),
            ],
        )
        .await
    }

    async fn reverse(&self, position: Coordinate) -> Result<Option<PlaceAddress>, SourceError> {
        let value: serde_json::Value = self
            .get_json(
                "reverse",
                &[
                    ("lat", position.lat.to_string()),
                    ("lon", position.lon.to_string()),
                    ("format", "json".to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;

        // Unknown positions come back as {"error": "..."} with a 200 status
        if value.get("error").is_some() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| SourceError::malformed(SOURCE, e))
    }
}
