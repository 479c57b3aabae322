use crate::models::{Accommodation, AccommodationType, Source};
use crate::sources::candidates::{self, Candidate};
use crate::sources::tags::normalize_website;
use crate::sources::traits::{CandidateSink, GenerativeSearch, Geocoder, TextModel};
use crate::sources::types::GenerativeQuery;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Locale-independent phrasings searched after the per-type terms
const GENERIC_PHRASES: &[&str] = &[
    "youth organizations in {city}",
    "jeugdbewegingen in {city}",
    "mouvements de jeunesse à {city}",
    "Jugendverbände in {city}",
    "scout groups near {city}",
];

const EXCERPT_CHARS: usize = 300;

/// Organization search through a generative text model.
///
/// Every term is sent on its own, strictly one after another. The model's
/// spacing is enforced by the model client's throttle.
pub struct GenerativeSource {
    model: Arc<dyn TextModel>,
    geocoder: Arc<dyn Geocoder>,
    max_known_types: usize,
}

impl GenerativeSource {
    pub fn new(model: Arc<dyn TextModel>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            model,
            geocoder,
            max_known_types: 6,
        }
    }

    pub fn with_max_known_types(mut self, max_known_types: usize) -> Self {
        self.max_known_types = max_known_types;
        self
    }

    /// Fills the optional detail fields of `accommodation` from a model prompt.
    ///
    /// Fields that already hold a value are left alone. On any failure the
    /// entity comes back unchanged.
    pub async fn enrich(&self, accommodation: &Accommodation) -> Accommodation {
        let mut enriched = accommodation.clone();
        let prompt = enrichment_prompt(accommodation);

        let text = match self.model.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(name = %accommodation.name, error = %e, "Enrichment request failed");
                return enriched;
            }
        };
        let Some(details) = candidates::parse_enrichment(&text) else {
            warn!(name = %accommodation.name, "Enrichment response could not be parsed");
            return enriched;
        };

        if enriched.description.is_none() {
            enriched.description = details.description;
        }
        if enriched.capacity.is_none() {
            enriched.capacity = details.capacity;
        }
        if enriched.price_range.is_none() {
            enriched.price_range = details.price_range;
        }
        if enriched.amenities.is_empty() {
            enriched.amenities = details.amenities;
        }
        if enriched.website.is_none() {
            enriched.website = details.website.as_deref().and_then(normalize_website);
        }
        enriched
    }

    async fn locate(&self, candidate: &Candidate, query: &GenerativeQuery, id: String) -> Option<Accommodation> {
        let by_name = format!("{} {}", candidate.name, query.city);
        let lookups: Vec<&str> = candidate
            .address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .into_iter()
            .chain([by_name.as_str()])
            .collect();

        let mut accommodation = Accommodation::new(id, &candidate.name, AccommodationType::YouthMovement, Source::Generative);
        accommodation.address = candidate.address.clone();
        accommodation.city = Some(query.city.clone()).filter(|c| !c.is_empty());
        accommodation.country = Some(query.country.clone()).filter(|c| !c.is_empty());
        accommodation.website = candidate.website.as_deref().and_then(normalize_website);

        let mut position = None;
        for lookup in lookups {
            position = self.geocoder.geocode(lookup).await;
            if position.is_some() {
                break;
            }
            debug!(name = %candidate.name, %lookup, "Geocoding generative result failed");
        }

        match position {
            Some(position) => {
                let accommodation = accommodation.placed_at(position, query.center);
                match accommodation.distance {
                    Some(distance) if distance <= query.radius_km => Some(accommodation),
                    _ => {
                        debug!(name = %candidate.name, "Generative result outside radius");
                        None
                    }
                }
            }
            None => {
                // Kept so the user can look it up by hand
                let mut pinned = accommodation.placed_at(query.center, query.center);
                pinned.approximate_location = true;
                Some(pinned)
            }
        }
    }
}

/// Per-type terms first, then the generic phrasings, without repeats.
pub fn search_terms(city: &str, known_types: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    known_types
        .iter()
        .map(|kind| format!("{} {}", kind.trim(), city))
        .chain(GENERIC_PHRASES.iter().map(|phrase| phrase.replace("{city}", city)))
        .filter(|term| seen.insert(term.to_lowercase()))
        .collect()
}

pub fn known_types_prompt(country: &str) -> String {
    format!(
        "List the main kinds of youth organizations active in {country}, such as youth movements \
         and scouting or guiding associations, using the names people in {country} use for them. \
         Respond ONLY with a JSON array of short names, for example [\"Chiro\", \"Scouts\"]. \
         No explanation, no Markdown."
    )
}

pub fn search_prompt(term: &str, city: &str, country: &str) -> String {
    format!(
        "Search query: \"{term}\".\n\
         List real organizations in or near {city}, {country} that match this query and that own or \
         rent out premises suitable for a youth group stay.\n\
         Respond ONLY with a JSON array of objects with the fields \"name\" (required), \"address\" \
         (optional, full postal address) and \"website\" (optional).\n\
         NEVER invent or guess a website URL. If you are not certain of the exact website, omit the \
         \"website\" field entirely. Omit \"address\" too when you do not know it.\n\
         If you know no matching organizations, respond with []."
    )
}

fn enrichment_prompt(accommodation: &Accommodation) -> String {
    let place = [accommodation.address.as_deref(), accommodation.city.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Give practical details about the group accommodation \"{}\" ({}), located at {}.\n\
         Respond ONLY with a JSON object with the optional fields \"description\" (string), \
         \"capacity\" (number of people), \"priceRange\" (string), \"amenities\" (array of strings) \
         and \"website\" (string). Omit every field you are not certain about; NEVER guess a website.",
        accommodation.name,
        accommodation.kind,
        if place.is_empty() { "an unknown address" } else { place.as_str() },
    )
}

#[async_trait]
impl GenerativeSearch for GenerativeSource {
    async fn known_types(&self, country: &str) -> Vec<String> {
        if country.trim().is_empty() {
            return Vec::new();
        }
        match self.model.complete(&known_types_prompt(country)).await {
            Ok(text) => {
                let mut types = candidates::parse_string_list(&text);
                types.truncate(self.max_known_types);
                debug!(country, ?types, "Known organization types");
                types
            }
            Err(e) => {
                warn!(country, error = %e, "Known-type request failed");
                Vec::new()
            }
        }
    }

    async fn search(&self, query: &GenerativeQuery, sink: &mut dyn CandidateSink) -> Vec<Accommodation> {
        let terms = search_terms(&query.city, &query.known_types);
        let mut seen_names = HashSet::new();
        let mut found = Vec::new();

        for term in &terms {
            let prompt = search_prompt(term, &query.city, &query.country);
            let (batch, response_excerpt) = match self.model.complete(&prompt).await {
                Ok(text) => (candidates::parse_candidates(&text), candidates::excerpt(&text, EXCERPT_CHARS)),
                Err(e) => {
                    warn!(%term, error = %e, "Generative search term failed");
                    (Vec::new(), format!("request failed: {e}"))
                }
            };
            debug!(%term, candidates = batch.len(), "Generative search term answered");

            if sink.query_logged(term, &response_excerpt).await.is_break() {
                return found;
            }

            for candidate in batch {
                if !seen_names.insert(candidate.name.to_lowercase()) {
                    continue;
                }
                let id = format!("{}-{}", Source::Generative.id_prefix(), found.len() + 1);
                let Some(accommodation) = self.locate(&candidate, query, id).await else {
                    continue;
                };
                found.push(accommodation.clone());
                if sink.found(accommodation).await.is_break() {
                    return found;
                }
            }
        }

        info!(city = %query.city, terms = terms.len(), found = found.len(), "Generative search finished");
        found
    }
}
