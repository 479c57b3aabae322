use crate::error::SearchError;
use crate::models::{Accommodation, AccommodationType, Coordinate, SearchResponse};
use crate::pipeline::events::{SearchEvent, SearchStage};
use crate::pipeline::merge::FirstWriterSet;
use crate::sources::traits::CandidateSink;
use async_trait::async_trait;
use chrono::Local;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Radius comparisons tolerate this much floating-point error
const RADIUS_EPSILON_KM: f64 = 1e-9;

/// State of one search invocation. Discarded when the search returns.
pub(crate) struct SearchSession {
    radius_km: f64,
    only: Option<AccommodationType>,
    origin: Option<Coordinate>,
    /// Every accepted entity from every source, in arrival order
    accumulated: Vec<Accommodation>,
    merged: FirstWriterSet,
    logs: Vec<String>,
    stage: SearchStage,
    events: Option<mpsc::Sender<SearchEvent>>,
    cancelled: bool,
}

impl SearchSession {
    pub fn new(radius_km: f64, only: Option<AccommodationType>, events: Option<mpsc::Sender<SearchEvent>>) -> Self {
        Self {
            radius_km,
            only,
            origin: None,
            accumulated: Vec::new(),
            merged: FirstWriterSet::default(),
            logs: Vec::new(),
            stage: SearchStage::Idle,
            events,
            cancelled: false,
        }
    }

    pub fn set_origin(&mut self, origin: Coordinate) {
        self.origin = Some(origin);
    }

    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!(stage = %self.stage, "{line}");
        self.logs.push(format!("[{}] {}", Local::now().format("%H:%M:%S"), line));
    }

    pub fn accumulated(&self) -> &[Accommodation] {
        &self.accumulated
    }

    pub fn merged_len(&self) -> usize {
        self.merged.len()
    }

    /// Errors once the event receiver has gone away.
    pub fn checkpoint(&self) -> Result<(), SearchError> {
        if self.cancelled {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn emit(&mut self, event: SearchEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if events.send(event).await.is_err() {
            debug!("Event receiver dropped, cancelling search");
            self.cancelled = true;
            self.events = None;
        }
    }

    pub async fn enter(&mut self, stage: SearchStage) {
        self.stage = stage;
        self.emit(SearchEvent::Stage { stage }).await;
    }

    pub async fn publish_progress(&mut self) {
        if self.events.is_none() {
            return;
        }
        let event = SearchEvent::Progress {
            results: self.merged.items().to_vec(),
            logs: self.logs.clone(),
        };
        self.emit(event).await;
    }

    fn within_radius(&self, accommodation: &Accommodation) -> bool {
        let distance = accommodation.distance.or_else(|| {
            let origin = self.origin?;
            let position = accommodation.coordinate()?;
            Some(crate::geo::distance_km(origin.lat, origin.lon, position.lat, position.lon))
        });
        distance.is_some_and(|d| d <= self.radius_km + RADIUS_EPSILON_KM)
    }

    /// Takes one entity from a source.
    ///
    /// Unplaceable, out-of-radius and (for category searches) off-type entities
    /// are refused. Returns whether the running merged view grew.
    pub fn fold(&mut self, accommodation: &Accommodation) -> bool {
        if !accommodation.is_placeable() || !self.within_radius(accommodation) {
            return false;
        }
        if self.only.is_some_and(|kind| kind != accommodation.kind) {
            return false;
        }
        self.accumulated.push(accommodation.clone());
        self.merged.insert(accommodation)
    }

    /// Folds a whole batch, returning how many entered the merged view.
    pub fn fold_all(&mut self, batch: &[Accommodation]) -> usize {
        batch.iter().filter(|a| self.fold(a)).count()
    }

    pub fn finish(self, results: Vec<Accommodation>, origin: Coordinate) -> SearchResponse {
        SearchResponse::new(results, origin, self.logs)
    }
}

#[async_trait]
impl CandidateSink for SearchSession {
    async fn query_logged(&mut self, prompt_summary: &str, response_excerpt: &str) -> ControlFlow<()> {
        self.log(format!("Generative query \"{prompt_summary}\" answered"));
        self.emit(SearchEvent::GenerativeQuery {
            prompt_summary: prompt_summary.to_string(),
            response_excerpt: response_excerpt.to_string(),
        })
        .await;
        if self.cancelled {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    async fn found(&mut self, accommodation: Accommodation) -> ControlFlow<()> {
        if self.fold(&accommodation) {
            self.publish_progress().await;
        }
        if self.cancelled {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    const ORIGIN: Coordinate = Coordinate { lat: 51.0697, lon: 3.1040 };

    fn hostel(id: &str, lat: f64) -> Accommodation {
        Accommodation::new(id, id, AccommodationType::Hostel, Source::Overpass).placed_at(Coordinate::new(lat, ORIGIN.lon), ORIGIN)
    }

    #[test]
    fn fold_enforces_radius_and_placement() {
        let mut session = SearchSession::new(10.0, None, None);
        session.set_origin(ORIGIN);
        assert!(session.fold(&hostel("near", 51.1)));
        assert!(!session.fold(&hostel("far", 51.5)));
        assert!(!session.fold(&Accommodation::new("x", "x", AccommodationType::Hostel, Source::Generative)));
        assert_eq!(session.accumulated().len(), 1);
    }

    #[test]
    fn duplicates_are_accumulated_but_not_merged() {
        let mut session = SearchSession::new(10.0, None, None);
        session.set_origin(ORIGIN);
        assert_eq!(session.fold_all(&[hostel("a", 51.1), hostel("b", 51.101)]), 1);
        assert_eq!(session.accumulated().len(), 2);
        assert_eq!(session.merged_len(), 1);
    }

    #[test]
    fn category_session_refuses_other_types() {
        let mut session = SearchSession::new(10.0, Some(AccommodationType::Camping), None);
        session.set_origin(ORIGIN);
        assert!(!session.fold(&hostel("a", 51.1)));
    }

    #[tokio::test]
    async fn dropped_receiver_cancels() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut session = SearchSession::new(10.0, None, Some(tx));
        assert!(session.checkpoint().is_ok());
        session.enter(SearchStage::Geocoding).await;
        assert!(matches!(session.checkpoint(), Err(SearchError::Cancelled)));
    }

    #[test]
    fn log_lines_are_timestamped() {
        let mut session = SearchSession::new(10.0, None, None);
        session.log("Geocoding Torhout");
        let origin = ORIGIN;
        let response = session.finish(Vec::new(), origin);
        assert_eq!(response.logs.len(), 1);
        assert!(response.logs[0].starts_with('['));
        assert!(response.logs[0].ends_with("Geocoding Torhout"));
    }
}
