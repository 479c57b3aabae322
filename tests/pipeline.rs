use async_trait::async_trait;
use camp_scout::geo::BucketKey;
use camp_scout::models::{Accommodation, AccommodationType, Coordinate, Source};
use camp_scout::sources::{
    AccommodationSource, CandidateSink, GenerativeQuery, GenerativeSearch, Geocoder, Place, PlaceAddress,
};
use camp_scout::{Pipeline, SearchError, SearchEvent, SearchStage, SourceError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const TORHOUT: Coordinate = Coordinate { lat: 51.0697, lon: 3.1040 };

/// Point `km` kilometres due north of Torhout
fn north_of_torhout(km: f64) -> Coordinate {
    Coordinate::new(TORHOUT.lat + km / 111.195, TORHOUT.lon)
}

fn entity(id: &str, name: &str, kind: AccommodationType, source: Source, km_north: f64) -> Accommodation {
    Accommodation::new(id, name, kind, source).placed_at(north_of_torhout(km_north), TORHOUT)
}

struct MockGeocoder {
    places: HashMap<String, Coordinate>,
    country: Option<&'static str>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    fn knowing(places: &[(&str, Coordinate)]) -> Arc<Self> {
        Arc::new(Self {
            places: places.iter().map(|(q, c)| (q.to_string(), *c)).collect(),
            country: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn in_country(places: &[(&str, Coordinate)], country: &'static str) -> Arc<Self> {
        Arc::new(Self {
            places: places.iter().map(|(q, c)| (q.to_string(), *c)).collect(),
            country: Some(country),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Place>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .places
            .get(query)
            .map(|c| Place {
                place_id: 1,
                osm_type: None,
                osm_id: None,
                lat: c.lat.to_string(),
                lon: c.lon.to_string(),
                display_name: query.to_string(),
                address: HashMap::new(),
            })
            .into_iter()
            .collect())
    }

    async fn reverse(&self, _position: Coordinate) -> Result<Option<PlaceAddress>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.country.map(|country| PlaceAddress {
            address: HashMap::from([("country".to_string(), country.to_string())]),
        }))
    }
}

struct MockSource {
    name: &'static str,
    results: Result<Vec<Accommodation>, u16>,
    calls: AtomicUsize,
}

impl MockSource {
    fn returning(name: &'static str, results: Vec<Accommodation>) -> Arc<Self> {
        Arc::new(Self {
            name,
            results: Ok(results),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            results: Err(503),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AccommodationSource for MockSource {
    async fn search(&self, _center: Coordinate, _radius_km: f64) -> Result<Vec<Accommodation>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.results {
            Ok(results) => Ok(results.clone()),
            Err(status) => Err(SourceError::Unavailable {
                source_name: self.name,
                status: *status,
            }),
        }
    }

    fn source_name(&self) -> &'static str {
        self.name
    }
}

struct MockGenerative {
    results: Vec<Accommodation>,
    calls: AtomicUsize,
    queries: Mutex<Vec<GenerativeQuery>>,
}

impl MockGenerative {
    fn returning(results: Vec<Accommodation>) -> Arc<Self> {
        Arc::new(Self {
            results,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl GenerativeSearch for MockGenerative {
    async fn known_types(&self, _country: &str) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        vec!["Chiro".to_string(), "KSA".to_string()]
    }

    async fn search(&self, query: &GenerativeQuery, sink: &mut dyn CandidateSink) -> Vec<Accommodation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        let mut found = Vec::new();
        for accommodation in &self.results {
            let _ = sink.query_logged("Chiro Torhout", "[...]").await;
            found.push(accommodation.clone());
            if sink.found(accommodation.clone()).await.is_break() {
                break;
            }
        }
        found
    }
}

fn torhout_geocoder() -> Arc<MockGeocoder> {
    MockGeocoder::knowing(&[("Torhout, België", TORHOUT)])
}

fn assert_final_invariants(results: &[Accommodation], radius_km: f64) {
    let mut buckets = HashSet::new();
    let mut ids = HashSet::new();
    for a in results {
        assert!(a.distance.unwrap() <= radius_km + 1e-9, "{} outside radius", a.name);
        assert!(buckets.insert(BucketKey::of(a).expect("placed")), "{} shares a bucket", a.name);
        assert!(ids.insert(a.id.clone()), "duplicate id {}", a.id);
        assert!(AccommodationType::ALL.contains(&a.kind));
    }
}

#[tokio::test]
async fn torhout_scenario_keeps_most_complete_duplicate() {
    let mut hostel = entity("osm-node-1", "Jeugdherberg Torhout", AccommodationType::Hostel, Source::Overpass, 5.0);
    hostel.website = Some("https://jeugdherberg-torhout.be".into());

    let mut club = entity("nominatim-7", "Chiro Torhout", AccommodationType::YouthMovement, Source::Nominatim, 3.0);
    club.address = Some("Bosstraat 3, 8820 Torhout".into());

    let mut ai_club = club.clone();
    ai_club.id = "ai-1".into();
    ai_club.source = Source::Generative;
    ai_club.website = Some("https://chiro-torhout.be".into());

    let generative = MockGenerative::returning(vec![ai_club]);
    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::returning("spatial", vec![hostel]),
        MockSource::returning("address", vec![club]),
        generative.clone(),
    );

    let response = pipeline.search("Torhout, België", 25.0, None).await.unwrap();

    assert_eq!(response.results.len(), 2);
    assert_final_invariants(&response.results, 25.0);
    let youth = response.of_type(AccommodationType::YouthMovement);
    assert_eq!(youth.len(), 1);
    assert_eq!(youth[0].id, "ai-1");
    assert_eq!(youth[0].completeness_score(), 2);
    assert_eq!(response.count(AccommodationType::Hostel), 1);
    assert_eq!(response.search_coordinates, Some(TORHOUT));

    let queries = generative.queries.lock().unwrap();
    let query = &queries[0];
    assert_eq!(query.city, "Torhout");
    assert_eq!(query.country, "België");
    assert_eq!(query.known_types, ["Chiro", "KSA"]);
}

#[tokio::test]
async fn unknown_location_fails_without_touching_sources() {
    let spatial = MockSource::returning("spatial", vec![]);
    let address = MockSource::returning("address", vec![]);
    let generative = MockGenerative::returning(vec![]);
    let geocoder = MockGeocoder::knowing(&[]);
    let pipeline = Pipeline::new(geocoder.clone(), spatial.clone(), address.clone(), generative.clone());

    let err = pipeline.search("Nergensdorp", 25.0, None).await.unwrap_err();

    assert!(matches!(err, SearchError::LocationNotFound(ref l) if l == "Nergensdorp"));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(spatial.calls.load(Ordering::SeqCst), 0);
    assert_eq!(address.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generative.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_spatial_source_degrades_silently() {
    let mut club = entity("nominatim-1", "KSA Torhout", AccommodationType::YouthMovement, Source::Nominatim, 2.0);
    club.address = Some("Oostendestraat 1, Torhout".into());
    let ai = entity("ai-1", "Patro Torhout", AccommodationType::YouthMovement, Source::Generative, 8.0);

    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::failing("spatial"),
        MockSource::returning("address", vec![club]),
        MockGenerative::returning(vec![ai]),
    );

    let response = pipeline.search("Torhout, België", 25.0, None).await.unwrap();

    assert_eq!(response.results.len(), 2);
    assert!(response
        .logs
        .iter()
        .any(|line| line.contains("Map features: unavailable") && line.contains("0 results")));
}

#[tokio::test]
async fn out_of_radius_and_unplaceable_entities_are_dropped() {
    let near = entity("osm-node-1", "Camping Wijnendale", AccommodationType::Camping, Source::Overpass, 4.0);
    let far = entity("osm-node-2", "Camping De Haan", AccommodationType::Camping, Source::Overpass, 30.0);
    let unplaced = Accommodation::new("osm-node-3", "Camping Nergens", AccommodationType::Camping, Source::Overpass);

    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::returning("spatial", vec![near, far, unplaced]),
        MockSource::returning("address", vec![]),
        MockGenerative::returning(vec![]),
    );

    let response = pipeline.search("Torhout, België", 25.0, None).await.unwrap();
    let names: Vec<&str> = response.results.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Camping Wijnendale"]);
    assert_final_invariants(&response.results, 25.0);
}

#[tokio::test]
async fn progress_follows_source_order() {
    let hostel = entity("osm-node-1", "Hostel", AccommodationType::Hostel, Source::Overpass, 1.0);
    let club = entity("nominatim-1", "Chiro", AccommodationType::YouthMovement, Source::Nominatim, 2.0);
    let ai = entity("ai-1", "KSA", AccommodationType::YouthMovement, Source::Generative, 3.0);

    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::returning("spatial", vec![hostel]),
        MockSource::returning("address", vec![club]),
        MockGenerative::returning(vec![ai]),
    );

    let (mut events, handle) = pipeline.spawn_search("Torhout, België", 25.0);
    let mut stages = Vec::new();
    let mut progress_sizes = Vec::new();
    let mut generative_queries = 0;
    while let Some(event) = events.recv().await {
        match event {
            SearchEvent::Stage { stage } => stages.push(stage),
            SearchEvent::Progress { results, .. } => progress_sizes.push(results.len()),
            SearchEvent::GenerativeQuery { .. } => generative_queries += 1,
        }
    }
    let response = handle.await.unwrap().unwrap();

    assert_eq!(
        stages,
        [
            SearchStage::Geocoding,
            SearchStage::SourceSpatial,
            SearchStage::SourceAddress,
            SearchStage::SourceGenerative,
            SearchStage::Deduplicating,
            SearchStage::Done,
        ]
    );
    // spatial, address, the live generative result, end of generative
    assert_eq!(progress_sizes, [1, 2, 3, 3]);
    assert_eq!(generative_queries, 1);
    assert_eq!(response.results.len(), 3);
}

#[tokio::test]
async fn dropping_the_receiver_cancels_the_search() {
    let generative = MockGenerative::returning(vec![]);
    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::returning("spatial", vec![]),
        MockSource::returning("address", vec![]),
        generative.clone(),
    );

    let (events, handle) = pipeline.spawn_search("Torhout, België", 25.0);
    drop(events);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));
    assert_eq!(generative.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn category_search_only_returns_requested_type() {
    let hostel = entity("osm-node-1", "Hostel", AccommodationType::Hostel, Source::Overpass, 1.0);
    let camping = entity("osm-node-2", "Camping", AccommodationType::Camping, Source::Overpass, 2.0);
    let address = MockSource::returning("address", vec![]);
    let generative = MockGenerative::returning(vec![]);

    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::returning("spatial", vec![hostel, camping]),
        address.clone(),
        generative.clone(),
    );

    let response = pipeline
        .search_category("Torhout, België", 25.0, AccommodationType::Camping, None)
        .await
        .unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].kind, AccommodationType::Camping);
    assert_eq!(address.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generative.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_radius_is_rejected() {
    let pipeline = Pipeline::new(
        torhout_geocoder(),
        MockSource::returning("spatial", vec![]),
        MockSource::returning("address", vec![]),
        MockGenerative::returning(vec![]),
    );
    assert!(matches!(
        pipeline.search("Torhout, België", 0.0, None).await,
        Err(SearchError::InvalidRadius(_))
    ));
}

#[tokio::test]
async fn looked_up_country_wins_over_trailing_province() {
    let generative = MockGenerative::returning(vec![]);
    let pipeline = Pipeline::new(
        MockGeocoder::in_country(&[("Torhout, West-Vlaanderen", TORHOUT)], "België / Belgique / Belgien"),
        MockSource::returning("spatial", vec![]),
        MockSource::returning("address", vec![]),
        generative.clone(),
    );

    pipeline.search("Torhout, West-Vlaanderen", 25.0, None).await.unwrap();

    let queries = generative.queries.lock().unwrap();
    assert_eq!(queries[0].city, "Torhout");
    assert_eq!(queries[0].country, "België / Belgique / Belgien");
}
