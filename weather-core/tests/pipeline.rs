//! End-to-end: OpenWeather over a mock server, file-backed store, queries.

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use weather_core::{
    FixedClock, Ingestor, JsonFileStore, Observation, ObservationStore, QueryEngine, SkipReason,
    provider::openweather::OpenWeatherProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_city(server: &MockServer, query: &str, name: &str, kelvin: f64) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": name,
            "main": { "temp": kelvin, "humidity": 70 },
            "weather": [{ "description": "overcast clouds" }]
        })))
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, query: &str) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", query))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn batch_skips_recent_fetches_new_and_survives_failures() {
    let server = MockServer::start().await;
    mount_city(&server, "London", "London", 288.15).await;
    mount_missing(&server, "Atlantis").await;

    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("weather_data.json"));
    let now = Utc.with_ymd_and_hms(2024, 4, 20, 15, 0, 0).unwrap();

    let earlier = now - Duration::minutes(10);
    store
        .append(&Observation {
            location: "Paris".to_string(),
            temperature_c: 16.0,
            description: "clear sky".to_string(),
            humidity: 45,
            observed_at_utc: earlier,
            observed_at_local: earlier.naive_utc(),
        })
        .unwrap();

    let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri()).unwrap();
    let clock = FixedClock(now);

    let report = Ingestor::new(&provider, &store, &clock)
        .fetch_and_log(&["Paris", " London ", "paris", "Atlantis"])
        .await
        .unwrap();

    assert_eq!(report.fetched_count(), 1);
    assert_eq!(report.logged[0].location, "London");
    assert_eq!(report.logged[0].temperature_c, 15.0);
    assert_eq!(report.skipped_count(), 2);
    assert!(report.skipped.iter().all(|s| s.reason == SkipReason::RecentlyLogged));
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failed[0].location, "Atlantis");
    assert!(report.failed[0].error.is_not_found());

    let stored = store.load();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.last(), report.logged.last());

    let engine = QueryEngine::new(&store, &clock);
    let averages = engine.average_by_location().unwrap();
    assert_eq!(averages.get("Paris"), Some(&16.0));
    assert_eq!(averages.get("London"), Some(&15.0));

    let extremes = engine.extremes(Some(Duration::hours(24))).unwrap().unwrap();
    assert_eq!(extremes.hottest.location, "Paris");
    assert_eq!(extremes.coldest.location, "London");

    let series = engine.series_for_location("PARIS").unwrap();
    assert_eq!(series.len(), 1);
}

#[tokio::test]
async fn second_batch_within_window_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Berlin",
            "main": { "temp": 280.0, "humidity": 60 },
            "weather": [{ "description": "mist" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("weather_data.json"));
    let provider = OpenWeatherProvider::with_base_url("KEY".into(), server.uri()).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 4, 20, 15, 0, 0).unwrap();

    let first = FixedClock(start);
    Ingestor::new(&provider, &store, &first).fetch_and_log(&["Berlin"]).await.unwrap();

    let later = FixedClock(start + Duration::minutes(90));
    let report = Ingestor::new(&provider, &store, &later).fetch_and_log(&["berlin"]).await.unwrap();

    assert_eq!(report.fetched_count(), 0);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(store.load().len(), 1);
}

#[tokio::test]
async fn queries_report_unreadable_store_as_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("weather_data.json");
    std::fs::write(&path, "{ definitely not a list").unwrap();

    let store = JsonFileStore::new(&path);
    let clock = FixedClock(Utc::now());
    let engine = QueryEngine::new(&store, &clock);

    assert!(engine.all_sorted_desc().is_err());
    assert!(engine.extremes(None).is_err());
    assert!(store.load().is_empty());
}
