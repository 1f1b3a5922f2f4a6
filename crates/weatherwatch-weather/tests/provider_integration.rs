//! Integration tests for OpenWeatherProvider using wiremock.

#![allow(clippy::unwrap_used)]

use std::time::Duration;
use weatherwatch_core::FetchError;
use weatherwatch_weather::{OpenWeatherProvider, ReadingFetcher};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build a provider response body with temperatures in Kelvin
fn current_weather(name: &str, condition: &str, temp_k: f64, feels_like_k: f64) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "dt": 1_700_000_000,
        "main": {
            "temp": temp_k,
            "feels_like": feels_like_k,
            "temp_min": temp_k - 1.0,
            "temp_max": temp_k + 1.0,
            "humidity": 62
        },
        "weather": [
            { "main": condition, "description": "haze over the city" }
        ],
        "wind": { "speed": 3.6 }
    })
}

fn provider(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::new(
        "test-key",
        format!("{}/data/2.5/weather", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_converts_kelvin_to_celsius() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Delhi"))
        .and(query_param("appid", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(current_weather("Delhi", "Haze", 303.15, 305.0)),
        )
        .mount(&mock_server)
        .await;

    let reading = provider(&mock_server).fetch("Delhi").await.unwrap();

    assert_eq!(reading.city, "Delhi");
    assert_eq!(reading.condition, "Haze");
    assert_eq!(reading.temperature_c, 30.0);
    assert_eq!(reading.feels_like_c, 31.85);
    assert_eq!(reading.observed_at, 1_700_000_000);
}

#[tokio::test]
async fn test_fetch_keeps_requested_city_name_exactly() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", " Delhi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(current_weather("Delhi", "Haze", 303.15, 305.0)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let reading = provider(&mock_server).fetch(" Delhi").await.unwrap();

    // Stored under the requested name, not the provider's canonical one.
    assert_eq!(reading.city, " Delhi");
}

#[tokio::test]
async fn test_fetch_unknown_city_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Atlantis").await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
}

#[tokio::test]
async fn test_fetch_server_error_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::Unavailable(_)));
}

#[tokio::test]
async fn test_fetch_unauthorized_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::Unavailable(_)));
}

#[tokio::test]
async fn test_fetch_missing_temperature_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "dt": 1_700_000_000,
            "main": { "humidity": 40 },
            "weather": [{ "main": "Clear", "description": "clear sky" }]
        })))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_fetch_empty_weather_list_is_malformed() {
    let mock_server = MockServer::start().await;

    let mut body = current_weather("Delhi", "Clear", 300.0, 300.0);
    body["weather"] = serde_json::json!([]);

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_fetch_celsius_passed_as_kelvin_is_malformed() {
    let mock_server = MockServer::start().await;

    // 30 "Kelvin" converts to about -243 °C
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(current_weather("Delhi", "Clear", 30.0, 30.0)),
        )
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_fetch_non_json_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let err = provider(&mock_server).fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_fetch_detailed_conditions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Mumbai"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(current_weather("Mumbai", "Haze", 303.15, 305.0)),
        )
        .mount(&mock_server)
        .await;

    let conditions = provider(&mock_server).fetch_detailed("Mumbai").await.unwrap();

    assert_eq!(conditions.city, "Mumbai");
    assert_eq!(conditions.temperature_c, 30.0);
    assert_eq!(conditions.max_temperature_c, 31.0);
    assert_eq!(conditions.min_temperature_c, 29.0);
    assert_eq!(conditions.humidity_pct, 62);
    assert_eq!(conditions.wind_speed_mps, 3.6);
    assert_eq!(conditions.dominant_condition, "Haze");
    assert_eq!(conditions.condition_reason, "haze over the city");
}

#[tokio::test]
async fn test_unreachable_provider_is_unavailable() {
    // Nothing listens on the discard port
    let provider = OpenWeatherProvider::new(
        "test-key",
        "http://127.0.0.1:9/data/2.5/weather",
        Duration::from_secs(2),
    )
    .unwrap();

    let err = provider.fetch("Delhi").await.unwrap_err();
    assert!(matches!(err, FetchError::Unavailable(_)));
}
