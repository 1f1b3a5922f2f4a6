use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};
use weatherwatch_core::{FetchError, StoreError};
use weatherwatch_services::AlertRequest;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    /// Comma separated; defaults to the configured city list
    pub cities: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub(crate) fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    json_response(&ErrorBody { error: message }, status)
}

fn store_failure(err: &StoreError) -> Response {
    tracing::error!("Request failed: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.user_message())
}

/// City names are taken verbatim; only empty segments are dropped.
fn split_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_city(query: &CityQuery) -> Option<String> {
    query
        .city
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

pub async fn health() -> Result<Response, Rejection> {
    Ok(json_response(&serde_json::json!({ "status": "ok" }), StatusCode::OK))
}

pub async fn latest(query: LatestQuery, state: AppState) -> Result<Response, Rejection> {
    let cities = match query.cities.as_deref() {
        Some(raw) => split_cities(raw),
        None => (*state.cities).clone(),
    };

    Ok(match state.query.latest_all(&cities).await {
        Ok(readings) => json_response(&readings, StatusCode::OK),
        Err(e) => store_failure(&e),
    })
}

pub async fn newest(state: AppState) -> Result<Response, Rejection> {
    Ok(match state.query.latest_overall().await {
        Ok(Some(reading)) => json_response(&reading, StatusCode::OK),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No readings stored yet"),
        Err(e) => store_failure(&e),
    })
}

pub async fn summary(query: CityQuery, state: AppState) -> Result<Response, Rejection> {
    let city = required_city(&query).unwrap_or_else(|| state.summary_city.to_string());

    Ok(match state.query.daily_summary(&city).await {
        Ok(Some(summary)) => json_response(&summary, StatusCode::OK),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No readings for this city"),
        Err(e) => store_failure(&e),
    })
}

pub async fn dashboard(state: AppState) -> Result<Response, Rejection> {
    Ok(
        match state.query.dashboard(&state.cities, &state.summary_city).await {
            Ok(dashboard) => json_response(&dashboard, StatusCode::OK),
            Err(e) => store_failure(&e),
        },
    )
}

pub async fn create_alert(request: AlertRequest, state: AppState) -> Result<Response, Rejection> {
    if request.city.is_empty() {
        return Ok(error_response(StatusCode::BAD_REQUEST, "city is required"));
    }
    if request.recipient.trim().is_empty() {
        return Ok(error_response(StatusCode::BAD_REQUEST, "recipient is required"));
    }
    if !request.threshold_c.is_finite() {
        return Ok(error_response(StatusCode::BAD_REQUEST, "threshold_c must be a number"));
    }

    Ok(match state.alerts.evaluate(&request).await {
        Ok(outcome) => json_response(&outcome, StatusCode::OK),
        Err(e) => store_failure(&e),
    })
}

pub async fn conditions(query: CityQuery, state: AppState) -> Result<Response, Rejection> {
    let Some(city) = required_city(&query) else {
        return Ok(error_response(StatusCode::BAD_REQUEST, "city is required"));
    };

    Ok(match state.fetcher.fetch_detailed(&city).await {
        Ok(conditions) => json_response(&conditions, StatusCode::OK),
        Err(e @ FetchError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, e.user_message()),
        Err(e) => {
            tracing::warn!(city = %city, kind = %e.kind(), "Live conditions unavailable: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.user_message())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_cities_keeps_names_verbatim() {
        assert_eq!(split_cities("Delhi,,Mumbai,"), vec!["Delhi", "Mumbai"]);
        assert_eq!(split_cities(" Delhi,Mumbai "), vec![" Delhi", "Mumbai "]);
        assert!(split_cities("").is_empty());
    }

    #[test]
    fn test_required_city() {
        let empty = CityQuery {
            city: Some(String::new()),
        };
        assert_eq!(required_city(&empty), None);
        assert_eq!(required_city(&CityQuery { city: None }), None);
        let padded = CityQuery {
            city: Some(" Pune ".into()),
        };
        assert_eq!(required_city(&padded), Some(" Pune ".to_string()));
    }
}
