//! HTTP API for WeatherWatch
//!
//! JSON endpoints over the query, alert and live-conditions services.

mod handlers;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};
use weatherwatch_services::{AlertEvaluator, AlertRequest, Notifier, QueryService, ReadingStore};
use weatherwatch_weather::ReadingFetcher;

/// Largest accepted request body.
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub alerts: Arc<AlertEvaluator>,
    pub fetcher: Arc<dyn ReadingFetcher>,
    pub cities: Arc<Vec<String>>,
    pub summary_city: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        fetcher: Arc<dyn ReadingFetcher>,
        notifier: Arc<dyn Notifier>,
        cities: Vec<String>,
        summary_city: &str,
    ) -> Self {
        Self {
            query: QueryService::new(store.clone()),
            alerts: Arc::new(AlertEvaluator::new(store, notifier)),
            fetcher,
            cities: Arc::new(cities),
            summary_city: Arc::from(summary_city),
        }
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Alert requests are accepted as JSON or as an HTML form post.
fn alert_body() -> impl Filter<Extract = (AlertRequest,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(
        warp::body::json::<AlertRequest>()
            .or(warp::body::form::<AlertRequest>())
            .unify(),
    )
}

/// All API routes, with JSON error bodies and request logging.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and_then(handlers::health);

    let latest = warp::path!("api" / "latest")
        .and(warp::get())
        .and(warp::query::<handlers::LatestQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::latest);

    let newest = warp::path!("api" / "latest" / "newest")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::newest);

    let summary = warp::path!("api" / "summary")
        .and(warp::get())
        .and(warp::query::<handlers::CityQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::summary);

    let dashboard = warp::path!("api" / "dashboard")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::dashboard);

    let alerts = warp::path!("api" / "alerts")
        .and(warp::post())
        .and(alert_body())
        .and(with_state(state.clone()))
        .and_then(handlers::create_alert);

    let conditions = warp::path!("api" / "conditions")
        .and(warp::get())
        .and(warp::query::<handlers::CityQuery>())
        .and(with_state(state))
        .and_then(handlers::conditions);

    health
        .or(latest)
        .or(newest)
        .or(summary)
        .or(dashboard)
        .or(alerts)
        .or(conditions)
        .recover(handle_rejection)
        .with(warp::log::custom(|info| {
            tracing::info!(
                method = %info.method(),
                path = info.path(),
                status = info.status().as_u16(),
                elapsed_ms = info.elapsed().as_millis() as u64,
                "HTTP request"
            );
        }))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid request body")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected JSON or form data")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(handlers::error_response(status, message))
}

/// Serve the API on `addr` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), warp::Error> {
    let (bound, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(
        addr,
        async move { shutdown.cancelled().await },
    )?;

    tracing::info!(%bound, "HTTP API listening");
    server.await;
    tracing::info!("HTTP API stopped");
    Ok(())
}
