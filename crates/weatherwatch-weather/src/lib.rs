//! Weather readings for WeatherWatch
//!
//! Domain types for stored readings and summaries, plus the OpenWeather
//! client that produces them.

pub mod provider;
pub mod types;

pub use provider::{OpenWeatherProvider, ReadingFetcher};
pub use types::*;
