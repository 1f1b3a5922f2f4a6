use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Converted temperatures outside this band are treated as a provider fault.
pub const PLAUSIBLE_CELSIUS: std::ops::RangeInclusive<f64> = -95.0..=65.0;

/// Convert Kelvin to Celsius, rounded to 2 decimal places.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    round2(kelvin - KELVIN_OFFSET)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One normalized weather observation for a city.
///
/// Immutable once stored; the store never updates or deletes readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub city: String,
    /// Provider vocabulary, e.g. "Clouds", "Rain", "Haze"
    pub condition: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    /// Unix seconds as reported by the provider
    pub observed_at: i64,
}

impl Reading {
    /// Observation time as a UTC timestamp, if representable.
    pub fn observed_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.observed_at, 0)
    }
}

/// A reading paired with the city it was requested for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityReading {
    pub city: String,
    pub reading: Reading,
}

/// Aggregate over every stored reading for one city.
///
/// Computed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub avg_temp_c: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub dominant_condition: String,
}

impl DailySummary {
    /// Summarize readings in the order given.
    ///
    /// Returns `None` for an empty slice. When several conditions are equally
    /// frequent, the one that appears first in `readings` wins.
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        let first = readings.first()?;

        let mut sum = 0.0;
        let mut max = first.temperature_c;
        let mut min = first.temperature_c;
        // (condition, count) in first-seen order
        let mut counts: Vec<(&str, usize)> = Vec::new();

        for reading in readings {
            sum += reading.temperature_c;
            max = max.max(reading.temperature_c);
            min = min.min(reading.temperature_c);

            match counts.iter_mut().find(|(c, _)| *c == reading.condition) {
                Some((_, n)) => *n += 1,
                None => counts.push((reading.condition.as_str(), 1)),
            }
        }

        let mut dominant = counts[0];
        for entry in &counts[1..] {
            if entry.1 > dominant.1 {
                dominant = *entry;
            }
        }

        Some(Self {
            avg_temp_c: round2(sum / readings.len() as f64),
            max_temp_c: max,
            min_temp_c: min,
            dominant_condition: dominant.0.to_string(),
        })
    }
}

/// Live, richer snapshot of current conditions. Not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedConditions {
    /// City name as resolved by the provider
    pub city: String,
    pub temperature_c: f64,
    pub max_temperature_c: f64,
    pub min_temperature_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub dominant_condition: String,
    pub condition_reason: String,
}
