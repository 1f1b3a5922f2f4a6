//! Read-side views over stored readings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use weatherwatch_core::StoreError;
use weatherwatch_weather::{CityReading, DailySummary, Reading};

use crate::store::{run_blocking, ReadingStore};

/// Latest readings for a city list plus the summary for one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub readings: Vec<CityReading>,
    pub summary_city: String,
    pub summary: Option<DailySummary>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn ReadingStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// Latest reading per city, in the order given. Cities with no readings
    /// are left out.
    pub async fn latest_all(&self, cities: &[String]) -> Result<Vec<CityReading>, StoreError> {
        let cities = cities.to_vec();
        run_blocking(&self.store, move |s| {
            let mut out = Vec::with_capacity(cities.len());
            for city in cities {
                if let Some(reading) = s.latest(&city)? {
                    out.push(CityReading { city, reading });
                }
            }
            Ok(out)
        })
        .await
    }

    pub async fn daily_summary(&self, city: &str) -> Result<Option<DailySummary>, StoreError> {
        let city = city.to_string();
        run_blocking(&self.store, move |s| s.daily_summary(&city)).await
    }

    pub async fn latest_overall(&self) -> Result<Option<Reading>, StoreError> {
        run_blocking(&self.store, |s| s.latest_overall()).await
    }

    pub async fn dashboard(
        &self,
        cities: &[String],
        summary_city: &str,
    ) -> Result<Dashboard, StoreError> {
        let readings = self.latest_all(cities).await?;
        let summary = self.daily_summary(summary_city).await?;
        Ok(Dashboard {
            readings,
            summary_city: summary_city.to_string(),
            summary,
            generated_at: Utc::now(),
        })
    }
}
