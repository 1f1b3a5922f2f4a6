//! Periodic polling of the provider into the reading store.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use weatherwatch_core::{FetchErrorKind, StoreError};
use weatherwatch_weather::ReadingFetcher;

use crate::store::{run_blocking, ReadingStore};

/// Where the scheduler is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Sleeping between cycles, or not started.
    Idle,
    /// Fetching and storing the city list.
    Cycling,
}

/// Why a city produced no stored reading in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFailure {
    Fetch(FetchErrorKind),
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityFailure {
    pub city: String,
    pub reason: CycleFailure,
}

/// Result of one pass over the city list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Cities whose reading was stored, in poll order
    pub stored: Vec<String>,
    pub failed: Vec<CityFailure>,
}

pub struct PollScheduler {
    fetcher: Arc<dyn ReadingFetcher>,
    store: Arc<dyn ReadingStore>,
    cities: Vec<String>,
    interval: Duration,
    state: Mutex<SchedulerState>,
}

impl PollScheduler {
    pub fn new(
        fetcher: Arc<dyn ReadingFetcher>,
        store: Arc<dyn ReadingStore>,
        cities: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            cities,
            interval,
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    /// Fetch and store every configured city once, in order.
    ///
    /// A city that fails to fetch or store is recorded in the report and the
    /// cycle moves on. Only an unreachable store aborts the cycle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` when the store can no longer be reached.
    pub async fn run_one_cycle(&self) -> Result<CycleReport, StoreError> {
        let mut report = CycleReport::default();

        for city in &self.cities {
            let reading = match self.fetcher.fetch(city).await {
                Ok(reading) => reading,
                Err(e) => {
                    tracing::warn!(city = %city, kind = %e.kind(), "Fetch failed: {}", e);
                    report.failed.push(CityFailure {
                        city: city.clone(),
                        reason: CycleFailure::Fetch(e.kind()),
                    });
                    continue;
                }
            };

            match run_blocking(&self.store, move |s| s.insert(&reading)).await {
                Ok(_) => report.stored.push(city.clone()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(city = %city, "Reading lost: {}", e);
                    report.failed.push(CityFailure {
                        city: city.clone(),
                        reason: CycleFailure::Store,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Poll until `cancel` fires: cycle, then sleep for the interval.
    ///
    /// An in-flight cycle is allowed to finish; cancellation is observed
    /// between cycles and during the sleep.
    ///
    /// # Errors
    ///
    /// Returns the store fault that stopped polling.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), StoreError> {
        tracing::info!(
            cities = self.cities.len(),
            interval_secs = self.interval.as_secs(),
            "Poll scheduler started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            *self.state.lock() = SchedulerState::Cycling;
            let result = self.run_one_cycle().await;
            *self.state.lock() = SchedulerState::Idle;

            match result {
                Ok(report) => {
                    tracing::info!(
                        stored = report.stored.len(),
                        failed = report.failed.len(),
                        "Poll cycle complete"
                    );
                }
                Err(e) => {
                    tracing::error!("Poll scheduler stopping: {}", e);
                    return Err(e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Poll scheduler stopped");
        Ok(())
    }
}
