//! Threshold alerts against the latest stored reading.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weatherwatch_core::StoreError;

use crate::notifier::{AlertNotice, Notifier};
use crate::store::{run_blocking, ReadingStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub city: String,
    pub threshold_c: f64,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub triggered: bool,
    /// Latest stored temperature, `None` when the city has no readings yet
    pub current_temp: Option<f64>,
}

pub struct AlertEvaluator {
    store: Arc<dyn ReadingStore>,
    notifier: Arc<dyn Notifier>,
}

impl AlertEvaluator {
    pub fn new(store: Arc<dyn ReadingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Compare the latest reading for the requested city against the threshold.
    ///
    /// Strictly above the threshold triggers exactly one notification. Whether
    /// delivery succeeds does not change the outcome.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn evaluate(&self, request: &AlertRequest) -> Result<AlertOutcome, StoreError> {
        let city = request.city.clone();
        let latest = run_blocking(&self.store, move |s| s.latest(&city)).await?;

        let Some(reading) = latest else {
            tracing::debug!(city = %request.city, "No readings yet, alert not evaluated");
            return Ok(AlertOutcome {
                triggered: false,
                current_temp: None,
            });
        };

        let current = reading.temperature_c;
        let triggered = current > request.threshold_c;

        if triggered {
            tracing::info!(
                city = %request.city,
                threshold = request.threshold_c,
                current,
                "Threshold exceeded"
            );
            self.notifier
                .notify(&AlertNotice {
                    recipient: request.recipient.clone(),
                    city: request.city.clone(),
                    threshold_c: request.threshold_c,
                    current_temp_c: current,
                })
                .await;
        }

        Ok(AlertOutcome {
            triggered,
            current_temp: Some(current),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::store::{History, InMemoryReadingStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use weatherwatch_weather::Reading;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<AlertNotice>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &AlertNotice) {
            self.sent.lock().push(notice.clone());
        }
    }

    /// Stands in for a notifier whose transport fails; it records the
    /// attempt and reports nothing back.
    #[derive(Default)]
    struct FailingNotifier {
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notice: &AlertNotice) {
            *self.attempts.lock() += 1;
            tracing::error!("simulated SMTP failure");
        }
    }

    struct UnreadableStore;

    impl ReadingStore for UnreadableStore {
        fn insert(&self, _reading: &Reading) -> Result<i64, StoreError> {
            Ok(1)
        }
        fn latest(&self, _city: &str) -> Result<Option<Reading>, StoreError> {
            Err(StoreError::ReadFailed("locked".into()))
        }
        fn history(&self, _city: &str) -> Result<History, StoreError> {
            Err(StoreError::ReadFailed("locked".into()))
        }
        fn latest_overall(&self) -> Result<Option<Reading>, StoreError> {
            Err(StoreError::ReadFailed("locked".into()))
        }
    }

    fn store_with(city: &str, temp: f64) -> Arc<InMemoryReadingStore> {
        let store = Arc::new(InMemoryReadingStore::new());
        store
            .insert(&Reading {
                city: city.to_string(),
                condition: "Clear".to_string(),
                temperature_c: temp,
                feels_like_c: temp,
                observed_at: 1,
            })
            .unwrap();
        store
    }

    fn request(city: &str, threshold: f64) -> AlertRequest {
        AlertRequest {
            city: city.to_string(),
            threshold_c: threshold,
            recipient: "ops@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_below_threshold_does_not_notify() {
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AlertEvaluator::new(store_with("Delhi", 25.0), notifier.clone());

        let outcome = evaluator.evaluate(&request("Delhi", 30.0)).await.unwrap();

        assert!(!outcome.triggered);
        assert_eq!(outcome.current_temp, Some(25.0));
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_above_threshold_notifies_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AlertEvaluator::new(store_with("Delhi", 35.0), notifier.clone());

        let outcome = evaluator.evaluate(&request("Delhi", 30.0)).await.unwrap();

        assert!(outcome.triggered);
        assert_eq!(outcome.current_temp, Some(35.0));
        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            AlertNotice {
                recipient: "ops@example.com".into(),
                city: "Delhi".into(),
                threshold_c: 30.0,
                current_temp_c: 35.0,
            }
        );
    }

    #[tokio::test]
    async fn test_equal_to_threshold_is_not_triggered() {
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AlertEvaluator::new(store_with("Delhi", 30.0), notifier.clone());

        let outcome = evaluator.evaluate(&request("Delhi", 30.0)).await.unwrap();

        assert!(!outcome.triggered);
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_city_without_readings_is_inert() {
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AlertEvaluator::new(store_with("Delhi", 40.0), notifier.clone());

        let outcome = evaluator.evaluate(&request("Mumbai", 10.0)).await.unwrap();

        assert_eq!(
            outcome,
            AlertOutcome {
                triggered: false,
                current_temp: None
            }
        );
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_still_reports_triggered() {
        let notifier = Arc::new(FailingNotifier::default());
        let evaluator = AlertEvaluator::new(store_with("Delhi", 35.0), notifier.clone());

        let outcome = evaluator.evaluate(&request("Delhi", 30.0)).await.unwrap();

        assert!(outcome.triggered);
        assert_eq!(*notifier.attempts.lock(), 1);
    }

    #[tokio::test]
    async fn test_smtp_rejection_does_not_escape_evaluate() {
        let config = weatherwatch_core::MailConfig {
            host: "localhost".to_string(),
            port: 9,
            sender: "alerts@example.com".to_string(),
            credential: "secret".to_string(),
        };
        let notifier = Arc::new(crate::notifier::SmtpNotifier::new(&config).unwrap());
        let evaluator = AlertEvaluator::new(store_with("Delhi", 35.0), notifier);

        let mut req = request("Delhi", 30.0);
        req.recipient = "not-an-address".to_string();
        let outcome = evaluator.evaluate(&req).await.unwrap();

        assert!(outcome.triggered);
        assert_eq!(outcome.current_temp, Some(35.0));
    }

    #[tokio::test]
    async fn test_store_read_failure_propagates() {
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AlertEvaluator::new(Arc::new(UnreadableStore), notifier.clone());

        let err = evaluator.evaluate(&request("Delhi", 30.0)).await.unwrap_err();

        assert!(matches!(err, StoreError::ReadFailed(_)));
        assert!(notifier.sent.lock().is_empty());
    }
}
