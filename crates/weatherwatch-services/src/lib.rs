//! Polling, storage, alerting and query services for WeatherWatch.

pub mod alert;
pub mod notifier;
pub mod query;
pub mod scheduler;
pub mod store;

pub use alert::{AlertEvaluator, AlertOutcome, AlertRequest};
pub use notifier::{AlertNotice, LogNotifier, MailContent, Notifier, SmtpNotifier};
pub use query::{Dashboard, QueryService};
pub use scheduler::{CityFailure, CycleFailure, CycleReport, PollScheduler, SchedulerState};
pub use store::{run_blocking, History, InMemoryReadingStore, ReadingStore, SqliteReadingStore};
