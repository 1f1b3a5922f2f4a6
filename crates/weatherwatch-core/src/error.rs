//! Centralized error types for WeatherWatch.
//!
//! This module provides a typed error hierarchy that:
//! - Keeps fetch, storage and notification failures distinct so each layer
//!   can apply its own propagation policy
//! - Provides user-friendly messages suitable for API responses
//! - Preserves full error context for logging
//!
//! Configuration loading stays on `anyhow` with context; it only fails at startup.

use thiserror::Error;

/// Coarse classification of a [`FetchError`], used in cycle reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NotFound,
    Unavailable,
    MalformedResponse,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::NotFound => f.write_str("not_found"),
            FetchErrorKind::Unavailable => f.write_str("unavailable"),
            FetchErrorKind::MalformedResponse => f.write_str("malformed_response"),
        }
    }
}

/// Weather provider errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The provider does not know the requested city.
    #[error("City not found: {0}")]
    NotFound(String),

    /// Transport failure or non-2xx status other than not-found.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but required fields were missing or invalid.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NotFound(_) => FetchErrorKind::NotFound,
            FetchError::Unavailable(_) => FetchErrorKind::Unavailable,
            FetchError::MalformedResponse(_) => FetchErrorKind::MalformedResponse,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::NotFound(_) => "City not found. Check the name and try again.",
            FetchError::Unavailable(_) => {
                "Weather service unavailable. Please try again later."
            }
            FetchError::MalformedResponse(_) => {
                "Weather service returned unexpected data. Please try again later."
            }
        }
    }
}

/// Reading store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("storage write failed: {0}")]
    WriteFailed(String),

    #[error("storage read failed: {0}")]
    ReadFailed(String),

    /// The store cannot be reached at all (lost connection, blocking worker gone).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether this error should stop the poll scheduler instead of being
    /// logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::WriteFailed(_) => "Failed to save weather data.",
            StoreError::ReadFailed(_) => "Failed to load weather data. Please try again.",
            StoreError::Unavailable(_) => {
                "Weather data storage is unavailable. Try restarting the service."
            }
        }
    }
}

/// Mail delivery errors. Never propagated past the notifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("mail authentication failed: {0}")]
    AuthFailed(String),

    #[error("mail transport failed: {0}")]
    TransportFailed(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl NotificationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NotificationError::AuthFailed(_) => "Alert mail could not be sent (authentication).",
            NotificationError::TransportFailed(_) => "Alert mail could not be sent.",
            NotificationError::InvalidRecipient(_) => "The alert recipient address is invalid.",
        }
    }
}

/// Extension trait for converting reqwest errors to fetch errors.
///
/// Only transport and body errors reach this; HTTP statuses are classified by
/// the provider before the body is read.
pub trait ReqwestErrorExt {
    fn into_fetch_error(self) -> FetchError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_fetch_error(self) -> FetchError {
        if self.is_decode() {
            FetchError::MalformedResponse(self.to_string())
        } else if self.is_timeout() {
            FetchError::Unavailable(format!("request timed out: {self}"))
        } else {
            FetchError::Unavailable(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to store errors.
pub trait RusqliteErrorExt {
    fn into_read_error(self) -> StoreError;
    fn into_write_error(self) -> StoreError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_read_error(self) -> StoreError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _) if is_unreachable(err) => {
                StoreError::Unavailable(self.to_string())
            }
            _ => StoreError::ReadFailed(self.to_string()),
        }
    }

    fn into_write_error(self) -> StoreError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _) if is_unreachable(err) => {
                StoreError::Unavailable(self.to_string())
            }
            _ => StoreError::WriteFailed(self.to_string()),
        }
    }
}

fn is_unreachable(err: &rusqlite::ffi::Error) -> bool {
    matches!(
        err.code,
        rusqlite::ErrorCode::CannotOpen
            | rusqlite::ErrorCode::NotADatabase
            | rusqlite::ErrorCode::DatabaseCorrupt
    )
}
