use chrono::NaiveDate;
use thiserror::Error;

use crate::types::ParclId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("API error: {url} returned {status}: {body}")]
    Api {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed payload from {url}: {message}")]
    MalformedPayload { url: String, message: String },

    #[error("Market {parcl_id} is not in the provider catalog")]
    UnknownEntity { parcl_id: ParclId },

    #[error("Empty series for market {parcl_id}")]
    EmptySeries { parcl_id: ParclId },

    #[error("Division by zero in baseline normalization for market {parcl_id} on {date}")]
    BaselineDivisionByZero { parcl_id: ParclId, date: NaiveDate },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether a fetch that failed with this error is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Http(_) | PipelineError::Timeout { .. } => true,
            PipelineError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<askama::Error> for PipelineError {
    fn from(err: askama::Error) -> Self {
        PipelineError::Render(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server_error = PipelineError::Api {
            url: "http://x".into(),
            status: 503,
            body: String::new(),
        };
        let throttled = PipelineError::Api {
            url: "http://x".into(),
            status: 429,
            body: String::new(),
        };
        let not_found = PipelineError::Api {
            url: "http://x".into(),
            status: 404,
            body: String::new(),
        };
        let timeout = PipelineError::Timeout {
            url: "http://x".into(),
            timeout_secs: 1,
        };

        assert!(server_error.is_transient());
        assert!(throttled.is_transient());
        assert!(timeout.is_transient());
        assert!(!not_found.is_transient());
        assert!(!PipelineError::EmptySeries { parcl_id: 1 }.is_transient());
    }

    #[test]
    fn test_division_error_names_market_and_date() {
        let err = PipelineError::BaselineDivisionByZero {
            parcl_id: 5332726,
            date: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Division by zero in baseline normalization"));
        assert!(msg.contains("5332726"));
        assert!(msg.contains("2020-02-01"));
    }
}
