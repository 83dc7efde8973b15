//! Validation steps of the submission pipeline
//!
//! Each step returns a tagged [`ValidationError`]; the controller chains
//! them with `?` before anything asynchronous runs.

use chrono::{DateTime, Utc};
use reqwest::Url;

/// Message shown when the text or backend address is unusable
pub const INVALID_CONFIGURATION_MESSAGE: &str = "Invalid configuration";

/// Message shown when no due date could be parsed
pub const MISSING_DATE_MESSAGE: &str = "Please include a date or time (e.g., 'tomorrow at 9am')";

/// Synchronous rejections, raised before any network call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("reminder text is empty")]
    EmptyText,

    #[error("invalid backend address: {0}")]
    BadConfiguration(String),

    #[error("no date or time found in text")]
    NoDateFound,
}

impl ValidationError {
    /// Guidance shown on the capture surface
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::EmptyText | ValidationError::BadConfiguration(_) => {
                INVALID_CONFIGURATION_MESSAGE
            }
            ValidationError::NoDateFound => MISSING_DATE_MESSAGE,
        }
    }
}

/// Reject empty or whitespace-only text
pub fn validate_text(text: &str) -> Result<&str, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(text)
}

/// The backend address must be an absolute http(s) URL with a host
pub fn validate_endpoint(base_url: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(base_url)
        .map_err(|e| ValidationError::BadConfiguration(format!("{base_url}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ValidationError::BadConfiguration(base_url.to_string()));
    }
    Ok(url)
}

/// A submission needs a parsed due date
pub fn require_due_date(parsed: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, ValidationError> {
    parsed.ok_or(ValidationError::NoDateFound)
}
