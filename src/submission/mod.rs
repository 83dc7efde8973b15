//! Submission pipeline for captured text
//!
//! Turns typed text into a reminder: validate, parse a due date, create
//! it remotely, then schedule a local notification. State is observable
//! as Idle, Submitting or Failed(message).

mod controller;
mod validate;

pub use controller::{
    CreateCompletion, SubmissionController, SubmissionState, SubmitError, SubmitOutcome,
};

#[cfg(test)]
pub use controller::NETWORK_ERROR_MESSAGE;
#[cfg(test)]
pub use validate::{INVALID_CONFIGURATION_MESSAGE, MISSING_DATE_MESSAGE};
