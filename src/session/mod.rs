//! Chat session lifecycle
//!
//! This module provides the `SessionManager` that:
//! - Creates the assistant session for the selected report
//! - Retries initialization with linear backoff
//! - Ignores duplicate opens of the same report
//! - Discards results that belong to a report the user already left
//! - Performs one lazy retry on the first send after a soft failure

mod config;
mod manager;

pub use config::RetryPolicy;
pub use manager::{InitOutcome, LiveSession, SessionManager};
