//! Road status lookups against the `TfL` unified API.
//!
//! [`RoadStatusClient`] issues one GET per road, retries transient failures
//! with exponential back-off, and turns the response into a validated
//! [`RoadStatus`] or a classified [`RoadStatusError`].

pub mod client;
pub mod config;
pub mod error;
pub mod parse;
pub mod retry;
pub mod types;

pub use client::RoadStatusClient;
pub use config::{load_api_config, ApiConfig};
pub use error::{ConfigError, RoadStatusError};
pub use retry::{Cancellation, RetryContext, RetryPolicy};
pub use types::{RawRoadStatus, RoadId, RoadStatus};
