//! HTTP client for the `TfL` `Road/{id}` endpoint.
//!
//! Wraps `reqwest` with retry, timeout and cancellation handling and maps
//! every transport, status and body failure onto [`RoadStatusError`] before
//! it leaves this module.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};
use tracing::Instrument;

use crate::config::{ApiConfig, DEFAULT_BASE_URL};
use crate::error::RoadStatusError;
use crate::parse::decode_road_status;
use crate::retry::{retry_with_backoff, Cancellation, RetryContext, RetryPolicy};
use crate::types::{RoadId, RoadStatus};

/// Client for the road status API.
///
/// Holds one `reqwest::Client` whose connection pool is reused across
/// fetches. Use [`RoadStatusClient::new`] with a loaded [`ApiConfig`], or
/// [`RoadStatusClient::with_base_url`] to point at a mock server in tests.
#[derive(Clone)]
pub struct RoadStatusClient {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RoadStatusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadStatusClient")
            .field("base_url", &self.base_url.as_str())
            .field(
                "credentials",
                &self.credentials.as_ref().map(|(id, _)| (id, "[redacted]")),
            )
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RoadStatusClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RoadStatusError::ClientBuild`] if the underlying
    /// `reqwest::Client` cannot be constructed, or
    /// [`RoadStatusError::InvalidBaseUrl`] if `config.base_url` is not an
    /// absolute http(s) URL.
    pub fn new(config: &ApiConfig) -> Result<Self, RoadStatusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .map_err(RoadStatusError::ClientBuild)?;

        let base_url = parse_base_url(&config.base_url)?;
        let credentials = config
            .credentials()
            .map(|(id, key)| (id.to_owned(), key.to_owned()));

        Ok(Self {
            client,
            base_url,
            credentials,
            retry: config.retry_policy(),
        })
    }

    /// Creates a client with default settings against a custom base URL.
    ///
    /// # Errors
    ///
    /// Same as [`RoadStatusClient::new`].
    pub fn with_base_url(base_url: &str) -> Result<Self, RoadStatusError> {
        Self::new(&ApiConfig {
            base_url: base_url.to_owned(),
            ..ApiConfig::default()
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetches the current status of `road_id`.
    ///
    /// # Errors
    ///
    /// - [`RoadStatusError::UnknownRoad`]: 404, empty/`null` body, or a
    ///   first record with a blank field.
    /// - [`RoadStatusError::Upstream`]: any other non-2xx status (429 and 5xx
    ///   are retried first).
    /// - [`RoadStatusError::Network`]: connection failure after retries.
    /// - [`RoadStatusError::Timeout`]: the request timeout elapsed.
    /// - [`RoadStatusError::InvalidResponseFormat`]: the body is not a JSON
    ///   array of road records.
    pub async fn fetch(&self, road_id: &RoadId) -> Result<RoadStatus, RoadStatusError> {
        self.fetch_with(road_id, &Cancellation::new()).await
    }

    /// Like [`RoadStatusClient::fetch`], but stops with
    /// [`RoadStatusError::Cancelled`] or [`RoadStatusError::Timeout`] as soon
    /// as `cancellation` fires, including during a back-off sleep.
    ///
    /// # Errors
    ///
    /// See [`RoadStatusClient::fetch`].
    pub async fn fetch_with(
        &self,
        road_id: &RoadId,
        cancellation: &Cancellation,
    ) -> Result<RoadStatus, RoadStatusError> {
        let mut ctx = RetryContext::new();
        let span = tracing::info_span!(
            "road_status.fetch",
            road_id = %road_id,
            correlation_id = %ctx.correlation_id(),
        );

        async {
            let url = self.build_url(road_id);
            tracing::debug!(path = url.path(), "requesting road status");

            let outcome = match retry_with_backoff(
                &self.retry,
                &mut ctx,
                cancellation,
                tokio::time::sleep,
                || self.send(&url, road_id),
            )
            .await
            {
                Ok(response) => read_body(response, road_id, cancellation)
                    .await
                    .and_then(|body| decode_road_status(road_id, &body)),
                Err(err) => Err(err),
            };

            let attempts = ctx.attempt();
            let elapsed_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX);
            match &outcome {
                Ok(status) => tracing::info!(
                    attempts,
                    elapsed_ms,
                    display_name = status.display_name(),
                    status_severity = status.status_severity(),
                    "road status retrieved"
                ),
                Err(err) if err.is_unknown_road() => {
                    tracing::warn!(attempts, elapsed_ms, "road not found");
                }
                Err(err) => tracing::warn!(
                    attempts,
                    elapsed_ms,
                    error = %err,
                    "road status request failed"
                ),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Builds `{base}/Road/{road_id}` with the road id percent-encoded as a
    /// path segment and the credential pair appended when configured.
    fn build_url(&self, road_id: &RoadId) -> Url {
        let mut url = self.base_url.clone();
        // The base URL was checked for `cannot_be_a_base` in the constructor.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("Road").push(road_id.as_str());
        }
        if let Some((app_id, app_key)) = &self.credentials {
            url.query_pairs_mut()
                .append_pair("app_id", app_id)
                .append_pair("app_key", app_key);
        }
        url
    }

    /// One attempt: sends the GET and classifies the status.
    ///
    /// Returns the response for 2xx without touching the body. Reading and
    /// validating the body happen after the retry loop, so a 2xx is never
    /// retried.
    async fn send(&self, url: &Url, road_id: &RoadId) -> Result<Response, RoadStatusError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(road_id, e))?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RoadStatusError::UnknownRoad {
                road_id: road_id.to_string(),
            });
        }

        if !status.is_success() {
            return Err(RoadStatusError::Upstream {
                road_id: road_id.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

/// Reads a 2xx body once. A failed or truncated read is reported as is.
async fn read_body(
    response: Response,
    road_id: &RoadId,
    cancellation: &Cancellation,
) -> Result<String, RoadStatusError> {
    cancellation
        .guard(response.text())
        .await?
        .map_err(|e| transport_error(road_id, e))
}

/// Client-side timeouts are terminal; every other transport error is a
/// retriable network failure.
fn transport_error(road_id: &RoadId, err: reqwest::Error) -> RoadStatusError {
    if err.is_timeout() {
        RoadStatusError::Timeout
    } else {
        RoadStatusError::Network {
            road_id: road_id.to_string(),
            source: err,
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, RoadStatusError> {
    let invalid = |reason: String| RoadStatusError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason,
    };

    let trimmed = raw.trim().trim_end_matches('/');
    let candidate = if trimmed.is_empty() {
        DEFAULT_BASE_URL
    } else {
        trimmed
    };
    let url = Url::parse(candidate).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be used as a base".to_owned()));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
