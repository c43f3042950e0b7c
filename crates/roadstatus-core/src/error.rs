use thiserror::Error;

/// Errors returned by [`crate::RoadStatusClient`] and [`crate::RoadId`].
#[derive(Debug, Error)]
pub enum RoadStatusError {
    /// The road identifier was empty or whitespace-only.
    #[error("road ID cannot be empty")]
    InvalidRoadId,

    /// The API does not recognise the road (404, empty body, or a blank record).
    #[error("{road_id} is not a valid road")]
    UnknownRoad { road_id: String },

    /// Non-2xx status other than 404, after any retries were spent.
    #[error("upstream service returned HTTP {status} for road {road_id}")]
    Upstream { road_id: String, status: u16 },

    /// Connection-level failure (refused, reset, DNS) after any retries were
    /// spent, or a 2xx body that could not be read in full.
    #[error("network failure while fetching road {road_id}: {source}")]
    Network {
        road_id: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request timeout or the caller's deadline elapsed.
    #[error("timed out waiting for the road status service")]
    Timeout,

    /// The caller cancelled the request.
    #[error("road status request was cancelled")]
    Cancelled,

    /// The 2xx response body did not match the expected JSON shape.
    #[error("invalid response format for road {road_id}: {source}")]
    InvalidResponseFormat {
        road_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The underlying `reqwest::Client` could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl RoadStatusError {
    /// `true` when the failure is about the caller's input rather than the
    /// service or the network.
    #[must_use]
    pub fn is_unknown_road(&self) -> bool {
        matches!(
            self,
            RoadStatusError::UnknownRoad { .. } | RoadStatusError::InvalidRoadId
        )
    }
}

/// Errors raised while assembling an [`crate::ApiConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("invalid value for TflApi.{key} in config file: {reason}")]
    InvalidFileValue { key: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    FileParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
