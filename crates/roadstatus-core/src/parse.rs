//! Body validation for `GET /Road/{id}` responses.

use crate::error::RoadStatusError;
use crate::types::{RawRoadStatus, RoadId, RoadStatus};

/// Decodes a 2xx response body into a [`RoadStatus`].
///
/// Only the first record is used. An empty array, a `null` body, a
/// whitespace-only body, and a first record with any blank field all mean the
/// API does not know the road.
///
/// # Errors
///
/// - [`RoadStatusError::InvalidResponseFormat`] if `body` is not a JSON array
///   of road status objects.
/// - [`RoadStatusError::UnknownRoad`] for the empty and blank cases above.
pub fn decode_road_status(road_id: &RoadId, body: &str) -> Result<RoadStatus, RoadStatusError> {
    let unknown = || RoadStatusError::UnknownRoad {
        road_id: road_id.to_string(),
    };

    if body.trim().is_empty() {
        return Err(unknown());
    }

    let records: Option<Vec<RawRoadStatus>> =
        serde_json::from_str(body).map_err(|e| RoadStatusError::InvalidResponseFormat {
            road_id: road_id.to_string(),
            source: e,
        })?;

    let first = records
        .and_then(|r| r.into_iter().next())
        .ok_or_else(unknown)?;

    // A blank record is reported as unknown; the API uses it for roads it
    // recognises syntactically but has no status for.
    first.validate().ok_or_else(unknown)
}
