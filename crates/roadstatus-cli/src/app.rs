//! Runs a batch of road lookups and turns the results into output and an
//! exit code.
//!
//! Roads are fetched one after another with the same client. Successful
//! statuses are written to `out` (immediately in text mode, as one array in
//! JSON mode); failure messages follow on `err` once every road has been
//! tried. A cancelled run stops at the road that was in flight.

use std::io::{self, Write};

use roadstatus_core::{Cancellation, RoadId, RoadStatus, RoadStatusClient, RoadStatusError};

use crate::format::{write_json, write_text, OutputFormat};

/// Overall result of a run, in increasing order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Outcome {
    /// Every road resolved.
    Success,
    /// At least one road id was rejected or unknown to the API.
    InvalidRoad,
    /// At least one lookup failed for reasons outside the caller's input.
    Failure,
}

impl Outcome {
    pub(crate) fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::InvalidRoad => 1,
            Self::Failure => 3,
        }
    }

    fn of(error: &RoadStatusError) -> Self {
        if error.is_unknown_road() {
            Self::InvalidRoad
        } else {
            Self::Failure
        }
    }
}

struct RoadFailure {
    road_id: String,
    error: RoadStatusError,
}

impl std::fmt::Display for RoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            RoadStatusError::InvalidRoadId => write!(f, "{}", self.error),
            error if error.is_unknown_road() => write!(f, "{} is not a valid road", self.road_id),
            error => write!(
                f,
                "failed to retrieve status for {}: {error}",
                self.road_id
            ),
        }
    }
}

/// Looks up every road in `road_ids` and reports the results.
///
/// # Errors
///
/// Returns an error only if writing to `out` or `err` fails. Lookup failures
/// are reported on `err` and folded into the returned [`Outcome`].
pub(crate) async fn run<O, E>(
    client: &RoadStatusClient,
    road_ids: &[String],
    cancellation: &Cancellation,
    format: OutputFormat,
    out: &mut O,
    err: &mut E,
) -> io::Result<Outcome>
where
    O: Write,
    E: Write,
{
    let mut statuses: Vec<RoadStatus> = Vec::with_capacity(road_ids.len());
    let mut failures: Vec<RoadFailure> = Vec::new();

    for raw in road_ids {
        let result = match RoadId::parse(raw) {
            Ok(road_id) => client.fetch_with(&road_id, cancellation).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(status) => {
                if format == OutputFormat::Text {
                    write_text(out, &status)?;
                }
                statuses.push(status);
            }
            Err(error) => {
                let cancelled = matches!(error, RoadStatusError::Cancelled);
                failures.push(RoadFailure {
                    road_id: raw.trim().to_owned(),
                    error,
                });
                if cancelled {
                    tracing::warn!(
                        remaining = road_ids.len() - statuses.len() - failures.len(),
                        "run cancelled"
                    );
                    break;
                }
            }
        }
    }

    if format == OutputFormat::Json {
        write_json(out, &statuses)?;
    }
    out.flush()?;

    for failure in &failures {
        writeln!(err, "{failure}")?;
    }
    err.flush()?;

    let outcome = failures
        .iter()
        .map(|failure| Outcome::of(&failure.error))
        .max()
        .unwrap_or(Outcome::Success);
    tracing::debug!(
        succeeded = statuses.len(),
        failed = failures.len(),
        ?outcome,
        "run finished"
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
