//! Rendering of road statuses for stdout.

use std::io::{self, Write};

use roadstatus_core::RoadStatus;

/// Output mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Writes the three-line human-readable block for one road.
pub(crate) fn write_text<W: Write>(out: &mut W, status: &RoadStatus) -> io::Result<()> {
    writeln!(out, "The status of the {} is as follows", status.display_name())?;
    writeln!(out, "        Road Status is {}", status.status_severity())?;
    writeln!(
        out,
        "        Road Status Description is {}",
        status.status_description()
    )
}

/// Writes every successful status as one pretty-printed JSON array.
pub(crate) fn write_json<W: Write>(out: &mut W, statuses: &[RoadStatus]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, statuses)?;
    writeln!(out)
}
