//! Road status domain and wire types.
//!
//! [`RawRoadStatus`] models one element of the JSON array returned by
//! `GET /Road/{id}`. Field names are matched case-insensitively because the
//! API has served both `displayName` and `DisplayName` spellings.
//! [`RoadStatus`] is the validated form handed to callers.

use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::RoadStatusError;

/// A road identifier such as `"A2"`. Never empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoadId(String);

impl RoadId {
    /// Parses a road identifier, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RoadStatusError::InvalidRoadId`] if `value` is empty or
    /// whitespace-only.
    pub fn parse(value: &str) -> Result<Self, RoadStatusError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RoadStatusError::InvalidRoadId);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoadId {
    type Err = RoadStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated status of a single road. All three fields are non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadStatus {
    display_name: String,
    status_severity: String,
    status_description: String,
}

impl RoadStatus {
    /// Builds a status, returning `None` if any field is blank after trimming.
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        status_severity: impl Into<String>,
        status_description: impl Into<String>,
    ) -> Option<Self> {
        let status = Self {
            display_name: display_name.into(),
            status_severity: status_severity.into(),
            status_description: status_description.into(),
        };
        let blank = [
            &status.display_name,
            &status.status_severity,
            &status.status_description,
        ]
        .iter()
        .any(|field| field.trim().is_empty());
        (!blank).then_some(status)
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Short category label, e.g. `"Good"` or `"Closure"`.
    #[must_use]
    pub fn status_severity(&self) -> &str {
        &self.status_severity
    }

    #[must_use]
    pub fn status_description(&self) -> &str {
        &self.status_description
    }
}

/// One untrusted record from the `/Road/{id}` response array.
///
/// Missing and `null` fields both decode to `None`. `statusDescription` is
/// accepted as an alias for `statusSeverityDescription`; the latter wins when
/// both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRoadStatus {
    pub display_name: Option<String>,
    pub status_severity: Option<String>,
    pub status_severity_description: Option<String>,
}

impl RawRoadStatus {
    /// Converts into a [`RoadStatus`], or `None` if any field is missing or blank.
    #[must_use]
    pub fn validate(self) -> Option<RoadStatus> {
        RoadStatus::new(
            self.display_name?,
            self.status_severity?,
            self.status_severity_description?,
        )
    }
}

impl<'de> Deserialize<'de> for RawRoadStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RawRoadStatusVisitor)
    }
}

struct RawRoadStatusVisitor;

impl<'de> Visitor<'de> for RawRoadStatusVisitor {
    type Value = RawRoadStatus;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a road status object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut raw = RawRoadStatus::default();
        let mut description_alias: Option<String> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.to_ascii_lowercase().as_str() {
                "displayname" => raw.display_name = map.next_value()?,
                "statusseverity" => raw.status_severity = map.next_value()?,
                "statusseveritydescription" => {
                    raw.status_severity_description = map.next_value()?;
                }
                "statusdescription" => description_alias = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if raw.status_severity_description.is_none() {
            raw.status_severity_description = description_alias;
        }
        Ok(raw)
    }
}
