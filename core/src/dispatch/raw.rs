use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::dispatch::record::{DispatchRecord, GeoPoint, Priority};
use crate::prelude::TimestampMs;

/// GeoJSON-style point as served by the open-data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// One row of the dispatch feed before normalization. Every field may be
/// missing; [`RawDispatchCall::normalize`] decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDispatchCall {
    #[serde(default)]
    pub cad_number: Option<String>,
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub received_datetime: Option<String>,
    #[serde(default)]
    pub call_date: Option<String>,
    #[serde(default)]
    pub onscene_datetime: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub point: Option<RawPoint>,
}

/// Why a raw row was refused at ingestion.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RecordRejection {
    #[error("missing call identifier")]
    MissingId,
    #[error("missing priority")]
    MissingPriority,
    #[error("invalid priority {0:?}")]
    InvalidPriority(String),
    #[error("missing received timestamp")]
    MissingTimestamp,
    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("missing location")]
    MissingLocation,
}

impl RawDispatchCall {
    pub fn normalize(&self) -> Result<DispatchRecord, RecordRejection> {
        let id = self
            .cad_number
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(RecordRejection::MissingId)?;

        let priority_text = self
            .priority
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(RecordRejection::MissingPriority)?;
        let priority: Priority = priority_text
            .parse()
            .map_err(|_| RecordRejection::InvalidPriority(priority_text.to_string()))?;

        let location = self
            .point
            .as_ref()
            .and_then(|point| match point.coordinates.as_slice() {
                [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some(GeoPoint {
                    lon: *lon,
                    lat: *lat,
                }),
                _ => None,
            })
            .ok_or(RecordRejection::MissingLocation)?;

        let received_text = self
            .received_datetime
            .as_deref()
            .or(self.call_date.as_deref())
            .ok_or(RecordRejection::MissingTimestamp)?;
        let received_time = parse_timestamp(received_text)?;

        // A malformed on-scene time is not fatal; it is derived instead.
        let on_scene_time = self
            .onscene_datetime
            .as_deref()
            .and_then(|text| parse_timestamp(text).ok());

        Ok(DispatchRecord::new(
            id,
            received_time,
            on_scene_time,
            priority,
            self.call_type.as_deref().unwrap_or(""),
            location,
        ))
    }
}

/// Accepts RFC 3339 and the feed's zone-less `YYYY-MM-DDTHH:MM:SS[.fff]`
/// form, which is read as UTC.
pub fn parse_timestamp(text: &str) -> Result<TimestampMs, RecordRejection> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().timestamp_millis())
        .map_err(|_| RecordRejection::InvalidTimestamp(text.to_string()))
}
