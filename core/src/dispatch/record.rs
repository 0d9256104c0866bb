use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::prelude::TimestampMs;

const MINUTE_MS: TimestampMs = 60 * 1000;

/// Dispatch priority letter; A is the most urgent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    A,
    B,
    C,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::A, Priority::B, Priority::C];

    /// Offset used to derive an on-scene time when the feed omits one.
    pub fn on_scene_offset_ms(self) -> TimestampMs {
        match self {
            Priority::A => 5 * MINUTE_MS,
            Priority::B => 10 * MINUTE_MS,
            Priority::C => 15 * MINUTE_MS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::A => "A",
            Priority::B => "B",
            Priority::C => "C",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown priority {0:?}")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Priority::A),
            "B" | "b" => Ok(Priority::B),
            "C" | "c" => Ok(Priority::C),
            other => Err(ParsePriorityError(other.to_string())),
        }
    }
}

/// Longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// One normalized dispatch call.
///
/// Everything except the `activated`/`completed` flags is fixed once the
/// record has been built; the flags are owned by the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: String,
    pub received_time: TimestampMs,
    pub on_scene_time: TimestampMs,
    pub priority: Priority,
    pub call_type_code: String,
    pub call_type_label: String,
    pub location: GeoPoint,
    #[serde(default)]
    activated: bool,
    #[serde(default)]
    completed: bool,
}

impl DispatchRecord {
    /// Builds a record, deriving the on-scene time from the priority when
    /// absent and never letting it precede the received time.
    pub fn new(
        id: impl Into<String>,
        received_time: TimestampMs,
        on_scene_time: Option<TimestampMs>,
        priority: Priority,
        call_type: &str,
        location: GeoPoint,
    ) -> Self {
        let on_scene_time = on_scene_time
            .unwrap_or(received_time + priority.on_scene_offset_ms())
            .max(received_time);
        let (code, label) = split_call_type(call_type);
        Self {
            id: id.into(),
            received_time,
            on_scene_time,
            priority,
            call_type_code: code,
            call_type_label: label,
            location,
            activated: false,
            completed: false,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn set_activated(&mut self, value: bool) {
        self.activated = value;
    }

    pub(crate) fn set_completed(&mut self, value: bool) {
        self.completed = value;
    }
}

/// Splits `"CODE - DESCRIPTION"` into the code and the full label.
fn split_call_type(call_type: &str) -> (String, String) {
    let trimmed = call_type.trim();
    if trimmed.is_empty() {
        return ("unknown".to_string(), "unknown".to_string());
    }
    let code = trimmed
        .split(" - ")
        .next()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or("unknown");
    (code.to_string(), trimmed.to_string())
}
