use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_ALARM_NAME: &str = "Alarm";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(pub i64);

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlarmId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(AlarmId)
    }
}

/// A daily alarm. `time` is kept as the stored `HH:MM` text so that a
/// hand-edited slot with a bad value still loads and renders.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AlarmEntry {
    pub id: AlarmId,
    pub time: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub triggered: bool,
}

impl AlarmEntry {
    pub fn new(id: AlarmId, time: &str, name: &str) -> Self {
        let name = if name.trim().is_empty() {
            DEFAULT_ALARM_NAME.to_string()
        } else {
            name.to_string()
        };
        Self {
            id,
            time: time.to_string(),
            name,
            active: true,
            triggered: false,
        }
    }

    /// Eligible to fire at `minute_key` (`HH:MM`).
    pub fn is_due(&self, minute_key: &str) -> bool {
        self.active && !self.triggered && self.time == minute_key
    }
}

fn default_name() -> String {
    DEFAULT_ALARM_NAME.to_string()
}

fn default_active() -> bool {
    true
}

/// Accepts `H:MM` or `HH:MM` (24-hour).
pub fn parse_alarm_time(input: &str) -> Result<NaiveTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("alarm time must not be empty");
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .with_context(|| format!("invalid alarm time '{input}', expected HH:MM (24-hour)"))
}

pub fn normalize_alarm_time(input: &str) -> Result<String> {
    let time = parse_alarm_time(input)?;
    Ok(minute_key(&time))
}

pub fn minute_key<T: Timelike>(time: &T) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Decodes a persisted alarm list. Anything other than a JSON array yields an
/// empty list; array elements that do not describe an alarm are dropped.
pub fn decode_alarm_list(payload: &str) -> Vec<AlarmEntry> {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                line = err.line(),
                column = err.column(),
                "failed to parse stored alarms: {err}"
            );
            return Vec::new();
        }
    };

    let Value::Array(items) = value else {
        warn!("stored alarms are not a JSON array; starting with an empty list");
        return Vec::new();
    };

    let mut alarms = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<AlarmEntry>(item) {
            Ok(alarm) => alarms.push(alarm),
            Err(err) => warn!(index, "skipping malformed stored alarm: {err}"),
        }
    }
    alarms
}

pub fn encode_alarm_list(alarms: &[AlarmEntry]) -> serde_json::Result<String> {
    serde_json::to_string(alarms)
}
