use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const DEFAULT_FREQUENCY_VALUE: u32 = 1;
pub const DEFAULT_FREQUENCY_UNIT: FrequencyUnit = FrequencyUnit::Months;
pub const DEFAULT_YELLOW_THRESHOLD_DAYS: u32 = 14;
pub const DEFAULT_RED_THRESHOLD_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
}

impl FrequencyUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyUnit::Days => "days",
            FrequencyUnit::Weeks => "weeks",
            FrequencyUnit::Months => "months",
        }
    }
}

impl fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Ok(FrequencyUnit::Days),
            "w" | "week" | "weeks" => Ok(FrequencyUnit::Weeks),
            "m" | "month" | "months" => Ok(FrequencyUnit::Months),
            other => Err(format!("unknown frequency unit `{other}`")),
        }
    }
}

/// A recurring obligation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub id: String,
    pub title: String,
    pub frequency_value: u32,
    pub frequency_unit: FrequencyUnit,
    pub next_due_date: DateTime<Utc>,
    #[serde(default)]
    pub last_check_in_date: Option<DateTime<Utc>>,
    pub yellow_threshold_days: u32,
    pub red_threshold_days: u32,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl CheckIn {
    /// Builds a check-in with a fresh id and the default thresholds. Nothing is
    /// validated until the record is added to a store.
    pub fn new(
        title: impl Into<String>,
        frequency_value: u32,
        frequency_unit: FrequencyUnit,
        first_due: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.into().trim().to_string(),
            frequency_value,
            frequency_unit,
            next_due_date: first_due,
            last_check_in_date: None,
            yellow_threshold_days: DEFAULT_YELLOW_THRESHOLD_DAYS,
            red_threshold_days: DEFAULT_RED_THRESHOLD_DAYS,
            labels: Vec::new(),
        }
    }

    pub fn with_thresholds(mut self, yellow_days: u32, red_days: u32) -> Self {
        self.yellow_threshold_days = yellow_days;
        self.red_threshold_days = red_days;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = normalize_labels(labels);
        self
    }

    pub(crate) fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.labels = normalize_labels(&self.labels);
    }

    pub fn frequency_label(&self) -> String {
        format!("Every {} {}", self.frequency_value, self.frequency_unit)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if self.frequency_value == 0 {
            return Err(ValidationError::ZeroFrequency);
        }
        if self.red_threshold_days < self.yellow_threshold_days {
            return Err(ValidationError::ThresholdOrder {
                yellow: self.yellow_threshold_days,
                red: self.red_threshold_days,
            });
        }
        Ok(())
    }
}

/// A one-off obligation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_date: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title: title.into().trim().to_string(),
            labels: Vec::new(),
            created_date: created,
            completed: false,
            completed_date: None,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = normalize_labels(labels);
        self
    }

    pub(crate) fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.labels = normalize_labels(&self.labels);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if self.completed != self.completed_date.is_some() {
            return Err(ValidationError::CompletionMismatch);
        }
        Ok(())
    }
}

/// Splits a comma separated label field into trimmed, non-empty, unique labels.
pub fn parse_labels(input: &str) -> Vec<String> {
    normalize_labels(input.split(','))
}

pub(crate) fn normalize_labels<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() || out.iter().any(|existing| existing == label) {
            continue;
        }
        out.push(label.to_string());
    }
    out
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
