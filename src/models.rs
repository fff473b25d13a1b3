use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::metrics;

/// A single cell of a self-describing document.
///
/// `Absent` is the explicit missing marker: it is persisted as JSON `null`
/// and never confused with a numeric zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Absent,
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Float(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            FieldValue::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                Some(*value as i64)
            }
            FieldValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Text(value) => dates::parse_date(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Text(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Absent => f.write_str("N/A"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Date(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(value) if value.is_finite() => FieldValue::Float(value),
            _ => FieldValue::Absent,
        }
    }
}

impl From<Option<NaiveDate>> for FieldValue {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(FieldValue::Date).unwrap_or(FieldValue::Absent)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Absent)
    }
}

/// A stored row keyed by its literal source header.
pub type Document = BTreeMap<String, FieldValue>;

/// Source A daily activity, one row per subject per day.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub subject_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub total_steps: Option<f64>,
    pub calories: Option<f64>,
    pub high_intensity_minutes: Option<f64>,
    pub moderate_intensity_minutes: Option<f64>,
    pub low_intensity_minutes: Option<f64>,
    pub rest_minutes: Option<f64>,
}

/// Source A nightly sleep, one row per subject per night.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepDayRecord {
    pub subject_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub minutes_asleep: Option<f64>,
    pub minutes_in_bed: Option<f64>,
}

impl SleepDayRecord {
    pub fn efficiency(&self) -> Option<f64> {
        metrics::sleep_efficiency(self.minutes_asleep, self.minutes_in_bed)
    }
}

/// Source B physiological cycle for the single tracked subject.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysiologyRecord {
    pub date: Option<NaiveDate>,
    pub hrv_ms: Option<f64>,
    pub resting_heart_rate_bpm: Option<f64>,
    pub day_strain: Option<f64>,
    pub energy_burned_cal: Option<f64>,
    pub skin_temp_celsius: Option<f64>,
    pub blood_oxygen_pct: Option<f64>,
}

/// Source B sleep with stage breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSleepRecord {
    pub date: Option<NaiveDate>,
    pub sleep_need_minutes: Option<f64>,
    pub performance_pct: Option<f64>,
    pub light_minutes: Option<f64>,
    pub deep_minutes: Option<f64>,
    pub rem_minutes: Option<f64>,
}

impl SourceSleepRecord {
    pub fn total_sleep_minutes(&self) -> Option<f64> {
        metrics::total_sleep_minutes(self.light_minutes, self.deep_minutes, self.rem_minutes)
    }
}

/// Source B workout; several may share a date.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub date: Option<NaiveDate>,
    pub activity_name: Option<String>,
    pub duration_minutes: Option<f64>,
    pub activity_strain: Option<f64>,
    pub energy_burned_cal: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_round_trips_as_null() {
        let mut document = Document::new();
        document.insert("Calories".to_string(), FieldValue::Absent);
        document.insert("TotalSteps".to_string(), FieldValue::Integer(0));

        let json = serde_json::to_string(&document).unwrap();
        assert_eq!(json, r#"{"Calories":null,"TotalSteps":0}"#);

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back["Calories"], FieldValue::Absent);
        assert_eq!(back["TotalSteps"], FieldValue::Integer(0));
    }

    #[test]
    fn stored_dates_come_back_as_dates() {
        let json = r#"{"Date":"2023-07-15","Activity name":"Running","Day Strain":11.5}"#;
        let document: Document = serde_json::from_str(json).unwrap();

        assert_eq!(
            document["Date"],
            FieldValue::Date(NaiveDate::from_ymd_opt(2023, 7, 15).unwrap())
        );
        assert_eq!(document["Activity name"], FieldValue::Text("Running".into()));
        assert_eq!(document["Day Strain"].as_f64(), Some(11.5));
    }

    #[test]
    fn numeric_accessors_skip_absent() {
        assert_eq!(FieldValue::Absent.as_f64(), None);
        assert_eq!(FieldValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(FieldValue::Text("1503960366".into()).as_i64(), Some(1503960366));
        assert_eq!(FieldValue::from(Some(f64::NAN)), FieldValue::Absent);
    }

    #[test]
    fn derived_metrics_use_shared_formulas() {
        let night = SleepDayRecord {
            subject_id: Some(1),
            date: None,
            minutes_asleep: Some(420.0),
            minutes_in_bed: Some(480.0),
        };
        assert_eq!(night.efficiency(), Some(87.5));

        let staged = SourceSleepRecord {
            date: None,
            sleep_need_minutes: None,
            performance_pct: None,
            light_minutes: Some(200.0),
            deep_minutes: Some(90.0),
            rem_minutes: Some(100.0),
        };
        assert_eq!(staged.total_sleep_minutes(), Some(390.0));
    }
}
