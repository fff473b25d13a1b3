//! Raw header to canonical field mapping for every source collection.
//!
//! Source files keep their literal headers (`"Heart rate variability (ms)"`,
//! `"Sleep performance %"`) all the way into the store. The mapping below is
//! resolved once per loaded collection; typed records are built from it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::error::{DashboardError, Result};
use crate::models::{
    ActivityRecord, Document, FieldValue, PhysiologyRecord, SleepDayRecord, SourceSleepRecord,
    WorkoutRecord,
};

/// A canonical field and the raw headers that may carry it, in priority order.
#[derive(Debug)]
pub struct Column {
    pub key: &'static str,
    pub headers: &'static [&'static str],
}

#[derive(Debug)]
pub struct SourceSchema {
    pub collection: &'static str,
    pub columns: &'static [Column],
}

impl SourceSchema {
    fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }
}

pub mod activity {
    use super::{Column, SourceSchema};

    pub const COLLECTION: &str = "daily_activity";
    pub const SUBJECT_ID: &str = "subject_id";
    pub const DATE: &str = "date";
    pub const TOTAL_STEPS: &str = "total_steps";
    pub const CALORIES: &str = "calories";
    pub const HIGH_INTENSITY: &str = "high_intensity_minutes";
    pub const MODERATE_INTENSITY: &str = "moderate_intensity_minutes";
    pub const LOW_INTENSITY: &str = "low_intensity_minutes";
    pub const REST: &str = "rest_minutes";

    pub const INTENSITY: [&str; 4] = [HIGH_INTENSITY, MODERATE_INTENSITY, LOW_INTENSITY, REST];

    pub static SCHEMA: SourceSchema = SourceSchema {
        collection: COLLECTION,
        columns: &[
            Column { key: SUBJECT_ID, headers: &["Id"] },
            Column { key: DATE, headers: &["Date", "ActivityDate", "ActivityDay"] },
            Column { key: TOTAL_STEPS, headers: &["TotalSteps"] },
            Column { key: CALORIES, headers: &["Calories"] },
            Column {
                key: HIGH_INTENSITY,
                headers: &["HighIntensityMinutes", "VeryActiveMinutes"],
            },
            Column {
                key: MODERATE_INTENSITY,
                headers: &["ModerateIntensityMinutes", "FairlyActiveMinutes"],
            },
            Column {
                key: LOW_INTENSITY,
                headers: &["LowIntensityMinutes", "LightlyActiveMinutes"],
            },
            Column { key: REST, headers: &["RestMinutes", "SedentaryMinutes"] },
        ],
    };
}

pub mod sleep_day {
    use super::{Column, SourceSchema};

    pub const COLLECTION: &str = "sleep_day";
    pub const SUBJECT_ID: &str = "subject_id";
    pub const DATE: &str = "date";
    pub const MINUTES_ASLEEP: &str = "minutes_asleep";
    pub const MINUTES_IN_BED: &str = "minutes_in_bed";

    pub static SCHEMA: SourceSchema = SourceSchema {
        collection: COLLECTION,
        columns: &[
            Column { key: SUBJECT_ID, headers: &["Id"] },
            Column { key: DATE, headers: &["SleepDay", "Date"] },
            Column { key: MINUTES_ASLEEP, headers: &["TotalMinutesAsleep"] },
            Column { key: MINUTES_IN_BED, headers: &["TotalTimeInBed"] },
        ],
    };
}

pub mod physiology {
    use super::{Column, SourceSchema};

    pub const COLLECTION: &str = "physiologicals_rafi";
    pub const DATE: &str = "date";
    pub const HRV: &str = "hrv_ms";
    pub const RESTING_HR: &str = "resting_heart_rate_bpm";
    pub const DAY_STRAIN: &str = "day_strain";
    pub const ENERGY: &str = "energy_burned_cal";
    pub const SKIN_TEMP: &str = "skin_temp_celsius";
    pub const BLOOD_OXYGEN: &str = "blood_oxygen_pct";

    pub static SCHEMA: SourceSchema = SourceSchema {
        collection: COLLECTION,
        columns: &[
            Column { key: DATE, headers: &["Date", "Cycle start time"] },
            Column { key: HRV, headers: &["Heart rate variability (ms)"] },
            Column { key: RESTING_HR, headers: &["Resting heart rate (bpm)"] },
            Column { key: DAY_STRAIN, headers: &["Day Strain"] },
            Column { key: ENERGY, headers: &["Energy burned (cal)"] },
            Column { key: SKIN_TEMP, headers: &["Skin temperature", "Skin temp (celsius)"] },
            Column { key: BLOOD_OXYGEN, headers: &["Blood oxygen %"] },
        ],
    };
}

pub mod source_sleep {
    use super::{Column, SourceSchema};

    pub const COLLECTION: &str = "sleeps_rafi";
    pub const DATE: &str = "date";
    pub const SLEEP_NEED: &str = "sleep_need_minutes";
    pub const PERFORMANCE: &str = "performance_pct";
    pub const LIGHT: &str = "light_minutes";
    pub const DEEP: &str = "deep_minutes";
    pub const REM: &str = "rem_minutes";

    pub const STAGES: [&str; 3] = [LIGHT, DEEP, REM];

    pub static SCHEMA: SourceSchema = SourceSchema {
        collection: COLLECTION,
        columns: &[
            Column { key: DATE, headers: &["Date", "Cycle start time", "Sleep onset"] },
            Column { key: SLEEP_NEED, headers: &["Sleep need (min)"] },
            Column { key: PERFORMANCE, headers: &["Sleep performance %"] },
            Column { key: LIGHT, headers: &["Light sleep duration (min)"] },
            Column { key: DEEP, headers: &["Deep duration (min)", "Deep (SWS) duration (min)"] },
            Column { key: REM, headers: &["REM duration (min)"] },
        ],
    };
}

pub mod workouts {
    use super::{Column, SourceSchema};

    pub const COLLECTION: &str = "workouts_rafi";
    pub const DATE: &str = "date";
    pub const ACTIVITY_NAME: &str = "activity_name";
    pub const DURATION: &str = "duration_minutes";
    pub const STRAIN: &str = "activity_strain";
    pub const ENERGY: &str = "energy_burned_cal";

    pub static SCHEMA: SourceSchema = SourceSchema {
        collection: COLLECTION,
        columns: &[
            Column { key: DATE, headers: &["Date", "Workout start time"] },
            Column { key: ACTIVITY_NAME, headers: &["Activity name"] },
            Column { key: DURATION, headers: &["Duration (min)"] },
            Column { key: STRAIN, headers: &["Activity Strain"] },
            Column { key: ENERGY, headers: &["Energy burned (cal)"] },
        ],
    };
}

fn squash(header: &str) -> String {
    header.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Canonical fields resolved against the headers actually present in a
/// collection. A field may resolve to several raw headers when appended
/// files disagree; reads take the first one holding a value.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    collection: &'static str,
    resolved: BTreeMap<&'static str, Vec<String>>,
}

impl HeaderMap {
    pub fn resolve<'a, I>(schema: &SourceSchema, headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: BTreeSet<&str> = headers.into_iter().collect();
        let mut resolved = BTreeMap::new();

        for column in schema.columns {
            let mut matches = Vec::new();
            for alias in column.headers {
                let wanted = squash(alias);
                for header in &present {
                    if (*header == *alias || squash(header) == wanted)
                        && !matches.iter().any(|m: &String| m == header)
                    {
                        matches.push((*header).to_string());
                    }
                }
            }
            if !matches.is_empty() {
                resolved.insert(column.key, matches);
            }
        }

        Self {
            collection: schema.collection,
            resolved,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn has(&self, key: &str) -> bool {
        self.resolved.contains_key(key)
    }

    pub fn require(&self, key: &'static str) -> Result<()> {
        if self.has(key) {
            Ok(())
        } else {
            Err(DashboardError::MissingColumn {
                collection: self.collection,
                column: key,
            })
        }
    }

    /// Raw header that supplies `key`, for labelling.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.resolved
            .get(key)
            .and_then(|headers| headers.first())
            .map(String::as_str)
    }

    fn values<'a>(
        &'a self,
        document: &'a Document,
        key: &str,
    ) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.resolved
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(move |header| document.get(header))
            .filter(|value| !value.is_absent())
    }

    pub fn number(&self, document: &Document, key: &str) -> Option<f64> {
        self.values(document, key).find_map(FieldValue::as_f64)
    }

    pub fn integer(&self, document: &Document, key: &str) -> Option<i64> {
        self.values(document, key).find_map(FieldValue::as_i64)
    }

    pub fn date(&self, document: &Document, key: &str) -> Option<NaiveDate> {
        self.values(document, key).find_map(FieldValue::as_date)
    }

    pub fn text(&self, document: &Document, key: &str) -> Option<String> {
        self.values(document, key).find_map(FieldValue::as_text)
    }
}

/// A typed record that can be read out of a stored document.
pub trait SourceRecord: Sized {
    fn schema() -> &'static SourceSchema;

    fn from_document(columns: &HeaderMap, document: &Document) -> Self;
}

impl SourceRecord for ActivityRecord {
    fn schema() -> &'static SourceSchema {
        &activity::SCHEMA
    }

    fn from_document(columns: &HeaderMap, document: &Document) -> Self {
        Self {
            subject_id: columns.integer(document, activity::SUBJECT_ID),
            date: columns.date(document, activity::DATE),
            total_steps: columns.number(document, activity::TOTAL_STEPS),
            calories: columns.number(document, activity::CALORIES),
            high_intensity_minutes: columns.number(document, activity::HIGH_INTENSITY),
            moderate_intensity_minutes: columns.number(document, activity::MODERATE_INTENSITY),
            low_intensity_minutes: columns.number(document, activity::LOW_INTENSITY),
            rest_minutes: columns.number(document, activity::REST),
        }
    }
}

impl SourceRecord for SleepDayRecord {
    fn schema() -> &'static SourceSchema {
        &sleep_day::SCHEMA
    }

    fn from_document(columns: &HeaderMap, document: &Document) -> Self {
        Self {
            subject_id: columns.integer(document, sleep_day::SUBJECT_ID),
            date: columns.date(document, sleep_day::DATE),
            minutes_asleep: columns.number(document, sleep_day::MINUTES_ASLEEP),
            minutes_in_bed: columns.number(document, sleep_day::MINUTES_IN_BED),
        }
    }
}

impl SourceRecord for PhysiologyRecord {
    fn schema() -> &'static SourceSchema {
        &physiology::SCHEMA
    }

    fn from_document(columns: &HeaderMap, document: &Document) -> Self {
        Self {
            date: columns.date(document, physiology::DATE),
            hrv_ms: columns.number(document, physiology::HRV),
            resting_heart_rate_bpm: columns.number(document, physiology::RESTING_HR),
            day_strain: columns.number(document, physiology::DAY_STRAIN),
            energy_burned_cal: columns.number(document, physiology::ENERGY),
            skin_temp_celsius: columns.number(document, physiology::SKIN_TEMP),
            blood_oxygen_pct: columns.number(document, physiology::BLOOD_OXYGEN),
        }
    }
}

impl SourceRecord for SourceSleepRecord {
    fn schema() -> &'static SourceSchema {
        &source_sleep::SCHEMA
    }

    fn from_document(columns: &HeaderMap, document: &Document) -> Self {
        Self {
            date: columns.date(document, source_sleep::DATE),
            sleep_need_minutes: columns.number(document, source_sleep::SLEEP_NEED),
            performance_pct: columns.number(document, source_sleep::PERFORMANCE),
            light_minutes: columns.number(document, source_sleep::LIGHT),
            deep_minutes: columns.number(document, source_sleep::DEEP),
            rem_minutes: columns.number(document, source_sleep::REM),
        }
    }
}

impl SourceRecord for WorkoutRecord {
    fn schema() -> &'static SourceSchema {
        &workouts::SCHEMA
    }

    fn from_document(columns: &HeaderMap, document: &Document) -> Self {
        Self {
            date: columns.date(document, workouts::DATE),
            activity_name: columns.text(document, workouts::ACTIVITY_NAME),
            duration_minutes: columns.number(document, workouts::DURATION),
            activity_strain: columns.number(document, workouts::STRAIN),
            energy_burned_cal: columns.number(document, workouts::ENERGY),
        }
    }
}

/// Raw header used for `key` in `schema`, falling back to the first alias.
pub fn display_header(schema: &SourceSchema, columns: &HeaderMap, key: &'static str) -> String {
    columns
        .header(key)
        .map(str::to_string)
        .or_else(|| {
            schema
                .column(key)
                .and_then(|column| column.headers.first())
                .map(|header| header.to_string())
        })
        .unwrap_or_else(|| key.to_string())
}
