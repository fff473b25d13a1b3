//! Calendar bucketing of dated rows.
//!
//! Two half-year policies exist and they are not interchangeable:
//! `FixedHalfYear` splits every calendar year at July, while
//! `RollingSixMonth` starts counting from the earliest month in the data.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::dates::{self, DayType};
use crate::stats::{self, Aggregate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStrategy {
    /// One bucket per calendar month, labelled `YYYY-MM`.
    Monthly,
    /// Jan-Jun and Jul-Dec of each year, labelled `{year} H{1|2}`.
    FixedHalfYear,
    /// Six-month windows offset from the dataset's first month, labelled
    /// with the first and last month actually observed in the window.
    RollingSixMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HalfYear {
    pub year: i32,
    pub half: u8,
}

impl HalfYear {
    pub fn of(date: NaiveDate) -> Self {
        let half = if date.month() <= 6 { 1 } else { 2 };
        Self {
            year: date.year(),
            half,
        }
    }
}

impl fmt::Display for HalfYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} H{}", self.year, self.half)
    }
}

/// Index of the rolling six-month window holding `date`, counted from the
/// month of `origin`.
pub fn rolling_bucket_index(origin: NaiveDate, date: NaiveDate) -> i32 {
    (dates::month_index(date) - dates::month_index(origin)).div_euclid(6)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketMean {
    pub label: String,
    pub mean: Aggregate,
    pub count: usize,
}

struct Bucket {
    values: Vec<Option<f64>>,
    first: NaiveDate,
    last: NaiveDate,
}

/// Mean of `value` per period. Rows without a date are left out; buckets are
/// returned in chronological order.
pub fn bucket_means<T, D, V>(
    rows: &[T],
    strategy: BucketStrategy,
    date: D,
    value: V,
) -> Vec<BucketMean>
where
    D: Fn(&T) -> Option<NaiveDate>,
    V: Fn(&T) -> Option<f64>,
{
    let dated: Vec<(NaiveDate, Option<f64>)> = rows
        .iter()
        .filter_map(|row| date(row).map(|day| (day, value(row))))
        .collect();

    let Some(origin) = dated.iter().map(|(day, _)| *day).min() else {
        return Vec::new();
    };

    let mut buckets: BTreeMap<i32, Bucket> = BTreeMap::new();
    for (day, metric) in dated {
        let key = match strategy {
            BucketStrategy::Monthly => dates::month_index(day),
            BucketStrategy::FixedHalfYear => {
                let half = HalfYear::of(day);
                half.year * 2 + i32::from(half.half)
            }
            BucketStrategy::RollingSixMonth => rolling_bucket_index(origin, day),
        };
        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            values: Vec::new(),
            first: day,
            last: day,
        });
        bucket.values.push(metric);
        bucket.first = bucket.first.min(day);
        bucket.last = bucket.last.max(day);
    }

    buckets
        .into_values()
        .map(|bucket| {
            let label = match strategy {
                BucketStrategy::Monthly => dates::month_key(bucket.first),
                BucketStrategy::FixedHalfYear => HalfYear::of(bucket.first).to_string(),
                BucketStrategy::RollingSixMonth => format!(
                    "{} to {}",
                    dates::month_key(bucket.first),
                    dates::month_key(bucket.last)
                ),
            };
            BucketMean {
                label,
                count: stats::count(bucket.values.iter().copied()),
                mean: stats::mean(bucket.values),
            }
        })
        .collect()
}

/// Mean of `value` for weekdays and weekends, in that order. A day type with
/// no rows is omitted.
pub fn day_type_means<T, D, V>(rows: &[T], date: D, value: V) -> Vec<(DayType, Aggregate)>
where
    D: Fn(&T) -> Option<NaiveDate>,
    V: Fn(&T) -> Option<f64>,
{
    let mut groups: BTreeMap<DayType, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        if let Some(day) = date(row) {
            groups.entry(DayType::of(day)).or_default().push(value(row));
        }
    }
    groups
        .into_iter()
        .map(|(day_type, values)| (day_type, stats::mean(values)))
        .collect()
}

/// Mean of `value` per distinct date, sorted by date.
pub fn daily_means<T, D, V>(rows: &[T], date: D, value: V) -> Vec<(NaiveDate, Aggregate)>
where
    D: Fn(&T) -> Option<NaiveDate>,
    V: Fn(&T) -> Option<f64>,
{
    let mut groups: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        if let Some(day) = date(row) {
            groups.entry(day).or_default().push(value(row));
        }
    }
    groups
        .into_iter()
        .map(|(day, values)| (day, stats::mean(values)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn fixed_half_year_splits_at_july() {
        assert_eq!(HalfYear::of(ymd(2023, 7, 15)).to_string(), "2023 H2");
        assert_eq!(HalfYear::of(ymd(2023, 6, 30)).to_string(), "2023 H1");
        assert_eq!(HalfYear::of(ymd(2024, 1, 1)).to_string(), "2024 H1");
    }

    #[test]
    fn rolling_index_floor_divides_month_offset() {
        let origin = ymd(2022, 3, 14);
        assert_eq!(rolling_bucket_index(origin, ymd(2022, 3, 1)), 0);
        assert_eq!(rolling_bucket_index(origin, ymd(2022, 8, 31)), 0);
        assert_eq!(rolling_bucket_index(origin, ymd(2022, 9, 1)), 1);
        assert_eq!(rolling_bucket_index(origin, ymd(2023, 2, 28)), 1);
        assert_eq!(rolling_bucket_index(origin, ymd(2023, 3, 1)), 2);
    }

    #[test]
    fn rolling_labels_use_observed_months() {
        let rows = vec![
            (ymd(2022, 3, 10), Some(80.0)),
            (ymd(2022, 5, 2), Some(90.0)),
            (ymd(2022, 10, 1), Some(70.0)),
            (ymd(2022, 12, 24), None),
        ];
        let buckets = bucket_means(&rows, BucketStrategy::RollingSixMonth, |r| Some(r.0), |r| r.1);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "2022-03 to 2022-05");
        assert_eq!(buckets[0].mean, Aggregate::Value(85.0));
        assert_eq!(buckets[1].label, "2022-10 to 2022-12");
        assert_eq!(buckets[1].mean, Aggregate::Value(70.0));
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn strategies_disagree_when_data_starts_mid_half() {
        let rows = vec![(ymd(2022, 3, 1), Some(1.0)), (ymd(2022, 7, 1), Some(3.0))];

        let fixed = bucket_means(&rows, BucketStrategy::FixedHalfYear, |r| Some(r.0), |r| r.1);
        let rolling = bucket_means(&rows, BucketStrategy::RollingSixMonth, |r| Some(r.0), |r| r.1);

        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[0].label, "2022 H1");
        assert_eq!(fixed[1].label, "2022 H2");
        assert_eq!(rolling.len(), 1);
        assert_eq!(rolling[0].mean, Aggregate::Value(2.0));
    }

    #[test]
    fn monthly_buckets_skip_undated_rows() {
        let rows = vec![
            (Some(ymd(2023, 1, 3)), Some(40.0)),
            (None, Some(1000.0)),
            (Some(ymd(2023, 1, 20)), Some(60.0)),
            (Some(ymd(2023, 2, 1)), Some(55.0)),
        ];
        let buckets = bucket_means(&rows, BucketStrategy::Monthly, |r| r.0, |r| r.1);
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();

        assert_eq!(labels, ["2023-01", "2023-02"]);
        assert_eq!(buckets[0].mean, Aggregate::Value(50.0));
    }

    #[test]
    fn day_type_means_group_weekends() {
        let rows = vec![
            (ymd(2024, 1, 6), Some(500.0)),
            (ymd(2024, 1, 7), Some(520.0)),
            (ymd(2024, 1, 8), Some(400.0)),
        ];
        let means = day_type_means(&rows, |r| Some(r.0), |r| r.1);
        assert_eq!(
            means,
            vec![
                (DayType::Weekday, Aggregate::Value(400.0)),
                (DayType::Weekend, Aggregate::Value(510.0)),
            ]
        );
    }

    #[test]
    fn daily_means_average_across_subjects() {
        let rows = vec![
            (ymd(2016, 4, 12), Some(2000.0)),
            (ymd(2016, 4, 12), Some(3000.0)),
            (ymd(2016, 4, 11), Some(1800.0)),
        ];
        let means = daily_means(&rows, |r| Some(r.0), |r| r.1);
        assert_eq!(
            means,
            vec![
                (ymd(2016, 4, 11), Aggregate::Value(1800.0)),
                (ymd(2016, 4, 12), Aggregate::Value(2500.0)),
            ]
        );
    }

    #[test]
    fn no_dated_rows_means_no_buckets() {
        let rows: Vec<(Option<NaiveDate>, Option<f64>)> = vec![(None, Some(1.0))];
        assert!(bucket_means(&rows, BucketStrategy::FixedHalfYear, |r| r.0, |r| r.1).is_empty());
    }
}
