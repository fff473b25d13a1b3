//! Pairing rows across the two sources.
//!
//! `nearest_date_join` matches on the date axis; `positional_join` only pairs
//! row numbers and knows nothing about dates. Callers pick one explicitly.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{DashboardError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestMatch<L, R> {
    pub date: NaiveDate,
    pub left: L,
    pub matched_date: Option<NaiveDate>,
    pub right: Option<R>,
}

fn ensure_sorted<T>(series: &[(NaiveDate, T)], name: &'static str) -> Result<()> {
    if series.windows(2).all(|pair| pair[0].0 <= pair[1].0) {
        Ok(())
    } else {
        Err(DashboardError::Unsorted(name))
    }
}

/// For every left entry, the right entry closest in calendar days.
///
/// Both series must already be sorted by date. The floor candidate is the
/// last right entry on or before the left date, the ceiling the first on or
/// after it; the smaller gap wins and an equal gap goes to the earlier date.
/// The output always has one row per left entry; `right` is `None` only when
/// the right series is empty.
pub fn nearest_date_join<L, R>(
    left: &[(NaiveDate, L)],
    right: &[(NaiveDate, R)],
) -> Result<Vec<NearestMatch<L, R>>>
where
    L: Clone,
    R: Clone,
{
    ensure_sorted(left, "left")?;
    ensure_sorted(right, "right")?;

    let joined = left
        .iter()
        .map(|(date, value)| {
            let after_floor = right.partition_point(|(candidate, _)| candidate <= date);
            let ceiling = right.partition_point(|(candidate, _)| candidate < date);

            let floor = after_floor.checked_sub(1).map(|index| &right[index]);
            let ceiling = right.get(ceiling);

            let chosen = match (floor, ceiling) {
                (Some(below), Some(above)) => {
                    let gap_below = (*date - below.0).num_days();
                    let gap_above = (above.0 - *date).num_days();
                    if gap_below <= gap_above {
                        Some(below)
                    } else {
                        Some(above)
                    }
                }
                (Some(below), None) => Some(below),
                (None, Some(above)) => Some(above),
                (None, None) => None,
            };

            NearestMatch {
                date: *date,
                left: value.clone(),
                matched_date: chosen.map(|(matched, _)| *matched),
                right: chosen.map(|(_, matched)| matched.clone()),
            }
        })
        .collect();

    Ok(joined)
}

/// Pairs rows by position after truncating both sides to the shorter length.
pub fn positional_join<'a, L, R>(left: &'a [L], right: &'a [R]) -> Vec<(&'a L, &'a R)> {
    left.iter().zip(right.iter()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn picks_closest_right_date() {
        let left = vec![(ymd(2023, 1, 2), "a"), (ymd(2023, 1, 9), "b")];
        let right = vec![(ymd(2023, 1, 1), 10), (ymd(2023, 1, 8), 20), (ymd(2023, 1, 20), 30)];

        let joined = nearest_date_join(&left, &right).unwrap();

        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].matched_date, Some(ymd(2023, 1, 1)));
        assert_eq!(joined[0].right, Some(10));
        assert_eq!(joined[1].matched_date, Some(ymd(2023, 1, 8)));
    }

    #[test]
    fn equal_gap_goes_to_earlier_candidate() {
        let left = vec![(ymd(2023, 1, 5), ())];
        let right = vec![(ymd(2023, 1, 3), "earlier"), (ymd(2023, 1, 7), "later")];

        let joined = nearest_date_join(&left, &right).unwrap();
        assert_eq!(joined[0].right, Some("earlier"));
    }

    #[test]
    fn exact_match_wins() {
        let left = vec![(ymd(2023, 1, 5), ())];
        let right = vec![(ymd(2023, 1, 4), 1), (ymd(2023, 1, 5), 2), (ymd(2023, 1, 6), 3)];

        let joined = nearest_date_join(&left, &right).unwrap();
        assert_eq!(joined[0].right, Some(2));
    }

    #[test]
    fn preserves_left_row_count_beyond_right_range() {
        let left = vec![(ymd(2016, 4, 12), 1), (ymd(2016, 4, 13), 2), (ymd(2023, 6, 1), 3)];
        let right = vec![(ymd(2022, 1, 1), "x"), (ymd(2022, 1, 2), "y")];

        let joined = nearest_date_join(&left, &right).unwrap();

        assert_eq!(joined.len(), left.len());
        assert_eq!(joined[0].right, Some("x"));
        assert_eq!(joined[2].right, Some("y"));
    }

    #[test]
    fn matches_stay_within_half_spacing() {
        let start = ymd(2023, 1, 1);
        let right: Vec<(NaiveDate, usize)> = (0..10)
            .map(|i| (start + chrono::Duration::days(i * 4), i as usize))
            .collect();
        let left: Vec<(NaiveDate, ())> = (0..36)
            .map(|i| (start + chrono::Duration::days(i), ()))
            .collect();

        for row in nearest_date_join(&left, &right).unwrap() {
            let gap = (row.date - row.matched_date.unwrap()).num_days().abs();
            assert!(gap <= 2, "{} matched {:?}", row.date, row.matched_date);
        }
    }

    #[test]
    fn empty_right_leaves_matches_unset() {
        let left = vec![(ymd(2023, 1, 5), 1)];
        let right: Vec<(NaiveDate, i32)> = Vec::new();

        let joined = nearest_date_join(&left, &right).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].right, None);
    }

    #[test]
    fn unsorted_input_is_rejected() {
        let left = vec![(ymd(2023, 1, 5), 1), (ymd(2023, 1, 1), 2)];
        let right = vec![(ymd(2023, 1, 1), 1)];

        assert!(matches!(nearest_date_join(&left, &right), Err(DashboardError::Unsorted("left"))));
    }

    #[test]
    fn positional_truncates_to_shorter() {
        let steps = vec![100, 200, 300];
        let strain = vec![4.2, 9.9];

        let pairs = positional_join(&steps, &strain);
        assert_eq!(pairs, vec![(&100, &4.2), (&200, &9.9)]);
    }
}
