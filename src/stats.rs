use serde::Serialize;

/// Result of aggregating a numeric column. Absent cells never count, and an
/// aggregate over nothing is `NoData` rather than zero or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Aggregate {
    Value(f64),
    NoData,
}

impl Aggregate {
    pub fn value(self) -> Option<f64> {
        match self {
            Aggregate::Value(value) => Some(value),
            Aggregate::NoData => None,
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Aggregate {
        match self {
            Aggregate::Value(value) => Aggregate::Value(f(value)),
            Aggregate::NoData => Aggregate::NoData,
        }
    }
}

impl From<Option<f64>> for Aggregate {
    fn from(value: Option<f64>) -> Self {
        value.map(Aggregate::Value).unwrap_or(Aggregate::NoData)
    }
}

fn present<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .collect()
}

pub fn count<I>(values: I) -> usize
where
    I: IntoIterator<Item = Option<f64>>,
{
    present(values).len()
}

pub fn sum<I>(values: I) -> Aggregate
where
    I: IntoIterator<Item = Option<f64>>,
{
    let values = present(values);
    if values.is_empty() {
        return Aggregate::NoData;
    }
    Aggregate::Value(values.iter().sum())
}

pub fn mean<I>(values: I) -> Aggregate
where
    I: IntoIterator<Item = Option<f64>>,
{
    let values = present(values);
    if values.is_empty() {
        return Aggregate::NoData;
    }
    Aggregate::Value(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1).
pub fn std_dev<I>(values: I) -> Aggregate
where
    I: IntoIterator<Item = Option<f64>>,
{
    let values = present(values);
    if values.len() < 2 {
        return Aggregate::NoData;
    }
    let n = values.len() as f64;
    let avg = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (n - 1.0);
    Aggregate::Value(variance.sqrt())
}

pub fn min<I>(values: I) -> Aggregate
where
    I: IntoIterator<Item = Option<f64>>,
{
    present(values).into_iter().reduce(f64::min).into()
}

pub fn max<I>(values: I) -> Aggregate
where
    I: IntoIterator<Item = Option<f64>>,
{
    present(values).into_iter().reduce(f64::max).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

/// Row holding the largest (or smallest) value of `metric`.
///
/// Rows whose metric is absent are skipped. Ties keep the first row in input
/// order: a later row only wins when it is strictly better.
pub fn extremum_by<T, F>(rows: &[T], extremum: Extremum, metric: F) -> Option<(usize, &T)>
where
    F: Fn(&T) -> Option<f64>,
{
    let mut best: Option<(usize, f64)> = None;

    for (index, row) in rows.iter().enumerate() {
        let Some(value) = metric(row).filter(|value| value.is_finite()) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, current)) => match extremum {
                Extremum::Max => value > current,
                Extremum::Min => value < current,
            },
        };
        if better {
            best = Some((index, value));
        }
    }

    best.map(|(index, _)| (index, &rows[index]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_are_excluded_not_zeroed() {
        let values = vec![Some(10.0), None, Some(20.0)];
        assert_eq!(mean(values.clone()), Aggregate::Value(15.0));
        assert_eq!(sum(values.clone()), Aggregate::Value(30.0));
        assert_eq!(min(values.clone()), Aggregate::Value(10.0));
        assert_eq!(count(values), 2);
    }

    #[test]
    fn empty_input_is_no_data() {
        let empty: Vec<Option<f64>> = Vec::new();
        assert_eq!(mean(empty.clone()), Aggregate::NoData);
        assert_eq!(sum(empty.clone()), Aggregate::NoData);
        assert_eq!(max(empty.clone()), Aggregate::NoData);
        assert_eq!(mean(vec![None, None]), Aggregate::NoData);
    }

    #[test]
    fn std_dev_is_sample_deviation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].map(Some);
        let std = std_dev(values).value().unwrap();
        assert!((std - 2.138).abs() < 0.001);
        assert_eq!(std_dev(vec![Some(3.0)]), Aggregate::NoData);
    }

    #[test]
    fn extremum_ties_pick_first_row() {
        let days = vec![
            ("mon", Some(8_000.0)),
            ("tue", Some(10_000.0)),
            ("wed", Some(10_000.0)),
            ("thu", None),
        ];

        let (index, best) = extremum_by(&days, Extremum::Max, |day| day.1).unwrap();
        assert_eq!(index, 1);
        assert_eq!(best.0, "tue");

        let (index, _) = extremum_by(&days, Extremum::Min, |day| day.1).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn extremum_over_nothing_is_none() {
        let rows: Vec<Option<f64>> = vec![None];
        assert!(extremum_by(&rows, Extremum::Max, |row| *row).is_none());
    }
}
