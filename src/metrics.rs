//! Derived quantities computed from raw fields. Every view goes through these.

/// Minutes asleep as a percentage of minutes in bed.
pub fn sleep_efficiency(minutes_asleep: Option<f64>, minutes_in_bed: Option<f64>) -> Option<f64> {
    let asleep = minutes_asleep?;
    let in_bed = minutes_in_bed?;
    if in_bed <= 0.0 {
        return None;
    }
    Some(asleep / in_bed * 100.0)
}

/// Light + deep + REM. Any missing stage makes the total unavailable.
pub fn total_sleep_minutes(light: Option<f64>, deep: Option<f64>, rem: Option<f64>) -> Option<f64> {
    Some(light? + deep? + rem?)
}

pub fn minutes_to_hours(minutes: f64) -> f64 {
    minutes / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_is_asleep_over_in_bed() {
        assert_eq!(sleep_efficiency(Some(420.0), Some(480.0)), Some(87.5));
    }

    #[test]
    fn efficiency_needs_both_fields_and_time_in_bed() {
        assert_eq!(sleep_efficiency(None, Some(480.0)), None);
        assert_eq!(sleep_efficiency(Some(420.0), None), None);
        assert_eq!(sleep_efficiency(Some(0.0), Some(0.0)), None);
    }

    #[test]
    fn total_sleep_sums_stages() {
        assert_eq!(total_sleep_minutes(Some(210.0), Some(95.0), Some(110.0)), Some(415.0));
        assert_eq!(total_sleep_minutes(Some(210.0), None, Some(110.0)), None);
    }

    #[test]
    fn hours_conversion() {
        assert_eq!(minutes_to_hours(450.0), 7.5);
    }
}
