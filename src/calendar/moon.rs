//! Lunar phase as the elapsed fraction of the synodic month.

use chrono::{NaiveDate, NaiveDateTime};

/// Mean length of the synodic month in days.
const SYNODIC_MONTH_DAYS: f64 = 29.530588853;

/// Reference new moon: 2000-01-06 18:14 UTC.
fn reference_new_moon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 6)
        .and_then(|d| d.and_hms_opt(18, 14, 0))
        .expect("valid reference instant")
}

/// Fraction of the lunar cycle elapsed at midnight UTC of `date`, in
/// [0, 1): 0 is new moon, 0.5 full moon. Location-independent; the mean
/// synodic approximation drifts a few hours over decades, which is well
/// within what the downstream feature needs.
pub fn moon_phase(date: NaiveDate) -> f64 {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight exists");
    let elapsed = midnight - reference_new_moon();
    let days = elapsed.num_seconds() as f64 / 86_400.0;
    (days / SYNODIC_MONTH_DAYS).rem_euclid(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    #[test]
    fn phase_is_a_fraction_of_the_cycle() {
        let phase = moon_phase(date("2023-06-15"));
        assert!((0.0..1.0).contains(&phase));
    }

    #[test]
    fn known_new_moon_is_near_cycle_boundary() {
        // New moon fell on 2023-01-21 (20:53 UTC).
        let phase = moon_phase(date("2023-01-21"));
        assert!(phase > 0.9 || phase < 0.1, "phase was {phase}");
    }

    #[test]
    fn known_full_moon_is_near_half_cycle() {
        // Full moon fell on 2023-02-05 (18:28 UTC).
        let phase = moon_phase(date("2023-02-05"));
        assert!((0.4..0.6).contains(&phase), "phase was {phase}");
    }

    #[test]
    fn dates_before_the_reference_epoch_still_wrap_into_range() {
        let phase = moon_phase(date("1999-12-01"));
        assert!((0.0..1.0).contains(&phase));
    }

    #[test]
    fn consecutive_days_advance_by_one_cycle_fraction() {
        let a = moon_phase(date("2023-06-15"));
        let b = moon_phase(date("2023-06-16"));
        let step = (b - a).rem_euclid(1.0);
        assert!((step - 1.0 / SYNODIC_MONTH_DAYS).abs() < 1e-9);
    }
}
