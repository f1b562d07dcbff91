// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Peak heart-rate locator.

use chrono::TimeDelta;

/// The highest heart-rate reading in an activity stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Index into the stream
    pub index: usize,
    /// Elapsed time since activity start
    pub offset: TimeDelta,
    /// Heart rate at the peak (bpm)
    pub heart_rate: f64,
}

/// Find the first sample attaining the maximum heart rate.
///
/// `times` holds elapsed seconds and is paired with `heart_rates` by index.
/// Only the common prefix of the two series is considered, and NaN readings
/// are skipped. Returns `None` when no usable sample exists.
pub fn find_peak(times: &[f64], heart_rates: &[f64]) -> Option<Peak> {
    if times.len() != heart_rates.len() {
        tracing::debug!(
            times = times.len(),
            heart_rates = heart_rates.len(),
            "Stream length mismatch, truncating to shorter series"
        );
    }

    let mut best: Option<(usize, f64)> = None;
    for (index, &hr) in heart_rates.iter().take(times.len()).enumerate() {
        if hr.is_nan() {
            continue;
        }
        // Strict comparison keeps the earliest index on ties.
        match best {
            Some((_, max)) if hr <= max => {}
            _ => best = Some((index, hr)),
        }
    }

    let (index, heart_rate) = best?;
    Some(Peak {
        index,
        offset: seconds_to_delta(times[index]),
        heart_rate,
    })
}

fn seconds_to_delta(seconds: f64) -> TimeDelta {
    if !seconds.is_finite() || seconds <= 0.0 {
        return TimeDelta::zero();
    }
    TimeDelta::milliseconds((seconds * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series_has_no_peak() {
        assert_eq!(find_peak(&[], &[]), None);
    }

    #[test]
    fn test_empty_heart_rate_series_has_no_peak() {
        assert_eq!(find_peak(&[1.0, 2.0], &[]), None);
    }

    #[test]
    fn test_peak_at_last_sample() {
        let peak = find_peak(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(peak.index, 2);
        assert_eq!(peak.offset, TimeDelta::seconds(3));
        assert_eq!(peak.heart_rate, 3.0);
    }

    #[test]
    fn test_tie_resolves_to_first_occurrence() {
        let peak = find_peak(&[0.0, 1.0, 2.0], &[5.0, 9.0, 9.0]).unwrap();
        assert_eq!(peak.index, 1);
        assert_eq!(peak.offset, TimeDelta::seconds(1));
    }

    #[test]
    fn test_all_zero_heart_rate_still_peaks() {
        let peak = find_peak(&[0.0, 10.0, 20.0], &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(peak.index, 0);
        assert_eq!(peak.heart_rate, 0.0);
        assert_eq!(peak.offset, TimeDelta::zero());
    }

    #[test]
    fn test_mismatched_lengths_use_common_prefix() {
        // The 200 bpm reading has no timestamp and must be ignored.
        let peak = find_peak(&[0.0, 5.0], &[120.0, 150.0, 200.0]).unwrap();
        assert_eq!(peak.index, 1);
        assert_eq!(peak.heart_rate, 150.0);
    }

    #[test]
    fn test_nan_readings_are_skipped() {
        let peak = find_peak(&[0.0, 1.0, 2.0], &[f64::NAN, 140.0, 130.0]).unwrap();
        assert_eq!(peak.index, 1);

        assert_eq!(find_peak(&[0.0], &[f64::NAN]), None);
    }

    #[test]
    fn test_fractional_seconds_keep_millisecond_precision() {
        let peak = find_peak(&[0.0, 12.25], &[100.0, 170.0]).unwrap();
        assert_eq!(peak.offset, TimeDelta::milliseconds(12_250));
    }
}
