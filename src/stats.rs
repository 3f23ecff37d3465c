//! Latency statistics over repeated probe trials.

use std::fmt;

use crate::error::{Error, Result};
use crate::probe::LatencySample;

/// Summary of one camera's first-byte latencies, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub minimum: f64,
    pub average: f64,
    pub median: f64,
    pub maximum: f64,
    /// Number of samples summarized.
    pub samples: usize,
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {:.2}ms | avg {:.2}ms | median {:.2}ms | max {:.2}ms ({} samples)",
            self.minimum, self.average, self.median, self.maximum, self.samples
        )
    }
}

/// Summarize the samples of one camera.
pub fn summarize(samples: &[LatencySample]) -> Result<LatencyStats> {
    let millis: Vec<f64> = samples.iter().map(LatencySample::elapsed_ms).collect();
    summarize_millis(&millis)
}

/// Summarize raw millisecond values.
pub fn summarize_millis(values: &[f64]) -> Result<LatencyStats> {
    if values.is_empty() {
        return Err(Error::InsufficientData);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    Ok(LatencyStats {
        minimum: sorted[0],
        average: sorted.iter().sum::<f64>() / n as f64,
        median,
        maximum: sorted[n - 1],
        samples: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use proptest::prelude::*;

    #[test]
    fn summarize_known_sequence() {
        let stats = summarize_millis(&[535.0, 622.0, 615.0, 685.0]).unwrap();
        assert_eq!(stats.minimum, 535.0);
        assert_eq!(stats.maximum, 685.0);
        assert!((stats.average - 614.25).abs() < 1e-9);
        assert!((stats.median - 618.5).abs() < 1e-9);
        assert_eq!(stats.samples, 4);
    }

    #[test]
    fn odd_count_median_is_middle_value() {
        let stats = summarize_millis(&[900.0, 100.0, 300.0]).unwrap();
        assert_eq!(stats.median, 300.0);
    }

    #[test]
    fn single_sample_is_every_statistic() {
        let stats = summarize_millis(&[42.0]).unwrap();
        assert_eq!(stats.minimum, 42.0);
        assert_eq!(stats.average, 42.0);
        assert_eq!(stats.median, 42.0);
        assert_eq!(stats.maximum, 42.0);
    }

    #[test]
    fn empty_input_is_insufficient_data() {
        assert!(matches!(summarize(&[]), Err(Error::InsufficientData)));
        assert!(matches!(summarize_millis(&[]), Err(Error::InsufficientData)));
    }

    #[test]
    fn summarize_reads_sample_durations() {
        let samples: Vec<LatencySample> = [120, 80, 100]
            .iter()
            .enumerate()
            .map(|(i, ms)| LatencySample {
                camera: "lobby".to_string(),
                trial: i as u32 + 1,
                elapsed: Duration::from_millis(*ms),
            })
            .collect();

        let stats = summarize(&samples).unwrap();
        assert!((stats.minimum - 80.0).abs() < 1e-9);
        assert!((stats.median - 100.0).abs() < 1e-9);
        assert!((stats.maximum - 120.0).abs() < 1e-9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn statistics_stay_within_extremes(values in prop::collection::vec(0.0f64..1e7, 1..500)) {
            let s = summarize_millis(&values).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(s.minimum <= s.median && s.median <= s.maximum, "{}", s);
            prop_assert!(s.minimum <= s.average + 1e-6 && s.average <= s.maximum + 1e-6, "{}", s);
            prop_assert_eq!(s.samples, values.len());
        }

        #[test]
        fn repeated_value_is_its_own_summary(value in 0.0f64..1e7, len in 1usize..64) {
            let s = summarize_millis(&vec![value; len]).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(s.minimum, value);
            prop_assert_eq!(s.median, value);
            prop_assert_eq!(s.maximum, value);
            prop_assert!((s.average - value).abs() <= value * 1e-12);
        }
    }
}
