pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Linear re-mapping of `value` from one range onto another, unclamped.
    pub fn map_range(value: f64, from_lo: f64, from_hi: f64, to_lo: f64, to_hi: f64) -> f64 {
        let span = from_hi - from_lo;
        if span == 0.0 {
            return to_lo;
        }
        to_lo + (value - from_lo) / span * (to_hi - to_lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn map_range_inverts_when_target_is_reversed() {
        assert_eq!(StatsHelper::map_range(0.25, 0.0, 1.0, 100.0, 0.0), 75.0);
        assert_eq!(StatsHelper::map_range(5.0, 5.0, 5.0, 1.0, 2.0), 1.0);
    }
}
