//! Leaf wetness duration

/// Relative humidity above which foliage is treated as wet (percent)
pub const WET_HUMIDITY_THRESHOLD: f64 = 90.0;

/// Length of the current wet spell, in samples (one sample per hour).
///
/// `humidity_history` is chronological: oldest first, most recent last. The
/// scan walks backwards from the newest sample and stops at the first dry one,
/// so this is a trailing run length and not a total count of wet samples.
pub fn calculate_leaf_wetness_duration(humidity_history: &[f64]) -> u32 {
    humidity_history
        .iter()
        .rev()
        .take_while(|h| **h > WET_HUMIDITY_THRESHOLD)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_wet_spell() {
        // Most recent last: 93 and 91 are wet, 80 ends the spell
        assert_eq!(calculate_leaf_wetness_duration(&[95.0, 96.0, 92.0, 80.0, 91.0, 93.0]), 2);
    }

    #[test]
    fn test_direction_matters() {
        // Same samples reversed: the older wet run no longer trails
        assert_eq!(calculate_leaf_wetness_duration(&[93.0, 91.0, 80.0, 92.0, 96.0, 95.0]), 3);
        assert_eq!(calculate_leaf_wetness_duration(&[95.0, 96.0, 92.0, 80.0]), 0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert_eq!(calculate_leaf_wetness_duration(&[90.0]), 0);
        assert_eq!(calculate_leaf_wetness_duration(&[90.1]), 1);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(calculate_leaf_wetness_duration(&[]), 0);
    }

    #[test]
    fn test_all_wet() {
        assert_eq!(calculate_leaf_wetness_duration(&[91.0; 12]), 12);
    }
}
