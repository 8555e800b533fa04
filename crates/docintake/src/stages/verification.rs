//! Confidence gate applied after extraction.

/// Outcome of comparing a confidence score with a category threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    /// Carries a human-readable reason naming both values.
    Rejected(String),
}

/// A score equal to the threshold passes.
pub fn decide(score: u8, threshold: u8) -> Verdict {
    if score >= threshold {
        Verdict::Verified
    } else {
        Verdict::Rejected(format!(
            "confidence below threshold: {} < {}",
            score, threshold
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_at_threshold_passes() {
        assert_eq!(decide(70, 70), Verdict::Verified);
        assert_eq!(decide(100, 70), Verdict::Verified);
    }

    #[test]
    fn test_score_below_threshold_names_both_values() {
        match decide(69, 70) {
            Verdict::Rejected(reason) => {
                assert!(reason.contains("69"));
                assert!(reason.contains("70"));
            }
            Verdict::Verified => panic!("69 must not pass a threshold of 70"),
        }
    }

    #[test]
    fn test_extreme_thresholds() {
        assert_eq!(decide(0, 0), Verdict::Verified);
        assert!(matches!(decide(99, 100), Verdict::Rejected(_)));
    }
}
