use crate::config::Config;
use crate::models::violation::Severity;

/// Scoring policy for proctoring sessions. Maps a violation severity to a
/// trust-score reduction and decides when a score is a warning or has
/// collapsed far enough to force submission. Values come from
/// configuration so deployments can tune policy without code changes.
#[derive(Debug, Clone, Copy)]
pub struct TrustPolicy {
    reduction_low: i32,
    reduction_medium: i32,
    reduction_high: i32,
    warning_threshold: i32,
    critical_threshold: i32,
}

impl TrustPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reduction_low: config.trust_reduction_low,
            reduction_medium: config.trust_reduction_medium,
            reduction_high: config.trust_reduction_high,
            warning_threshold: config.trust_warning_threshold,
            critical_threshold: config.trust_critical_threshold,
        }
    }

    pub fn reduction_for(&self, severity: Severity) -> i32 {
        match severity {
            Severity::Low => self.reduction_low,
            Severity::Medium => self.reduction_medium,
            Severity::High => self.reduction_high,
        }
    }

    /// New score after a reduction. Clamped to [0, 100]; a score never
    /// increases within a session.
    pub fn apply(&self, score: i32, reduction: i32) -> i32 {
        score.saturating_sub(reduction.max(0)).clamp(0, 100)
    }

    pub fn is_warning(&self, score: i32) -> bool {
        score < self.warning_threshold
    }

    /// Strictly below the threshold: a score of exactly
    /// `critical_threshold` keeps the session alive.
    pub fn is_critical(&self, score: i32) -> bool {
        score < self.critical_threshold
    }

    pub fn critical_threshold(&self) -> i32 {
        self.critical_threshold
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            reduction_low: 5,
            reduction_medium: 10,
            reduction_high: 20,
            warning_threshold: 80,
            critical_threshold: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_table_matches_policy() {
        let policy = TrustPolicy::default();
        assert_eq!(policy.reduction_for(Severity::Low), 5);
        assert_eq!(policy.reduction_for(Severity::Medium), 10);
        assert_eq!(policy.reduction_for(Severity::High), 20);
    }

    #[test]
    fn apply_clamps_at_zero() {
        let policy = TrustPolicy::default();
        assert_eq!(policy.apply(10, 20), 0);
        assert_eq!(policy.apply(0, 20), 0);
    }

    #[test]
    fn apply_never_increases() {
        let policy = TrustPolicy::default();
        assert_eq!(policy.apply(60, 0), 60);
        assert_eq!(policy.apply(60, -5), 60);
    }

    #[test]
    fn reductions_commute() {
        let policy = TrustPolicy::default();
        let severities = [
            Severity::High,
            Severity::Low,
            Severity::Medium,
            Severity::High,
        ];
        let forward = severities.iter().fold(100, |score, s| {
            policy.apply(score, policy.reduction_for(*s))
        });
        let reverse = severities.iter().rev().fold(100, |score, s| {
            policy.apply(score, policy.reduction_for(*s))
        });
        assert_eq!(forward, reverse);
        assert_eq!(forward, 100 - (20 + 5 + 10 + 20));
    }

    #[test]
    fn critical_is_strictly_below_threshold() {
        let policy = TrustPolicy::default();
        assert!(policy.is_critical(49));
        assert!(!policy.is_critical(50));
        assert!(!policy.is_critical(51));
    }

    #[test]
    fn warning_is_strictly_below_threshold() {
        let policy = TrustPolicy::default();
        assert!(policy.is_warning(79));
        assert!(!policy.is_warning(80));
    }

    #[test]
    fn three_high_violations_collapse_a_fresh_session() {
        let policy = TrustPolicy::default();
        let mut score = 100;
        for _ in 0..2 {
            score = policy.apply(score, policy.reduction_for(Severity::High));
            assert!(!policy.is_critical(score));
        }
        score = policy.apply(score, policy.reduction_for(Severity::High));
        assert_eq!(score, 40);
        assert!(policy.is_critical(score));
    }
}
