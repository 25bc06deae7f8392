//! Difficulty normalization per audience tier

use serde::{Deserialize, Serialize};

use super::family::AudienceTier;
use crate::constants::difficulty;

/// Expected difficulty for each audience tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierExpectations {
    pub beginner: f64,
    pub elementary: f64,
    pub intermediate: f64,
    pub advanced: f64,
    pub expert: f64,
}

impl Default for TierExpectations {
    fn default() -> Self {
        Self {
            beginner: difficulty::expected::BEGINNER,
            elementary: difficulty::expected::ELEMENTARY,
            intermediate: difficulty::expected::INTERMEDIATE,
            advanced: difficulty::expected::ADVANCED,
            expert: difficulty::expected::EXPERT,
        }
    }
}

impl TierExpectations {
    pub fn for_tier(&self, tier: AudienceTier) -> f64 {
        match tier {
            AudienceTier::Beginner => self.beginner,
            AudienceTier::Elementary => self.elementary,
            AudienceTier::Intermediate => self.intermediate,
            AudienceTier::Advanced => self.advanced,
            AudienceTier::Expert => self.expert,
        }
    }
}

/// Keeps the model's difficulty when plausible for the tier, otherwise
/// substitutes the tier's expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyPolicy {
    pub expected: TierExpectations,
    pub max_deviation: f64,
    pub hardest_floor: f64,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            expected: TierExpectations::default(),
            max_deviation: difficulty::MAX_DEVIATION,
            hardest_floor: difficulty::HARDEST_FLOOR,
        }
    }
}

impl DifficultyPolicy {
    pub fn normalize(&self, reported: f64, tier: AudienceTier) -> f64 {
        let expected = self.expected.for_tier(tier);
        let in_range = (difficulty::MIN..=difficulty::MAX).contains(&reported);

        let value = if in_range && (reported - expected).abs() <= self.max_deviation {
            reported
        } else {
            expected
        };

        if tier.is_hardest() {
            value.max(self.hardest_floor)
        } else {
            value
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let range = difficulty::MIN..=difficulty::MAX;
        for tier in [
            AudienceTier::Beginner,
            AudienceTier::Elementary,
            AudienceTier::Intermediate,
            AudienceTier::Advanced,
            AudienceTier::Expert,
        ] {
            let value = self.expected.for_tier(tier);
            if !range.contains(&value) {
                return Err(format!(
                    "difficulty.expected.{} must be between {} and {}, got {}",
                    tier,
                    difficulty::MIN,
                    difficulty::MAX,
                    value
                ));
            }
        }
        if self.max_deviation.is_nan() || self.max_deviation < 0.0 {
            return Err("difficulty.max_deviation must be non-negative".to_string());
        }
        if !range.contains(&self.hardest_floor) {
            return Err(format!(
                "difficulty.hardest_floor must be between {} and {}",
                difficulty::MIN,
                difficulty::MAX
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_plausible_value() {
        let policy = DifficultyPolicy::default();
        assert_eq!(policy.normalize(2.5, AudienceTier::Intermediate), 2.5);
        assert_eq!(policy.normalize(4.5, AudienceTier::Intermediate), 4.5);
    }

    #[test]
    fn test_replaces_outliers() {
        let policy = DifficultyPolicy::default();
        assert_eq!(policy.normalize(5.0, AudienceTier::Beginner), 1.5);
        assert_eq!(policy.normalize(0.0, AudienceTier::Elementary), 2.0);
        assert_eq!(policy.normalize(7.0, AudienceTier::Advanced), 3.5);
        assert_eq!(policy.normalize(f64::NAN, AudienceTier::Intermediate), 3.0);
    }

    #[test]
    fn test_hardest_tier_floor() {
        let policy = DifficultyPolicy::default();
        // 3.2 is within 1.5 of 4.5 but below the floor
        assert_eq!(policy.normalize(3.2, AudienceTier::Expert), 4.0);
        assert_eq!(policy.normalize(4.8, AudienceTier::Expert), 4.8);
        assert_eq!(policy.normalize(1.0, AudienceTier::Expert), 4.5);
    }

    #[test]
    fn test_configured_constants() {
        let policy = DifficultyPolicy {
            max_deviation: 0.5,
            ..Default::default()
        };
        assert_eq!(policy.normalize(3.6, AudienceTier::Intermediate), 3.0);
        assert!(policy.validate().is_ok());

        let bad = DifficultyPolicy {
            hardest_floor: 9.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
