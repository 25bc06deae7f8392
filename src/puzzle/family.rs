//! Puzzle families and audience tiers

use serde::{Deserialize, Serialize};

/// Kind of exercise being generated; selects prompt shape and validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// 2-D symbol grid with one missing cell
    Pattern,
    /// Numeric sequence, answer is the next term
    Sequence,
    /// Ordering puzzle, answer lists the pieces in order
    Puzzle,
    /// Node/edge puzzle
    Graph,
    /// Mirror/symmetry puzzle
    #[serde(alias = "symmetry")]
    Spatial,
    /// Free-form math exercise without structured data
    Arithmetic,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Pattern,
        Family::Sequence,
        Family::Puzzle,
        Family::Graph,
        Family::Spatial,
        Family::Arithmetic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Pattern => "pattern",
            Family::Sequence => "sequence",
            Family::Puzzle => "puzzle",
            Family::Graph => "graph",
            Family::Spatial => "spatial",
            Family::Arithmetic => "arithmetic",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pattern" => Ok(Family::Pattern),
            "sequence" => Ok(Family::Sequence),
            "puzzle" => Ok(Family::Puzzle),
            "graph" => Ok(Family::Graph),
            "spatial" | "symmetry" => Ok(Family::Spatial),
            "arithmetic" => Ok(Family::Arithmetic),
            _ => Err(format!(
                "Unknown family: {}. Valid values: pattern, sequence, puzzle, graph, spatial, arithmetic",
                s
            )),
        }
    }
}

/// Target age/skill bracket driving difficulty and vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceTier {
    Beginner,
    Elementary,
    Intermediate,
    Advanced,
    /// Hardest tier; difficulty never drops below the configured floor
    Expert,
}

impl AudienceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceTier::Beginner => "beginner",
            AudienceTier::Elementary => "elementary",
            AudienceTier::Intermediate => "intermediate",
            AudienceTier::Advanced => "advanced",
            AudienceTier::Expert => "expert",
        }
    }

    pub fn is_hardest(&self) -> bool {
        matches!(self, AudienceTier::Expert)
    }

    /// Short description used in prompts
    pub fn audience(&self) -> &'static str {
        match self {
            AudienceTier::Beginner => "young children (ages 5-7) who are just starting out",
            AudienceTier::Elementary => "primary school pupils (ages 8-10)",
            AudienceTier::Intermediate => "middle school students (ages 11-13)",
            AudienceTier::Advanced => "high school students and confident adults",
            AudienceTier::Expert => "puzzle enthusiasts looking for a real challenge",
        }
    }
}

impl std::fmt::Display for AudienceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AudienceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(AudienceTier::Beginner),
            "elementary" => Ok(AudienceTier::Elementary),
            "intermediate" => Ok(AudienceTier::Intermediate),
            "advanced" => Ok(AudienceTier::Advanced),
            "expert" | "hardest" => Ok(AudienceTier::Expert),
            _ => Err(format!(
                "Unknown audience tier: {}. Valid values: beginner, elementary, intermediate, advanced, expert",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse() {
        assert_eq!("Pattern".parse::<Family>(), Ok(Family::Pattern));
        assert_eq!("symmetry".parse::<Family>(), Ok(Family::Spatial));
        assert!("crossword".parse::<Family>().is_err());
    }

    #[test]
    fn test_family_serde_alias() {
        let family: Family = serde_json::from_str("\"symmetry\"").unwrap();
        assert_eq!(family, Family::Spatial);
        assert_eq!(serde_json::to_string(&Family::Graph).unwrap(), "\"graph\"");
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("hardest".parse::<AudienceTier>(), Ok(AudienceTier::Expert));
        assert!(AudienceTier::Expert.is_hardest());
        assert!(!AudienceTier::Advanced.is_hardest());
        assert!("toddler".parse::<AudienceTier>().is_err());
    }
}
