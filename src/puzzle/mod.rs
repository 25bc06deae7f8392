//! Puzzle domain: families, candidates, validation and correction

pub mod candidate;
pub mod corrector;
pub mod difficulty;
pub mod family;
pub mod inference;
pub mod validator;

pub use candidate::{Candidate, FamilyData};
pub use corrector::AutoCorrector;
pub use difficulty::{DifficultyPolicy, TierExpectations};
pub use family::{AudienceTier, Family};
pub use validator::{LogicValidator, ValidationResult};
