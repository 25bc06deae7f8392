//! Deterministic answer correction for families with a constructive rule
//!
//! Only pattern and sequence can be rebuilt from `family_data`; every other
//! family passes through unchanged. Inference never reads `correct_answer`,
//! so correcting twice is the same as correcting once.

use tracing::debug;

use super::candidate::{Candidate, FamilyData};
use super::inference::{self, format_term};

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoCorrector;

impl AutoCorrector {
    pub fn new() -> Self {
        Self
    }

    pub fn correct(&self, candidate: &Candidate) -> Candidate {
        let Some((answer, sentence)) = inferred_answer(&candidate.family_data) else {
            return candidate.clone();
        };

        let mut corrected = candidate.clone();
        if corrected.correct_answer.trim() != answer {
            debug!(
                family = %candidate.family,
                from = %candidate.correct_answer,
                to = %answer,
                "Auto-corrected answer"
            );
        }

        if !mentions(&corrected.explanation, &answer) {
            corrected.explanation = if corrected.explanation.trim().is_empty() {
                sentence
            } else {
                format!("{} {}", sentence, corrected.explanation.trim())
            };
        }
        corrected.correct_answer = answer;
        corrected
    }
}

/// Answer plus the explanation sentence that justifies it
fn inferred_answer(data: &FamilyData) -> Option<(String, String)> {
    match data {
        FamilyData::Pattern { grid } => {
            let inferred = inference::infer_pattern(grid)?;
            let sentence = format!(
                "The {} alternates between two symbols, so the missing cell is {}.",
                inferred.rule, inferred.symbol
            );
            Some((inferred.symbol, sentence))
        }
        FamilyData::Sequence { terms } => {
            let next = inference::infer_next_term(terms)?;
            let answer = format_term(next);
            let sentence = if is_constant_step(terms) {
                format!(
                    "Each term changes by the same amount, so the next term is {}.",
                    answer
                )
            } else {
                format!(
                    "The difference between terms grows by a constant step, so the next term is {}.",
                    answer
                )
            };
            Some((answer, sentence))
        }
        _ => None,
    }
}

/// Whether `token` appears in `text` as a whole word or number, so `2` is
/// not found in `12` or `2.5`
fn mentions(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let numeric = token.starts_with(|c: char| c.is_ascii_digit());

    text.match_indices(token).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let mut after = text[start + token.len()..].chars();
        let next = after.next();

        let open = before.is_none_or(|c| {
            !(c.is_alphanumeric() || (numeric && matches!(c, '.' | '-' | ',')))
        });
        let closed = match next {
            None => true,
            Some(c) if c.is_alphanumeric() => false,
            Some('.' | ',') => !after.next().is_some_and(|c| c.is_ascii_digit()),
            Some(_) => true,
        };
        open && closed
    })
}

fn is_constant_step(terms: &[f64]) -> bool {
    let diffs: Vec<f64> = terms.windows(2).map(|w| w[1] - w[0]).collect();
    diffs
        .first()
        .is_some_and(|first| diffs.iter().all(|d| inference::approx_eq(*d, *first)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::family::Family;
    use crate::puzzle::validator::LogicValidator;
    use proptest::prelude::*;

    fn candidate(family: Family, answer: &str, explanation: &str, data: FamilyData) -> Candidate {
        Candidate {
            family,
            title: "Title".into(),
            question: "Question?".into(),
            correct_answer: answer.into(),
            explanation: explanation.into(),
            hints: vec![],
            family_data: data,
            difficulty: 2.0,
            estimated_time_minutes: None,
            tags: vec![],
        }
    }

    fn pattern_grid() -> FamilyData {
        FamilyData::Pattern {
            grid: ["XOX", "OXO", "XO?"]
                .iter()
                .map(|r| r.chars().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_pattern_corrected_and_revalidates() {
        let c = candidate(Family::Pattern, "O", "Rows alternate.", pattern_grid());
        let validator = LogicValidator::new();
        assert!(!validator.validate(&c).is_valid);

        let fixed = AutoCorrector::new().correct(&c);
        assert_eq!(fixed.correct_answer, "X");
        assert!(fixed.explanation.starts_with("The row alternates"));
        assert!(fixed.explanation.ends_with("Rows alternate."));
        assert!(validator.validate(&fixed).is_valid);
    }

    #[test]
    fn test_sequence_corrected() {
        let c = candidate(
            Family::Sequence,
            "18",
            "Add two each time.",
            FamilyData::Sequence {
                terms: vec![2.0, 4.0, 7.0, 11.0, 16.0],
            },
        );
        let fixed = AutoCorrector::new().correct(&c);
        assert_eq!(fixed.correct_answer, "22");
        assert!(fixed.explanation.contains("22"));
        assert!(LogicValidator::new().validate(&fixed).is_valid);
    }

    #[test]
    fn test_explanation_kept_when_it_mentions_answer() {
        let c = candidate(
            Family::Sequence,
            "14",
            "Add 3 each time, giving 15.",
            FamilyData::Sequence {
                terms: vec![3.0, 6.0, 9.0, 12.0],
            },
        );
        let fixed = AutoCorrector::new().correct(&c);
        assert_eq!(fixed.correct_answer, "15");
        assert_eq!(fixed.explanation, "Add 3 each time, giving 15.");
    }

    #[test]
    fn test_answer_inside_other_number_is_not_a_mention() {
        let c = candidate(
            Family::Sequence,
            "1",
            "Add 12 each time.",
            FamilyData::Sequence {
                terms: vec![-4.0, -2.0, 0.0],
            },
        );
        let fixed = AutoCorrector::new().correct(&c);
        assert_eq!(fixed.correct_answer, "2");
        assert!(fixed.explanation.starts_with("Each term changes by the same amount"));
        assert!(fixed.explanation.ends_with("Add 12 each time."));
    }

    #[test]
    fn test_mentions_matches_whole_tokens() {
        assert!(mentions("giving 15.", "15"));
        assert!(mentions("15 is next", "15"));
        assert!(mentions("the answer (X) fits", "X"));
        assert!(!mentions("Add 12 each time", "2"));
        assert!(!mentions("about 2.5 more", "2"));
        assert!(!mentions("down to -3", "3"));
        assert!(!mentions("eXtra", "X"));
        assert!(!mentions("anything", ""));
    }

    #[test]
    fn test_fractional_sequence_corrected_and_revalidates() {
        let c = candidate(
            Family::Sequence,
            "0.4",
            "Step by a tenth.",
            FamilyData::Sequence {
                terms: vec![0.1234567, 0.2234567, 0.3234567],
            },
        );
        let fixed = AutoCorrector::new().correct(&c);
        assert_eq!(fixed.correct_answer, "0.4234567");
        assert!(LogicValidator::new().validate(&fixed).is_valid);
    }

    #[test]
    fn test_families_without_rule_are_identity() {
        let c = candidate(
            Family::Graph,
            "A-B",
            "Walk it.",
            FamilyData::Graph {
                nodes: vec!["A".into()],
                edges: vec![("A".into(), "B".into())],
            },
        );
        assert_eq!(AutoCorrector::new().correct(&c), c);

        let c = candidate(Family::Sequence, "7", "Guess.", FamilyData::None);
        assert_eq!(AutoCorrector::new().correct(&c), c);
    }

    #[test]
    fn test_no_inference_leaves_candidate_alone() {
        let c = candidate(
            Family::Sequence,
            "32",
            "Doubling.",
            FamilyData::Sequence {
                terms: vec![1.0, 2.0, 4.0, 8.0, 16.0],
            },
        );
        assert_eq!(AutoCorrector::new().correct(&c), c);
    }

    #[test]
    fn test_correct_is_idempotent() {
        let corrector = AutoCorrector::new();
        let c = candidate(Family::Pattern, "O", "", pattern_grid());
        let once = corrector.correct(&c);
        assert_eq!(corrector.correct(&once), once);
    }

    proptest! {
        #[test]
        fn prop_sequence_correction_idempotent(
            start in -100i64..100,
            step in -10i64..10,
            growth in 0i64..4,
            len in 3usize..8,
            declared in -500i64..500,
        ) {
            let mut terms = vec![start as f64];
            let mut diff = step;
            for _ in 1..len {
                let last = terms[terms.len() - 1];
                terms.push(last + diff as f64);
                diff += growth;
            }
            let c = candidate(
                Family::Sequence,
                &declared.to_string(),
                "Look closely.",
                FamilyData::Sequence { terms },
            );
            let corrector = AutoCorrector::new();
            let once = corrector.correct(&c);
            prop_assert_eq!(corrector.correct(&once), once.clone());
            prop_assert!(LogicValidator::new().validate(&once).is_valid);
        }

        #[test]
        fn prop_fractional_sequence_correction_revalidates(
            start in -1000.0f64..1000.0,
            step in -50.0f64..50.0,
            len in 3usize..8,
        ) {
            prop_assume!(step.abs() > 1e-3);
            let terms: Vec<f64> = (0..len).map(|i| start + step * i as f64).collect();
            let c = candidate(
                Family::Sequence,
                "0",
                "Look closely.",
                FamilyData::Sequence { terms },
            );
            let corrector = AutoCorrector::new();
            let once = corrector.correct(&c);
            prop_assert_eq!(corrector.correct(&once), once.clone());
            prop_assert!(LogicValidator::new().validate(&once).is_valid);
        }
    }
}
