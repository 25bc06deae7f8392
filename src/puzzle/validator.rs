//! Logical consistency checks for generated content
//!
//! Pure and deterministic. Family rules run only when `family_data` carries
//! the family's structure; universal rules always run.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::candidate::{Candidate, FamilyData};
use super::inference::{self, approx_eq, format_term, parse_term};

/// Outcome of one validation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogicValidator;

impl LogicValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, candidate: &Candidate) -> ValidationResult {
        let mut errors = Vec::new();

        match &candidate.family_data {
            FamilyData::Pattern { grid } => {
                check_pattern(grid, &candidate.correct_answer, &mut errors)
            }
            FamilyData::Sequence { terms } => {
                check_sequence(terms, &candidate.correct_answer, &mut errors)
            }
            FamilyData::Puzzle { pieces, separator } => {
                check_puzzle(pieces, separator, &candidate.correct_answer, &mut errors)
            }
            FamilyData::Graph { nodes, edges } => check_graph(nodes, edges, &mut errors),
            FamilyData::Spatial { grid, mirror_line } => {
                check_spatial(grid, mirror_line.as_deref(), &mut errors)
            }
            FamilyData::None => {}
        }

        if candidate.correct_answer.trim().is_empty() {
            errors.push("Correct answer is empty".to_string());
        }
        if candidate.explanation.trim().is_empty() {
            errors.push("Explanation is empty".to_string());
        }

        ValidationResult::from_errors(errors)
    }
}

fn check_pattern(grid: &[Vec<String>], answer: &str, errors: &mut Vec<String>) {
    if !inference::is_rectangular(grid) {
        errors.push("Pattern grid is not rectangular".to_string());
        return;
    }

    let holes = inference::placeholder_cells(grid).len();
    if holes != 1 {
        errors.push(format!(
            "Pattern grid must have exactly one missing cell, found {}",
            holes
        ));
        return;
    }

    if let Some(inferred) = inference::infer_pattern(grid) {
        let declared = answer.trim();
        if declared != inferred.symbol {
            errors.push(format!(
                "Pattern answer mismatch: declared '{}', {} alternation gives '{}'",
                declared, inferred.rule, inferred.symbol
            ));
        }
    }
}

fn check_sequence(terms: &[f64], answer: &str, errors: &mut Vec<String>) {
    if terms.len() < 2 {
        errors.push(format!(
            "Sequence needs at least 2 terms, found {}",
            terms.len()
        ));
        return;
    }

    let Some(expected) = inference::infer_next_term(terms) else {
        return;
    };

    match parse_term(answer) {
        Some(declared) if approx_eq(declared, expected) => {}
        Some(declared) => errors.push(format!(
            "Sequence answer mismatch: declared {}, expected {}",
            format_term(declared),
            format_term(expected)
        )),
        None => errors.push(format!(
            "Sequence answer '{}' is not a number, expected {}",
            answer.trim(),
            format_term(expected)
        )),
    }
}

fn check_puzzle(pieces: &[String], separator: &str, answer: &str, errors: &mut Vec<String>) {
    let declared: Vec<&str> = answer
        .split(separator)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if declared.len() != pieces.len() {
        errors.push(format!(
            "Puzzle answer has {} pieces, expected {}",
            declared.len(),
            pieces.len()
        ));
        return;
    }

    if multiset(declared.iter().copied()) != multiset(pieces.iter().map(String::as_str)) {
        errors.push("Puzzle answer does not use the same pieces as the puzzle".to_string());
    }
}

fn multiset<'a>(items: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item.trim().to_lowercase()).or_insert(0) += 1;
    }
    counts
}

fn check_graph(nodes: &[String], edges: &[(String, String)], errors: &mut Vec<String>) {
    let known: BTreeSet<&str> = nodes.iter().map(String::as_str).collect();
    let missing: BTreeSet<&str> = edges
        .iter()
        .flat_map(|(from, to)| [from.as_str(), to.as_str()])
        .filter(|endpoint| !known.contains(endpoint))
        .collect();

    if !missing.is_empty() {
        let names: Vec<&str> = missing.into_iter().collect();
        errors.push(format!(
            "Graph edges reference unknown nodes: {}",
            names.join(", ")
        ));
    }
}

fn check_spatial(grid: &[Vec<String>], mirror_line: Option<&str>, errors: &mut Vec<String>) {
    if mirror_line.is_none_or(|line| line.trim().is_empty()) {
        errors.push("Spatial puzzle has no mirror line".to_string());
    }
    if inference::placeholder_cells(grid).is_empty() {
        errors.push("Spatial puzzle has no position to solve".to_string());
    }
}
