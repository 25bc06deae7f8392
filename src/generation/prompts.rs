//! Generation prompts
//!
//! The system instruction fixes the JSON shape for the family; the user
//! instruction carries the audience and the caller's (sanitized) hint.

use crate::ai::PromptBuilder;
use crate::puzzle::{AudienceTier, Family};

const COMMON_FIELDS: &str = r#"  "title": "Short title",
  "question": "What the solver is asked",
  "correct_answer": "The single correct answer",
  "explanation": "Why the answer is correct, step by step",
  "hints": ["A gentle nudge", "A stronger nudge"],
  "difficulty": 3,
  "estimated_time": 5,
  "tags": ["topic"]"#;

fn family_shape(family: Family) -> (&'static str, &'static str) {
    match family {
        Family::Pattern => (
            "grid pattern puzzles",
            r#""family_data": {"grid": [["X","O","X"],["O","X","O"],["X","O","?"]]}"#,
        ),
        Family::Sequence => (
            "number sequences",
            r#""family_data": {"sequence": [2, 4, 7, 11, 16]}"#,
        ),
        Family::Puzzle => (
            "ordering puzzles",
            r#""family_data": {"pieces": ["first", "second", "third"], "separator": ","}"#,
        ),
        Family::Graph => (
            "node and edge puzzles",
            r#""family_data": {"nodes": ["A","B","C"], "edges": [["A","B"],["B","C"]]}"#,
        ),
        Family::Spatial => (
            "symmetry and mirror puzzles",
            r##""family_data": {"grid": [["#","."],["?","."]], "mirror_line": "vertical"}"##,
        ),
        Family::Arithmetic => ("arithmetic word problems", ""),
    }
}

fn family_rules(family: Family) -> Vec<&'static str> {
    match family {
        Family::Pattern => vec![
            "Mark exactly one missing cell with ?",
            "Every row must have the same number of cells",
            "The missing symbol must follow from a row, column or diagonal that alternates two symbols",
        ],
        Family::Sequence => vec![
            "List the shown terms only; the answer is the next term",
            "Use a constant difference or a difference that grows by a constant step",
        ],
        Family::Puzzle => vec![
            "correct_answer lists every piece exactly once, joined by the separator",
        ],
        Family::Graph => vec!["Every edge must connect two listed nodes"],
        Family::Spatial => vec![
            "Declare the mirror line",
            "Mark each position to solve with ?",
        ],
        Family::Arithmetic => vec!["Use whole numbers unless the audience can handle fractions"],
    }
}

/// System instruction describing the JSON the model must return
pub fn system_prompt(family: Family) -> String {
    let (task, shape) = family_shape(family);
    let body = if shape.is_empty() {
        format!("{{\n{}\n}}", COMMON_FIELDS)
    } else {
        format!("{{\n{},\n  {}\n}}", COMMON_FIELDS, shape)
    };

    PromptBuilder::new()
        .role("educational puzzle designer", task)
        .objectives(vec![
            "Write one original puzzle with exactly one correct answer",
            "Make the explanation prove the answer",
            "Rate difficulty from 1 (easiest) to 5 (hardest)",
        ])
        .section("Rules", &bullet_list(&family_rules(family)))
        .section("Output", "Return a single JSON object and nothing else:")
        .code("json", &body)
        .focus(
            &format!("one {} puzzle", family),
            vec!["No prose before or after the JSON", "No markdown inside values"],
        )
        .build()
}

/// User instruction with audience and optional hint
pub fn user_prompt(family: Family, tier: AudienceTier, hint: Option<&str>) -> String {
    let mut builder = PromptBuilder::new()
        .context_item("Family", family.as_str())
        .context_item("Audience", tier.audience());
    if let Some(hint) = hint {
        builder = builder.context_item("Theme", hint);
    }
    builder
        .text(&format!(
            "Create one {} puzzle for {} solvers.",
            family,
            tier.as_str()
        ))
        .build()
}

fn bullet_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
