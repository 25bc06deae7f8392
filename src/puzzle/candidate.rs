//! Candidate content and family-shaped payloads
//!
//! A `Candidate` is generated content that has not been persisted yet.
//! `FamilyData` is a tagged union keyed by family; the validator and the
//! corrector match on the tag instead of probing optional keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::family::Family;
use crate::types::utils::scalar_text;
use crate::types::{json_f64_opt, json_string_array, json_text};

/// Symbols the model uses for the cell to be solved
pub const PLACEHOLDERS: [&str; 2] = ["?", "_"];

/// Whether a grid cell is the unanswered position
pub fn is_placeholder(cell: &str) -> bool {
    PLACEHOLDERS.contains(&cell.trim())
}

/// Structured payload, one variant per family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FamilyData {
    Pattern {
        grid: Vec<Vec<String>>,
    },
    Sequence {
        terms: Vec<f64>,
    },
    Puzzle {
        pieces: Vec<String>,
        separator: String,
    },
    Graph {
        nodes: Vec<String>,
        edges: Vec<(String, String)>,
    },
    Spatial {
        grid: Vec<Vec<String>>,
        mirror_line: Option<String>,
    },
    /// Structure absent or unreadable; only universal rules apply
    #[default]
    None,
}

impl FamilyData {
    /// Read the payload for `family` from a parsed model object.
    ///
    /// Looks under `family_data` first and falls back to top-level keys.
    pub fn from_value(family: Family, value: &Value) -> Self {
        let data = value
            .get("family_data")
            .filter(|v| v.is_object())
            .unwrap_or(value);

        let parsed = match family {
            Family::Pattern => data
                .get("grid")
                .and_then(parse_grid)
                .map(|grid| FamilyData::Pattern { grid }),
            Family::Sequence => data
                .get("sequence")
                .or_else(|| data.get("terms"))
                .and_then(parse_terms)
                .map(|terms| FamilyData::Sequence { terms }),
            Family::Puzzle => data.get("pieces").filter(|v| v.is_array()).map(|_| {
                let pieces = json_string_array(data, "pieces");
                let separator = json_text(data, "separator")
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| ",".to_string());
                FamilyData::Puzzle { pieces, separator }
            }),
            Family::Graph => {
                let nodes = data.get("nodes").and_then(|v| v.as_array());
                let edges = data.get("edges").and_then(|v| v.as_array());
                match (nodes, edges) {
                    (Some(nodes), Some(edges)) => Some(FamilyData::Graph {
                        nodes: nodes.iter().filter_map(node_id).collect(),
                        edges: edges.iter().filter_map(parse_edge).collect(),
                    }),
                    _ => None,
                }
            }
            Family::Spatial => {
                let mirror_line = json_text(data, "mirror_line")
                    .or_else(|| json_text(data, "axis"))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
                let grid = data.get("grid").and_then(parse_grid);
                if grid.is_none() && mirror_line.is_none() {
                    None
                } else {
                    Some(FamilyData::Spatial {
                        grid: grid.unwrap_or_default(),
                        mirror_line,
                    })
                }
            }
            Family::Arithmetic => None,
        };

        parsed.unwrap_or(FamilyData::None)
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, FamilyData::None)
    }
}

fn parse_grid(value: &Value) -> Option<Vec<Vec<String>>> {
    let rows = value.as_array()?;
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => Some(
                cells
                    .iter()
                    .map(|c| scalar_text(c).unwrap_or_default().trim().to_string())
                    .collect(),
            ),
            // "XO?" or "X O ?" rows
            Value::String(s) if s.contains([' ', ',']) => Some(
                s.split([' ', ','])
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            Value::String(s) => Some(s.chars().map(|c| c.to_string()).collect()),
            _ => None,
        })
        .collect()
}

fn parse_terms(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    let mut terms = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let term = match item {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match term {
            Some(t) => terms.push(t),
            // trailing "?" marks the term to find
            None if idx == items.len() - 1 => break,
            None => return None,
        }
    }
    Some(terms)
}

fn node_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::Object(_) => json_text(value, "id").or_else(|| json_text(value, "name")),
        other => scalar_text(other),
    };
    id.map(|s| s.trim().to_string())
}

fn parse_edge(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Array(pair) if pair.len() >= 2 => {
            Some((node_id(&pair[0])?, node_id(&pair[1])?))
        }
        Value::Object(_) => {
            let from = json_text(value, "from").or_else(|| json_text(value, "source"))?;
            let to = json_text(value, "to").or_else(|| json_text(value, "target"))?;
            Some((from.trim().to_string(), to.trim().to_string()))
        }
        _ => None,
    }
}

/// Generated content, mutable until persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub family: Family,
    pub title: String,
    pub question: String,
    pub correct_answer: String,
    pub explanation: String,
    pub hints: Vec<String>,
    pub family_data: FamilyData,
    pub difficulty: f64,
    pub estimated_time_minutes: Option<u32>,
    pub tags: Vec<String>,
}

impl Candidate {
    /// Build a candidate from the extracted model object, tagged with `family`.
    ///
    /// Missing text fields become empty strings; the caller decides whether
    /// the result is usable. A missing difficulty is reported as 0.0 so the
    /// normalizer replaces it.
    pub fn from_value(family: Family, value: &Value) -> Self {
        let text = |key: &str| {
            json_text(value, key)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        Self {
            family,
            title: text("title"),
            question: text("question"),
            correct_answer: text("correct_answer"),
            explanation: text("explanation"),
            hints: json_string_array(value, "hints")
                .into_iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            family_data: FamilyData::from_value(family, value),
            difficulty: json_f64_opt(value, "difficulty").unwrap_or(0.0),
            estimated_time_minutes: json_f64_opt(value, "estimated_time")
                .filter(|m| m.is_finite() && *m > 0.0)
                .map(|m| m.round() as u32),
            tags: json_string_array(value, "tags"),
        }
    }

    /// Title and question are required before anything else is checked
    pub fn missing_required(&self) -> Option<&'static str> {
        if self.title.is_empty() {
            Some("title")
        } else if self.question.is_empty() {
            Some("question")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pattern_from_nested_family_data() {
        let v = json!({
            "title": "Noughts",
            "question": "Which symbol completes the grid?",
            "correct_answer": "X",
            "explanation": "Rows alternate.",
            "hints": ["Look at the last row"],
            "difficulty": 2,
            "family_data": {"grid": [["X","O","X"],["O","X","O"],["X","O","?"]]}
        });
        let c = Candidate::from_value(Family::Pattern, &v);
        assert_eq!(c.title, "Noughts");
        assert_eq!(c.difficulty, 2.0);
        match c.family_data {
            FamilyData::Pattern { grid } => assert_eq!(grid[2][2], "?"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pattern_rows_as_strings() {
        let v = json!({"grid": ["XOX", "O X O"]});
        match FamilyData::from_value(Family::Pattern, &v) {
            FamilyData::Pattern { grid } => {
                assert_eq!(grid[0], vec!["X", "O", "X"]);
                assert_eq!(grid[1], vec!["O", "X", "O"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sequence_with_trailing_placeholder() {
        let v = json!({"family_data": {"sequence": [2, 4, "7", 11, 16, "?"]}});
        assert_eq!(
            FamilyData::from_value(Family::Sequence, &v),
            FamilyData::Sequence {
                terms: vec![2.0, 4.0, 7.0, 11.0, 16.0]
            }
        );
    }

    #[test]
    fn test_sequence_with_inner_garbage_is_absent() {
        let v = json!({"sequence": [1, "two", 3]});
        assert_eq!(FamilyData::from_value(Family::Sequence, &v), FamilyData::None);
    }

    #[test]
    fn test_graph_edge_shapes() {
        let v = json!({"family_data": {
            "nodes": ["A", {"id": "B"}, "C"],
            "edges": [["A", "B"], {"from": "B", "to": "C"}, {"source": "C", "target": "D"}]
        }});
        match FamilyData::from_value(Family::Graph, &v) {
            FamilyData::Graph { nodes, edges } => {
                assert_eq!(nodes, vec!["A", "B", "C"]);
                assert_eq!(edges.len(), 3);
                assert_eq!(edges[2], ("C".to_string(), "D".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_puzzle_default_separator() {
        let v = json!({"pieces": ["a", "b"]});
        assert_eq!(
            FamilyData::from_value(Family::Puzzle, &v),
            FamilyData::Puzzle {
                pieces: vec!["a".into(), "b".into()],
                separator: ",".into()
            }
        );
    }

    #[test]
    fn test_numeric_answer_becomes_text() {
        let v = json!({"title": "t", "question": "q", "correct_answer": 22});
        let c = Candidate::from_value(Family::Sequence, &v);
        assert_eq!(c.correct_answer, "22");
        assert_eq!(c.family_data, FamilyData::None);
    }

    #[test]
    fn test_missing_required() {
        let c = Candidate::from_value(Family::Arithmetic, &json!({"title": "t"}));
        assert_eq!(c.missing_required(), Some("question"));
        let c = Candidate::from_value(Family::Arithmetic, &json!({"question": "q"}));
        assert_eq!(c.missing_required(), Some("title"));
    }

    #[test]
    fn test_family_data_serializes_tagged() {
        let data = FamilyData::Graph {
            nodes: vec!["A".into()],
            edges: vec![("A".into(), "A".into())],
        };
        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v["kind"], "graph");
        assert_eq!(v["edges"][0][1], "A");
    }
}
