//! Deterministic answer inference
//!
//! Shared by the validator (to check the declared answer) and the corrector
//! (to rewrite it). Inference only ever reads `family_data`.

use super::candidate::is_placeholder;

/// Tolerance for comparing sequence terms
const EPSILON: f64 = 1e-9;

/// Which rule produced a pattern inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternRule {
    Row,
    Column,
    MainDiagonal,
    AntiDiagonal,
}

impl std::fmt::Display for PatternRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternRule::Row => write!(f, "row"),
            PatternRule::Column => write!(f, "column"),
            PatternRule::MainDiagonal => write!(f, "main diagonal"),
            PatternRule::AntiDiagonal => write!(f, "anti-diagonal"),
        }
    }
}

/// Expected symbol for the placeholder and the rule that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternInference {
    pub symbol: String,
    pub rule: PatternRule,
}

/// Whether every row has the same length as the first
pub fn is_rectangular(grid: &[Vec<String>]) -> bool {
    match grid.first() {
        Some(first) => !first.is_empty() && grid.iter().all(|row| row.len() == first.len()),
        None => false,
    }
}

/// Positions of all placeholder cells, row-major
pub fn placeholder_cells(grid: &[Vec<String>]) -> Vec<(usize, usize)> {
    grid.iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| is_placeholder(cell))
                .map(move |(c, _)| (r, c))
        })
        .collect()
}

/// Infer the symbol hidden behind the unique placeholder.
///
/// Lines are tried in precedence order: row, column, main diagonal,
/// anti-diagonal. The first line forming a deterministic 2-symbol
/// alternation wins. Returns `None` for non-rectangular grids, grids without
/// exactly one placeholder, or when no rule applies.
pub fn infer_pattern(grid: &[Vec<String>]) -> Option<PatternInference> {
    if !is_rectangular(grid) {
        return None;
    }
    let cells = placeholder_cells(grid);
    let [(r, c)] = cells.as_slice() else {
        return None;
    };
    let (r, c) = (*r, *c);
    let rows = grid.len();
    let cols = grid[0].len();

    let row: Vec<&str> = grid[r].iter().map(String::as_str).collect();
    if let Some(symbol) = alternation_at(&row, c) {
        return Some(PatternInference {
            symbol,
            rule: PatternRule::Row,
        });
    }

    let column: Vec<&str> = grid.iter().map(|row| row[c].as_str()).collect();
    if let Some(symbol) = alternation_at(&column, r) {
        return Some(PatternInference {
            symbol,
            rule: PatternRule::Column,
        });
    }

    if rows == cols {
        if r == c {
            let diagonal: Vec<&str> = (0..rows).map(|k| grid[k][k].as_str()).collect();
            if let Some(symbol) = alternation_at(&diagonal, r) {
                return Some(PatternInference {
                    symbol,
                    rule: PatternRule::MainDiagonal,
                });
            }
        }
        if r + c == rows - 1 {
            let anti: Vec<&str> = (0..rows).map(|k| grid[k][rows - 1 - k].as_str()).collect();
            if let Some(symbol) = alternation_at(&anti, r) {
                return Some(PatternInference {
                    symbol,
                    rule: PatternRule::AntiDiagonal,
                });
            }
        }
    }

    None
}

/// Symbol at `hole` if `line` is a strict A/B/A/B alternation.
///
/// Both symbols must be observed and distinct, and every known cell must
/// agree with its parity.
fn alternation_at(line: &[&str], hole: usize) -> Option<String> {
    if line.len() < 3 {
        return None;
    }

    let mut even: Option<&str> = None;
    let mut odd: Option<&str> = None;

    for (idx, cell) in line.iter().enumerate() {
        if idx == hole {
            continue;
        }
        let cell = cell.trim();
        if is_placeholder(cell) {
            return None;
        }
        let slot = if idx % 2 == 0 { &mut even } else { &mut odd };
        match *slot {
            Some(seen) if seen != cell => return None,
            Some(_) => {}
            None => *slot = Some(cell),
        }
    }

    match (even, odd) {
        (Some(a), Some(b)) if a != b => {
            let symbol = if hole % 2 == 0 { a } else { b };
            Some(symbol.to_string())
        }
        _ => None,
    }
}

/// Next term of a sequence with a constant or linearly growing difference.
///
/// `None` for fewer than two terms or when neither rule fits.
pub fn infer_next_term(terms: &[f64]) -> Option<f64> {
    if terms.len() < 2 || terms.iter().any(|t| !t.is_finite()) {
        return None;
    }

    let diffs: Vec<f64> = terms.windows(2).map(|w| w[1] - w[0]).collect();
    let last = terms[terms.len() - 1];
    let last_diff = diffs[diffs.len() - 1];

    if diffs.iter().all(|d| approx_eq(*d, diffs[0])) {
        return Some(last + diffs[0]);
    }

    if diffs.len() >= 2 {
        let steps: Vec<f64> = diffs.windows(2).map(|w| w[1] - w[0]).collect();
        if steps.iter().all(|s| approx_eq(*s, steps[0])) {
            return Some(last + last_diff + steps[0]);
        }
    }

    None
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Render a term the way a person would write it: `22`, not `22.0`.
///
/// Uses the fewest decimals that still parse back within `approx_eq`, so a
/// formatted answer always passes the comparison it was derived for.
pub fn format_term(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    (0..=17)
        .map(|decimals| format!("{:.*}", decimals, value))
        .find(|text| text.parse::<f64>().is_ok_and(|parsed| approx_eq(parsed, value)))
        .map(|text| trim_decimals(&text).to_string())
        .unwrap_or_else(|| format!("{}", value))
}

fn trim_decimals(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Parse a declared numeric answer, tolerating surrounding whitespace
pub fn parse_term(answer: &str) -> Option<f64> {
    answer.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_row_alternation_wins() {
        let g = grid(&[&["X", "O", "X"], &["O", "X", "O"], &["X", "O", "?"]]);
        let inference = infer_pattern(&g).unwrap();
        assert_eq!(inference.symbol, "X");
        assert_eq!(inference.rule, PatternRule::Row);
    }

    #[test]
    fn test_column_used_when_row_is_not_alternating() {
        let g = grid(&[&["A", "B", "C"], &["C", "C", "C"], &["A", "?", "B"]]);
        // row [A, ?, B] has both parity slots even -> A and B disagree
        // column [B, C, ?] -> even slots B, ? -> expected B
        let inference = infer_pattern(&g).unwrap();
        assert_eq!(inference.symbol, "B");
        assert_eq!(inference.rule, PatternRule::Column);
    }

    #[test]
    fn test_main_diagonal() {
        let g = grid(&[
            &["R", "x", "y", "z"],
            &["q", "G", "w", "v"],
            &["a", "b", "?", "c"],
            &["d", "e", "f", "G"],
        ]);
        let inference = infer_pattern(&g).unwrap();
        assert_eq!(inference.symbol, "R");
        assert_eq!(inference.rule, PatternRule::MainDiagonal);
    }

    #[test]
    fn test_anti_diagonal() {
        let g = grid(&[&["a", "b", "S"], &["a", "T", "d"], &["?", "e", "e"]]);
        let inference = infer_pattern(&g).unwrap();
        assert_eq!(inference.symbol, "S");
        assert_eq!(inference.rule, PatternRule::AntiDiagonal);
    }

    #[test]
    fn test_no_rule_applies() {
        let g = grid(&[&["a", "b", "c"], &["d", "a", "c"], &["h", "h", "?"]]);
        assert_eq!(infer_pattern(&g), None);
    }

    #[test]
    fn test_requires_unique_placeholder() {
        let g = grid(&[&["X", "?", "X"], &["O", "X", "?"]]);
        assert_eq!(infer_pattern(&g), None);
        let g = grid(&[&["X", "O", "X"]]);
        assert_eq!(infer_pattern(&g), None);
    }

    #[test]
    fn test_ragged_grid_rejected() {
        let g = grid(&[&["X", "O", "X"], &["O", "?"]]);
        assert!(!is_rectangular(&g));
        assert_eq!(infer_pattern(&g), None);
    }

    #[test]
    fn test_constant_difference() {
        assert_eq!(infer_next_term(&[3.0, 7.0, 11.0]), Some(15.0));
        assert_eq!(infer_next_term(&[10.0, 7.0]), Some(4.0));
    }

    #[test]
    fn test_linearly_growing_difference() {
        assert_eq!(infer_next_term(&[2.0, 4.0, 7.0, 11.0, 16.0]), Some(22.0));
        assert_eq!(infer_next_term(&[1.0, 2.0, 4.0, 7.0]), Some(11.0));
    }

    #[test]
    fn test_no_sequence_rule() {
        assert_eq!(infer_next_term(&[1.0, 2.0, 4.0, 8.0, 16.0]), None);
        assert_eq!(infer_next_term(&[5.0]), None);
    }

    #[test]
    fn test_format_term() {
        assert_eq!(format_term(22.0), "22");
        assert_eq!(format_term(-3.0), "-3");
        assert_eq!(format_term(2.5), "2.5");
        assert_eq!(format_term(0.1 + 0.2), "0.3");
    }

    #[test]
    fn test_format_term_keeps_needed_precision() {
        let next = infer_next_term(&[0.1234567, 0.2234567, 0.3234567]).unwrap();
        let text = format_term(next);
        assert_eq!(text, "0.4234567");
        assert!(approx_eq(parse_term(&text).unwrap(), next));
    }
}
