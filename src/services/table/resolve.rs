use std::collections::HashMap;

use calamine::Data;

use super::StructuredTable;

/// A semantic field backed by an ordered list of accepted header keywords.
/// The first keyword that resolves wins.
pub struct FieldSpec {
    pub field: &'static str,
    pub keywords: &'static [&'static str],
}

/// Per-table binding of semantic fields to concrete column indexes,
/// resolved once when the table is loaded. An unresolved field stays
/// `None` and every aggregate over it degrades to zero.
#[derive(Debug, Default)]
pub struct ColumnMap {
    bindings: HashMap<&'static str, Option<usize>>,
}

impl ColumnMap {
    pub fn bind(table: &StructuredTable, fields: &[FieldSpec]) -> Self {
        let bindings = fields
            .iter()
            .map(|spec| {
                let col = spec
                    .keywords
                    .iter()
                    .find_map(|keyword| find_column(table, keyword));
                (spec.field, col)
            })
            .collect();
        Self { bindings }
    }

    pub fn col(&self, field: &str) -> Option<usize> {
        self.bindings.get(field).copied().flatten()
    }
}

/// First column whose label contains the keyword, case-insensitively.
/// Multiple matches are not detected; column order decides. Empty labels
/// are addressable by index but never matched here.
pub fn find_column(table: &StructuredTable, keyword: &str) -> Option<usize> {
    if keyword.is_empty() {
        return None;
    }
    let needle = keyword.to_lowercase();
    table
        .columns()
        .iter()
        .position(|label| !label.is_empty() && label.to_lowercase().contains(&needle))
}

/// Numbers arrive as floats, ints, or locale-formatted strings
/// ("1,024"). Anything else coerces to `None`.
pub fn coerce_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    }
}

pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Column sum with cell-level coercion; a missing column or an
/// uncoercible cell contributes zero rather than failing, so absent
/// optional data never aborts an analysis.
pub fn sum_column(table: &StructuredTable, col: Option<usize>) -> f64 {
    let Some(col) = col else {
        return 0.0;
    };
    table
        .rows()
        .iter()
        .map(|row| row.get(col).and_then(coerce_number).unwrap_or(0.0))
        .sum()
}

const UNIT_VARIANTS: &[(&str, f64)] = &[
    ("MiB", 1_048_576.0),
    ("MB", 1_048_576.0),
    ("GiB", 1_024.0),
    ("GB", 1_024.0),
    ("TB", 1.0),
];

/// Sum a `{base} <unit>` style column and normalize it to terabytes.
/// Inventory exports label units bare ("Capacity MiB"), performance
/// exports parenthesize ("Capacity (GiB)"); both spellings are probed for
/// each unit, in descending granularity, and the first variant with a
/// nonzero sum wins. A metric that is legitimately zero cannot be told
/// apart from an absent column; that ambiguity is accepted.
pub fn sum_in_tb(table: &StructuredTable, base: &str) -> f64 {
    for (unit, divisor) in UNIT_VARIANTS {
        for label in [format!("{} {}", base, unit), format!("{} ({})", base, unit)] {
            if let Some(col) = find_column(table, &label) {
                let total = sum_column(table, Some(col));
                if total != 0.0 {
                    return total / divisor;
                }
            }
        }
    }
    0.0
}

/// Most frequent coerced value in a column; ties keep the value seen
/// first. Empty column or unresolved field -> `None`.
pub fn column_mode(table: &StructuredTable, col: Option<usize>) -> Option<f64> {
    let col = col?;
    numeric_mode(
        table
            .rows()
            .iter()
            .filter_map(|row| row.get(col).and_then(coerce_number)),
    )
}

/// Most frequent non-empty text in a column; ties keep the first seen.
pub fn text_column_mode(table: &StructuredTable, col: Option<usize>) -> Option<String> {
    let col = col?;
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in table.rows() {
        let text = cell_text(row.get(col).unwrap_or(&Data::Empty));
        if text.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(seen, _)| *seen == text) {
            Some((_, n)) => *n += 1,
            None => counts.push((text, 1)),
        }
    }
    pick_mode(counts)
}

pub fn numeric_mode<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for v in values {
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    pick_mode(counts)
}

fn pick_mode<T>(counts: Vec<(T, usize)>) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        // Strict > keeps the first-seen value on ties.
        let better = match &best {
            Some((_, best_count)) => count > *best_count,
            None => true,
        };
        if better {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// Row index and value of the column maximum; ties resolve to the first
/// occurrence in scan order.
pub fn max_by_column(table: &StructuredTable, col: Option<usize>) -> Option<(usize, f64)> {
    let col = col?;
    let mut best: Option<(usize, f64)> = None;
    for (idx, row) in table.rows().iter().enumerate() {
        let Some(value) = row.get(col).and_then(coerce_number) else {
            continue;
        };
        let better = match best {
            Some((_, best_value)) => value > best_value,
            None => true,
        };
        if better {
            best = Some((idx, value));
        }
    }
    best
}
