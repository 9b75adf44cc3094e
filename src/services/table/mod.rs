pub mod resolve;

use calamine::Data;

/// Vendor exports sometimes stack banner/metadata rows above the real
/// header; the scan gives up after this many rows.
pub const HEADER_SCAN_ROWS: usize = 20;

static EMPTY_CELL: Data = Data::Empty;

/// A raw grid with one row promoted to column labels. Immutable after
/// creation; `filtered` returns a new table instead of mutating.
#[derive(Debug, Clone, Default)]
pub struct StructuredTable {
    columns: Vec<String>,
    rows: Vec<Vec<Data>>,
}

impl StructuredTable {
    /// Promote a header row out of a raw grid. The first of the leading
    /// rows whose concatenated lower-cased text contains every keyword
    /// becomes the header; rows above it are dropped. With no match the
    /// top row is used as-is, and downstream column resolution simply
    /// comes up empty instead of failing.
    pub fn from_grid(grid: &[Vec<Data>], header_keywords: &[&str]) -> Self {
        if grid.is_empty() {
            return Self::default();
        }

        let header_row = locate_header(grid, header_keywords);
        let columns: Vec<String> = grid[header_row]
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let width = columns.len();
        let rows = grid[header_row + 1..]
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.resize(width, Data::Empty);
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Data>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, col: usize) -> &Data {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Row-filtered view as a new table; the original is untouched.
    pub fn filtered<F>(&self, keep: F) -> Self
    where
        F: Fn(&[Data]) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }
}

fn locate_header(grid: &[Vec<Data>], keywords: &[&str]) -> usize {
    if keywords.is_empty() {
        return 0;
    }

    for (idx, row) in grid.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let text = row
            .iter()
            .map(|cell| cell.to_string())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if keywords.iter().all(|k| text.contains(&k.to_lowercase())) {
            return idx;
        }
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn n(v: f64) -> Data {
        Data::Float(v)
    }

    #[test]
    fn promotes_header_past_banner_rows() {
        let grid = vec![
            vec![s("Collected by Example Corp")],
            vec![s("Project: refresh 2026"), Data::Empty],
            vec![s("VM Name"), s("Virtual CPU"), s("Cluster")],
            vec![s("app01"), n(4.0), s("Prod")],
        ];

        let table = StructuredTable::from_grid(&grid, &["vm name", "virtual cpu"]);
        assert_eq!(table.columns(), &["VM Name", "Virtual CPU", "Cluster"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.value(0, 0).to_string(), "app01");
    }

    #[test]
    fn falls_back_to_first_row_without_match() {
        let grid = vec![
            vec![s("alpha"), s("beta")],
            vec![n(1.0), n(2.0)],
        ];

        let table = StructuredTable::from_grid(&grid, &["no such header"]);
        assert_eq!(table.columns(), &["alpha", "beta"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn trims_labels_and_keeps_empty_ones() {
        let grid = vec![
            vec![s("  VM  "), Data::Empty, s("CPUs")],
            vec![s("db01"), s("x"), n(8.0)],
        ];

        let table = StructuredTable::from_grid(&grid, &[]);
        assert_eq!(table.columns(), &["VM", "", "CPUs"]);
    }

    #[test]
    fn pads_short_rows_to_column_width() {
        let grid = vec![
            vec![s("VM"), s("CPUs"), s("Cluster")],
            vec![s("short")],
        ];

        let table = StructuredTable::from_grid(&grid, &[]);
        assert!(matches!(table.value(0, 2), Data::Empty));
    }

    #[test]
    fn filtered_produces_new_view() {
        let grid = vec![
            vec![s("VM"), s("CPUs")],
            vec![s("a"), n(2.0)],
            vec![s("b"), n(4.0)],
        ];

        let table = StructuredTable::from_grid(&grid, &[]);
        let only_b = table.filtered(|row| row[0].to_string() == "b");
        assert_eq!(only_b.row_count(), 1);
        assert_eq!(table.row_count(), 2);
    }
}
