pub mod inventory;
pub mod perf_export;

use calamine::Data;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{CanonicalFacts, ClusterScope, SizingParameters};
use crate::services::table::resolve::cell_text;
use crate::services::table::StructuredTable;
use crate::services::workbook::Workbook;

/// The two export families this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceFormat {
    #[serde(rename = "RVTools")]
    Rvtools,
    #[serde(rename = "Live Optics")]
    LiveOptics,
}

impl SourceFormat {
    pub fn label(&self) -> &'static str {
        match self {
            SourceFormat::Rvtools => "RVTools",
            SourceFormat::LiveOptics => "Live Optics",
        }
    }
}

/// Pure sniff over the present sheet names. Neither signature present is
/// the one fatal input error in the pipeline.
pub fn detect_format(workbook: &Workbook) -> Result<SourceFormat, AppError> {
    if workbook.contains(inventory::SHEET_VMS) {
        Ok(SourceFormat::Rvtools)
    } else if workbook.contains(perf_export::SHEET_VMS)
        && workbook.contains(perf_export::SHEET_HOSTS)
    {
        Ok(SourceFormat::LiveOptics)
    } else {
        Err(AppError::UnrecognizedFormat)
    }
}

pub fn extract_facts(
    format: SourceFormat,
    workbook: &Workbook,
    params: &SizingParameters,
) -> CanonicalFacts {
    match format {
        SourceFormat::Rvtools => inventory::extract(workbook, params),
        SourceFormat::LiveOptics => perf_export::extract(workbook, params),
    }
}

/// Distinct cluster names in the VM sheet, for scope selection upstream.
pub fn cluster_names(format: SourceFormat, workbook: &Workbook) -> Vec<String> {
    match format {
        SourceFormat::Rvtools => inventory::clusters(workbook),
        SourceFormat::LiveOptics => perf_export::clusters(workbook),
    }
}

/// Load a sheet into a structured table, or an empty table when the
/// sheet is absent; every aggregate over an empty table is zero.
pub(crate) fn sheet_table(
    workbook: &Workbook,
    sheet: &str,
    header_keywords: &[&str],
) -> StructuredTable {
    match workbook.sheet(sheet) {
        Some(grid) => StructuredTable::from_grid(grid, header_keywords),
        None => {
            tracing::warn!("Sheet {} not present in workbook", sheet);
            StructuredTable::default()
        }
    }
}

/// Narrow a table to the selected clusters via set inclusion. Without a
/// cluster column, or with the full scope, the table passes through.
pub(crate) fn filter_scope(
    table: &StructuredTable,
    cluster_col: Option<usize>,
    scope: &ClusterScope,
) -> StructuredTable {
    match (cluster_col, scope.is_all()) {
        (Some(col), false) => table.filtered(|row| {
            scope.includes(&cell_text(row.get(col).unwrap_or(&Data::Empty)))
        }),
        _ => table.clone(),
    }
}

/// Keep rows whose power-state cell contains "poweredOn". Without a
/// power-state column nothing is dropped.
pub(crate) fn filter_powered_on(
    table: &StructuredTable,
    power_col: Option<usize>,
) -> StructuredTable {
    match power_col {
        Some(col) => table.filtered(|row| {
            cell_text(row.get(col).unwrap_or(&Data::Empty))
                .to_lowercase()
                .contains("poweredon")
        }),
        None => table.clone(),
    }
}

pub(crate) fn distinct_clusters(table: &StructuredTable, col: Option<usize>) -> Vec<String> {
    let Some(col) = col else {
        return Vec::new();
    };
    let mut names: Vec<String> = table
        .rows()
        .iter()
        .map(|row| cell_text(row.get(col).unwrap_or(&Data::Empty)))
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Heuristic: true when none of the device rows carries a local-disk
/// signature. A weak hint that storage is software-defined; with no
/// device data at all the signal stays false.
pub(crate) fn local_disk_signatures_absent(
    table: &StructuredTable,
    col: Option<usize>,
    signatures: &[&str],
) -> bool {
    let Some(col) = col else {
        return false;
    };
    if table.is_empty() {
        return false;
    }
    !table.rows().iter().any(|row| {
        let text = cell_text(row.get(col).unwrap_or(&Data::Empty)).to_lowercase();
        signatures.iter().any(|sig| text.contains(sig))
    })
}
