use std::collections::BTreeMap;
use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use reqwest::Client;

use crate::error::AppError;

pub type Grid = Vec<Vec<Data>>;

/// Decoded workbook: sheet name -> raw cell grid. This is the boundary
/// between file decoding and the analysis engine; everything downstream
/// works on the grids alone.
#[derive(Debug, Default)]
pub struct Workbook {
    sheets: BTreeMap<String, Grid>,
}

impl Workbook {
    pub fn from_bytes(file_data: Bytes) -> Result<Self, AppError> {
        let cursor = Cursor::new(file_data);

        let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor)
            .map_err(|e| AppError::FileProcessing(format!("Failed to open Excel file: {}", e)))?;

        let sheet_names = workbook.sheet_names().to_vec();
        tracing::info!("Decoding {} sheets", sheet_names.len());

        let mut sheets = Vec::new();
        for sheet_name in &sheet_names {
            match workbook.worksheet_range(sheet_name) {
                Ok(range) => {
                    let rows: Grid = range.rows().map(|row| row.to_vec()).collect();
                    if rows.is_empty() {
                        tracing::warn!("Sheet {} is empty, skipping", sheet_name);
                        continue;
                    }
                    sheets.push((sheet_name.clone(), rows));
                }
                Err(e) => {
                    tracing::warn!("Failed to read worksheet {}: {}", sheet_name, e);
                    continue;
                }
            }
        }

        if sheets.is_empty() {
            return Err(AppError::FileProcessing(
                "No readable sheets found in workbook".to_string(),
            ));
        }

        Ok(Self::from_sheets(sheets))
    }

    pub fn from_sheets<I>(sheets: I) -> Self
    where
        I: IntoIterator<Item = (String, Grid)>,
    {
        Self {
            sheets: sheets.into_iter().collect(),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Grid> {
        self.sheets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }
}

pub async fn load_file_from_url(url: &str) -> Result<Bytes, AppError> {
    let client = Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Http(format!("Failed to fetch file: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Http(format!(
            "Failed to fetch file. Status: {}",
            response.status()
        )));
    }

    response
        .bytes()
        .await
        .map_err(|e| AppError::Http(format!("Failed to read response bytes: {}", e)))
}
