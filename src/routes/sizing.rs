use axum::{
    extract::State,
    http::Method,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    models::{CanonicalFacts, ClusterScope, SizingParameters, SizingResult},
    services::{pipeline, workbook},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/sizing/analyze", post(analyze_workbook))
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "type")]
    file_type: String,
    signed_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SizingRequest {
    files: Vec<FileInfo>,
    #[serde(default)]
    parameters: SizingParameters,
}

#[derive(Debug, Serialize)]
pub struct SizingResponse {
    source_format: &'static str,
    sheet_names: Vec<String>,
    clusters: Vec<String>,
    scope: String,
    // Target NUMA node, for the renderer's wide-VM check against the
    // per-VM outliers in `facts`.
    target_numa_cores: f64,
    target_numa_ram_gb: f64,
    facts: CanonicalFacts,
    sizing: SizingResult,
    generated_at: String,
}

#[axum::debug_handler]
async fn analyze_workbook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SizingRequest>,
) -> Result<Json<SizingResponse>, AppError> {
    let start = std::time::Instant::now();

    let file_info = request
        .files
        .first()
        .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    if !file_info.file_type.to_lowercase().contains("xlsx") {
        tracing::error!("Unsupported file type: {}", file_info.file_type);
        return Err(AppError::InvalidInput(
            "Only XLSX files are supported".to_string(),
        ));
    }

    tracing::info!("Downloading source file...");
    let download_start = std::time::Instant::now();
    let file_data = workbook::load_file_from_url(&file_info.signed_url).await?;
    tracing::info!(
        "File downloaded, size: {}KB, took: {:?}",
        file_data.len() / 1024,
        download_start.elapsed()
    );

    if file_data.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File exceeds the {} byte limit",
            state.config.max_file_size
        )));
    }

    let decode_start = std::time::Instant::now();
    let wb = workbook::Workbook::from_bytes(file_data)?;
    tracing::info!(
        "Workbook decoded in {:?}: sheets {:?}",
        decode_start.elapsed(),
        wb.sheet_names()
    );

    let analysis = pipeline::analyze(&wb, &request.parameters)?;
    tracing::info!("Analysis completed in {:?}", start.elapsed());

    let scope = ClusterScope::from_selection(&request.parameters.clusters).label();

    Ok(Json(SizingResponse {
        source_format: analysis.format.label(),
        sheet_names: wb.sheet_names(),
        clusters: analysis.clusters,
        scope,
        target_numa_cores: request.parameters.target_numa_cores(),
        target_numa_ram_gb: request.parameters.target_numa_ram_gb(),
        facts: analysis.facts,
        sizing: analysis.sizing,
        generated_at: chrono::Utc::now().to_rfc3339(),
    }))
}
