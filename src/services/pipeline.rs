//! The full analysis pass: one decoded workbook plus one parameter set
//! in, canonical facts plus a sizing decision out. Stateless; every call
//! recomputes from scratch, so repeated requests with the same inputs are
//! reproducible by construction.

use crate::error::AppError;
use crate::models::{CanonicalFacts, SizingParameters, SizingResult};
use crate::services::adapter::{self, SourceFormat};
use crate::services::solver;
use crate::services::workbook::Workbook;

#[derive(Debug)]
pub struct Analysis {
    pub format: SourceFormat,
    pub clusters: Vec<String>,
    pub facts: CanonicalFacts,
    pub sizing: SizingResult,
}

pub fn analyze(workbook: &Workbook, params: &SizingParameters) -> Result<Analysis, AppError> {
    let format = adapter::detect_format(workbook)?;
    tracing::info!("Detected {} export", format.label());

    let facts = adapter::extract_facts(format, workbook, params);
    tracing::info!(
        "Extracted facts: {} VMs, {:.0} vCPU, {:.0} GB vRAM, {} hosts",
        facts.vm_count,
        facts.total_vcpu,
        facts.total_vram_gb,
        facts.host_count
    );

    let sizing = solver::size(&facts, params);
    tracing::info!(
        "Sized cluster: {} hosts now, {} with growth, {} bound",
        sizing.hosts_now,
        sizing.hosts_future,
        sizing.binding_constraint.label()
    );

    Ok(Analysis {
        format,
        clusters: adapter::cluster_names(format, workbook),
        facts,
        sizing,
    })
}
