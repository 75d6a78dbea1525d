//! Report rendering.
//!
//! Analysis results are first turned into a [`ReportDocument`], then
//! written in the selected [`ReportFormat`].

pub mod document;
pub mod markdown;
pub mod pdf;

pub use document::ReportDocument;

use crate::models::AnalysisResult;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const SINGLE_PREFIX: &str = "reporte_forense";
const CONSOLIDATED_PREFIX: &str = "reporte_forense_consolidado";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Output format for reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// PDF document (default)
    #[default]
    Pdf,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }

    /// Encodes the document in this format.
    pub fn encode(&self, document: &ReportDocument) -> Result<Vec<u8>, RenderError> {
        match self {
            ReportFormat::Pdf => Ok(pdf::render_pdf(document)),
            ReportFormat::Markdown => Ok(markdown::generate_markdown_report(document).into_bytes()),
            ReportFormat::Json => Ok(serde_json::to_vec_pretty(document)?),
        }
    }
}

/// Writes reports into a directory.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl ReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders the report for one analyzed task.
    pub fn render_single(
        &self,
        result: &AnalysisResult,
        task_label: &str,
    ) -> Result<PathBuf, RenderError> {
        let now = Local::now().naive_local();
        let document = ReportDocument::single(result, task_label, now);
        self.write(&document, SINGLE_PREFIX, &now)
    }

    /// Renders a consolidated report with its per-task breakdown.
    pub fn render_consolidated<N: AsRef<str>>(
        &self,
        consolidated: Option<&AnalysisResult>,
        per_task: &[(N, AnalysisResult)],
    ) -> Result<PathBuf, RenderError> {
        let now = Local::now().naive_local();
        let document = ReportDocument::consolidated(consolidated, per_task, now);
        self.write(&document, CONSOLIDATED_PREFIX, &now)
    }

    fn write(
        &self,
        document: &ReportDocument,
        prefix: &str,
        generated_at: &NaiveDateTime,
    ) -> Result<PathBuf, RenderError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self
            .output_dir
            .join(report_file_name(prefix, generated_at, self.format.extension()));

        debug!("Rendering sections: {:?}", document.section_kinds());
        let bytes = self.format.encode(document)?;
        std::fs::write(&path, bytes).map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Report written to {}", path.display());
        Ok(path)
    }
}

/// `<prefix>_<YYYYMMDD_HHMMSS>.<ext>`
pub fn report_file_name(prefix: &str, generated_at: &NaiveDateTime, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        generated_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}
