//! Backend-independent report structure.
//!
//! A [`ReportDocument`] is the ordered list of sections a report shows.
//! The PDF, Markdown and JSON backends only decide how each section looks.

use crate::models::{value_to_text, AnalysisResult, Finding, Level};
use chrono::NaiveDateTime;
use serde::Serialize;

pub const TOOL_NAME: &str = "AutoForense";
pub const TARGET_OS: &str = "Windows";
pub const SINGLE_REPORT_TITLE: &str = "Reporte de Análisis Forense";
pub const CONSOLIDATED_LABEL: &str = "Análisis Forense Consolidado";
pub const BREAKDOWN_TITLE: &str = "Análisis Detallado por Tarea";
pub const CONSOLIDATED_UNAVAILABLE: &str = "Análisis consolidado no disponible";
pub const LEGAL_HEADING: &str = "Declaración Legal";
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Disclaimer placed on the last page of every report.
pub const LEGAL_NOTICE: [&str; 2] = [
    "AutoForense es una herramienta de solo lectura: recopila información del sistema sin \
     modificarlo. Se proporciona \"tal cual\", sin garantías de ningún tipo, y su uso es bajo \
     la exclusiva responsabilidad del usuario. Los autores no responden por daños derivados \
     del uso o mal uso del software. No sustituye asesoría forense ni legal profesional; el \
     usuario debe verificar el cumplimiento de las leyes y regulaciones aplicables.",
    "Este reporte fue generado automáticamente, en parte mediante un modelo de lenguaje, y \
     debe ser revisado por un profesional calificado antes de tomar cualquier acción basada \
     en sus hallazgos.",
];

/// Colour used for a finding title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Red,
    Orange,
    /// Default marker for low or unknown risk.
    Blue,
}

impl Marker {
    pub fn for_risk(level: Level) -> Self {
        match level {
            Level::High => Marker::Red,
            Level::Medium => Marker::Orange,
            Level::Low => Marker::Blue,
        }
    }

    /// RGB components in the 0.0-1.0 range.
    pub fn rgb(&self) -> (f32, f32, f32) {
        match self {
            Marker::Red => (1.0, 0.0, 0.0),
            Marker::Orange => (1.0, 0.647, 0.0),
            Marker::Blue => (0.0, 0.0, 1.0),
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Marker::Red => "🔴",
            Marker::Orange => "🟠",
            Marker::Blue => "🔵",
        }
    }
}

/// A finding prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingBlock {
    /// 1-based position in the model's list.
    pub index: usize,
    pub title: String,
    pub marker: Marker,
    pub risk_level: Level,
    pub confidence: Level,
    pub description: Option<String>,
    pub evidence: Option<String>,
}

impl FindingBlock {
    pub fn new(index: usize, finding: &Finding) -> Self {
        let title = finding
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Sin título");

        Self {
            index,
            title: format!("Hallazgo {}: {}", index, title),
            marker: Marker::for_risk(finding.risk_level),
            risk_level: finding.risk_level,
            confidence: finding.confidence,
            description: finding.description.clone(),
            evidence: finding.evidence.clone(),
        }
    }
}

/// Per-task line in a consolidated report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDigest {
    pub task_name: String,
    pub summary: String,
    pub finding_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    Header {
        title: String,
        task_label: String,
        generated_at: String,
        tool: String,
        target_os: String,
    },
    Summary {
        text: String,
    },
    GeneralAnalysis {
        text: String,
    },
    Findings {
        items: Vec<FindingBlock>,
    },
    Recommendations {
        items: Vec<String>,
    },
    Statistics {
        rows: Vec<(String, String)>,
    },
    PageBreak,
    TaskBreakdown {
        title: String,
        tasks: Vec<TaskDigest>,
    },
    /// Always rendered on a page of its own.
    LegalFooter {
        paragraphs: Vec<String>,
    },
}

impl Section {
    /// Heading shown above the section body, if any.
    pub fn heading(&self) -> Option<&str> {
        match self {
            Section::Header { title, .. } => Some(title.as_str()),
            Section::Summary { .. } => Some("Resumen Ejecutivo"),
            Section::GeneralAnalysis { .. } => Some("Análisis General"),
            Section::Findings { .. } => Some("Hallazgos Detectados"),
            Section::Recommendations { .. } => Some("Recomendaciones"),
            Section::Statistics { .. } => Some("Estadísticas del Análisis"),
            Section::PageBreak => None,
            Section::TaskBreakdown { title, .. } => Some(title.as_str()),
            Section::LegalFooter { .. } => Some(LEGAL_HEADING),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Section::Header { .. } => "header",
            Section::Summary { .. } => "summary",
            Section::GeneralAnalysis { .. } => "general_analysis",
            Section::Findings { .. } => "findings",
            Section::Recommendations { .. } => "recommendations",
            Section::Statistics { .. } => "statistics",
            Section::PageBreak => "page_break",
            Section::TaskBreakdown { .. } => "task_breakdown",
            Section::LegalFooter { .. } => "legal_footer",
        }
    }
}

/// The full, ordered content of one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub sections: Vec<Section>,
}

impl ReportDocument {
    /// Report for one analyzed task.
    pub fn single(result: &AnalysisResult, task_label: &str, generated_at: NaiveDateTime) -> Self {
        let mut sections = vec![header(SINGLE_REPORT_TITLE, task_label, generated_at)];
        push_analysis_sections(&mut sections, result);
        sections.push(legal_footer());

        Self { sections }
    }

    /// Report for a consolidated analysis plus a per-task breakdown.
    pub fn consolidated<N: AsRef<str>>(
        consolidated: Option<&AnalysisResult>,
        per_task: &[(N, AnalysisResult)],
        generated_at: NaiveDateTime,
    ) -> Self {
        let mut sections = vec![header(SINGLE_REPORT_TITLE, CONSOLIDATED_LABEL, generated_at)];

        match consolidated {
            Some(result) if !result.success => sections.push(Section::Summary {
                text: format!(
                    "{}: {}",
                    CONSOLIDATED_UNAVAILABLE,
                    result.error.as_deref().unwrap_or("error desconocido")
                ),
            }),
            Some(result) => push_analysis_sections(&mut sections, result),
            None => {}
        }

        if !per_task.is_empty() {
            sections.push(Section::PageBreak);
            sections.push(Section::TaskBreakdown {
                title: BREAKDOWN_TITLE.to_string(),
                tasks: per_task
                    .iter()
                    .map(|(name, analysis)| TaskDigest {
                        task_name: name.as_ref().to_string(),
                        summary: analysis.summary_short.clone(),
                        finding_count: analysis.structured.findings.len(),
                        error: analysis.error.clone(),
                    })
                    .collect(),
            });
        }

        sections.push(legal_footer());

        Self { sections }
    }

    pub fn section_kinds(&self) -> Vec<&'static str> {
        self.sections.iter().map(Section::kind).collect()
    }
}

fn header(title: &str, task_label: &str, generated_at: NaiveDateTime) -> Section {
    Section::Header {
        title: title.to_string(),
        task_label: task_label.to_string(),
        generated_at: generated_at.format(TIMESTAMP_FORMAT).to_string(),
        tool: format!("{} v{}", TOOL_NAME, env!("CARGO_PKG_VERSION")),
        target_os: TARGET_OS.to_string(),
    }
}

fn push_analysis_sections(sections: &mut Vec<Section>, result: &AnalysisResult) {
    let structured = &result.structured;

    if !result.summary_short.trim().is_empty() {
        sections.push(Section::Summary {
            text: result.summary_short.clone(),
        });
    }

    if let Some(summary) = structured.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        sections.push(Section::GeneralAnalysis {
            text: summary.to_string(),
        });
    }

    if !structured.findings.is_empty() {
        sections.push(Section::Findings {
            items: structured
                .findings
                .iter()
                .enumerate()
                .map(|(idx, finding)| FindingBlock::new(idx + 1, finding))
                .collect(),
        });
    }

    if !structured.recommendations.is_empty() {
        sections.push(Section::Recommendations {
            items: structured.recommendations.clone(),
        });
    }

    if !structured.statistics.is_empty() {
        sections.push(Section::Statistics {
            rows: structured
                .statistics
                .iter()
                .map(|(key, value)| {
                    (
                        humanize_metric(key),
                        value_to_text(value.clone()).unwrap_or_else(|| "-".to_string()),
                    )
                })
                .collect(),
        });
    }
}

fn legal_footer() -> Section {
    Section::LegalFooter {
        paragraphs: LEGAL_NOTICE.iter().map(|p| p.to_string()).collect(),
    }
}

/// Turns `total_items_analyzed` into `Total Items Analyzed`.
pub fn humanize_metric(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
