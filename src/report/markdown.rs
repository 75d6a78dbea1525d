//! Markdown report generation.
//!
//! Renders a [`ReportDocument`] as Markdown, one `generate_*_section`
//! function per section kind.

use super::document::{FindingBlock, ReportDocument, Section, TaskDigest};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(document: &ReportDocument) -> String {
    let mut output = String::new();

    for section in &document.sections {
        output.push_str(&generate_section(section));
    }

    output
}

fn generate_section(section: &Section) -> String {
    let heading = section.heading().unwrap_or_default();

    match section {
        Section::Header {
            title,
            task_label,
            generated_at,
            tool,
            target_os,
        } => generate_header_section(title, task_label, generated_at, tool, target_os),
        Section::Summary { text } | Section::GeneralAnalysis { text } => {
            format!("## {}\n\n{}\n\n", heading, text.trim())
        }
        Section::Findings { items } => generate_findings_section(heading, items),
        Section::Recommendations { items } => generate_recommendations_section(heading, items),
        Section::Statistics { rows } => generate_statistics_section(heading, rows),
        Section::PageBreak => "---\n\n".to_string(),
        Section::TaskBreakdown { title, tasks } => generate_breakdown_section(title, tasks),
        Section::LegalFooter { paragraphs } => generate_footer(heading, paragraphs),
    }
}

/// Generate the title and the metadata table.
fn generate_header_section(
    title: &str,
    task_label: &str,
    generated_at: &str,
    tool: &str,
    target_os: &str,
) -> String {
    let mut section = String::new();

    section.push_str(&format!("# {}\n\n", title));
    section.push_str("| | |\n");
    section.push_str("|:---|:---|\n");
    section.push_str(&format!("| **Tarea** | {} |\n", escape_cell(task_label)));
    section.push_str(&format!("| **Fecha** | {} |\n", generated_at));
    section.push_str(&format!("| **Herramienta** | {} |\n", tool));
    section.push_str(&format!("| **Sistema** | {} |\n", target_os));
    section.push('\n');

    section
}

fn generate_findings_section(heading: &str, items: &[FindingBlock]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", heading));
    for finding in items {
        section.push_str(&generate_finding_block(finding));
    }

    section
}

/// Generate a single finding block with its risk badge.
fn generate_finding_block(finding: &FindingBlock) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} {}\n\n",
        finding.marker.emoji(),
        finding.title
    ));
    block.push_str(&format!("- **Nivel de Riesgo:** {}\n", finding.risk_level));
    block.push_str(&format!("- **Confianza:** {}\n", finding.confidence));

    if let Some(ref description) = finding.description {
        block.push_str(&format!("- **Descripción:** {}\n", description));
    }

    if let Some(ref evidence) = finding.evidence {
        block.push_str(&format!("- **Evidencia:** `{}`\n", evidence.replace('`', "'")));
    }

    block.push('\n');

    block
}

fn generate_recommendations_section(heading: &str, items: &[String]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", heading));
    for (i, rec) in items.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push('\n');

    section
}

fn generate_statistics_section(heading: &str, rows: &[(String, String)]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", heading));
    section.push_str("| Métrica | Valor |\n");
    section.push_str("|:---|:---:|\n");
    for (metric, value) in rows {
        section.push_str(&format!("| {} | {} |\n", escape_cell(metric), escape_cell(value)));
    }
    section.push('\n');

    section
}

fn generate_breakdown_section(title: &str, tasks: &[TaskDigest]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    for task in tasks {
        section.push_str(&format!("### Tarea: {}\n\n", task.task_name));
        if !task.summary.trim().is_empty() {
            section.push_str(task.summary.trim());
            section.push_str("\n\n");
        }
        if task.finding_count > 0 {
            section.push_str(&format!("*Hallazgos encontrados: {}*\n\n", task.finding_count));
        }
        if let Some(ref error) = task.error {
            section.push_str(&format!("> ⚠️ Análisis no disponible: {}\n\n", error));
        }
    }

    section
}

/// Generate the legal footer.
fn generate_footer(heading: &str, paragraphs: &[String]) -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!("## {}\n\n", heading));
    for paragraph in paragraphs {
        footer.push_str(&format!("*{}*\n\n", paragraph));
    }

    footer
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
