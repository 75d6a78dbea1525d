//! Prompt construction for single-task analysis.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Used when the sidecar prompt file is missing.
pub const FALLBACK_SYSTEM_PROMPT: &str = "Eres un asistente forense orientado a sistemas Windows. \
Analiza los datos proporcionados y genera un resumen claro de hallazgos sospechosos.";

/// Character caps applied to collected data before it reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Cap for the data of a single-task analysis.
    #[serde(default = "default_single_task_chars")]
    pub single_task_chars: usize,
    /// Cap for each task inside a consolidated analysis.
    #[serde(default = "default_per_task_chars")]
    pub per_task_chars: usize,
    /// Cap for the whole combined block of a consolidated analysis.
    #[serde(default = "default_combined_chars")]
    pub combined_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            single_task_chars: default_single_task_chars(),
            per_task_chars: default_per_task_chars(),
            combined_chars: default_combined_chars(),
        }
    }
}

fn default_single_task_chars() -> usize {
    10_000
}

fn default_per_task_chars() -> usize {
    5_000
}

fn default_combined_chars() -> usize {
    15_000
}

/// Returns the first `cap` characters of `text`.
pub fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The instruction template placed at the top of every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt(String);

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Loads the template from disk, falling back to the built-in text.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!("Loaded system prompt from {}", path.display());
                Self::new(text)
            }
            Err(e) => {
                warn!(
                    "Cannot read system prompt {} ({}), using built-in prompt",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self(FALLBACK_SYSTEM_PROMPT.to_string())
    }
}

/// Output contract appended to single-task prompts.
pub const OUTPUT_FORMAT: &str = r#"INSTRUCCIONES:
1. Analiza los datos forenses proporcionados
2. Identifica hallazgos sospechosos o relevantes
3. Evalúa el nivel de riesgo de cada hallazgo
4. Proporciona recomendaciones específicas

FORMATO DE SALIDA REQUERIDO:

Primero, proporciona un resumen corto (3-5 líneas) en español.

Luego, proporciona un análisis estructurado en JSON con el siguiente formato:
{
    "summary": "Resumen general del análisis",
    "findings": [
        {
            "id": "F1",
            "title": "Título del hallazgo",
            "description": "Descripción detallada",
            "confidence": "high/medium/low",
            "risk_level": "high/medium/low",
            "evidence": "Evidencia específica de los datos"
        }
    ],
    "recommendations": [
        "Recomendación 1",
        "Recomendación 2"
    ],
    "statistics": {
        "total_items_analyzed": 0,
        "suspicious_items": 0,
        "clean_items": 0
    }
}
"#;

/// Replaces the prose-then-JSON contract when the backend returns JSON only.
pub const STRICT_OUTPUT_FORMAT: &str = r#"FORMATO DE SALIDA REQUERIDO:

Responde únicamente con un objeto JSON válido, sin texto adicional, con las claves
"summary", "findings" (id, title, description, confidence, risk_level, evidence),
"recommendations" y "statistics" (total_items_analyzed, suspicious_items, clean_items).
"summary" debe contener un resumen de 3-5 líneas en español.
"#;

/// Builds the prompt for a single collection task.
///
/// `data` is cut to `cap` characters before it is embedded.
pub fn build_single_prompt(
    system: &SystemPrompt,
    task_name: &str,
    data: &str,
    additional_context: Option<&str>,
    cap: usize,
    strict: bool,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(system.as_str());
    prompt.push_str("\n\n---\n\n");
    prompt.push_str(&format!("TAREA EJECUTADA: {}\n\n", task_name));
    prompt.push_str("DATOS RECOPILADOS:\n");
    prompt.push_str(truncate_chars(data, cap));
    prompt.push_str("\n\n");

    if let Some(context) = additional_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("CONTEXTO ADICIONAL: {}\n\n", context));
    }

    prompt.push_str("---\n\n");
    if strict {
        prompt.push_str(STRICT_OUTPUT_FORMAT);
    } else {
        prompt.push_str(OUTPUT_FORMAT);
    }

    prompt
}
