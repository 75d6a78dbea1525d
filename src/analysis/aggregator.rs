//! Multi-task aggregation.
//!
//! Combines the output of several collection tasks into a single
//! consolidated prompt so the model can correlate across sources.

use super::prompt::{truncate_chars, Limits, SystemPrompt, STRICT_OUTPUT_FORMAT};

/// Concatenates task outputs under `=== name ===` delimiters.
///
/// Each output is cut to `limits.per_task_chars` first, then the whole
/// block is cut to `limits.combined_chars`.
pub fn combine_task_outputs<N, D>(outputs: &[(N, D)], limits: &Limits) -> String
where
    N: AsRef<str>,
    D: AsRef<str>,
{
    let mut combined = String::new();

    for (name, data) in outputs {
        combined.push_str(&format!(
            "\n\n=== {} ===\n{}\n",
            name.as_ref(),
            truncate_chars(data.as_ref(), limits.per_task_chars)
        ));
    }

    truncate_chars(&combined, limits.combined_chars).to_string()
}

/// Builds the consolidated prompt for several tasks.
pub fn build_consolidated_prompt<N, D>(
    system: &SystemPrompt,
    outputs: &[(N, D)],
    limits: &Limits,
    strict: bool,
) -> String
where
    N: AsRef<str>,
    D: AsRef<str>,
{
    let names: Vec<&str> = outputs.iter().map(|(name, _)| name.as_ref()).collect();
    let combined = combine_task_outputs(outputs, limits);

    let mut prompt = String::new();

    prompt.push_str(system.as_str());
    prompt.push_str("\n\n---\n\nANÁLISIS FORENSE MÚLTIPLE\n\n");
    prompt.push_str("Se han ejecutado las siguientes tareas forenses:\n");
    prompt.push_str(&names.join(", "));
    prompt.push_str("\n\nDATOS COMBINADOS:\n");
    prompt.push_str(&combined);
    prompt.push_str("\n\n---\n\n");
    prompt.push_str(CONSOLIDATED_INSTRUCTIONS);

    if strict {
        prompt.push('\n');
        prompt.push_str(STRICT_OUTPUT_FORMAT);
    } else {
        prompt.push_str(
            "\nFORMATO DE SALIDA: Igual que el análisis individual (resumen corto + JSON estructurado)\n",
        );
    }

    prompt
}

const CONSOLIDATED_INSTRUCTIONS: &str = "INSTRUCCIONES:
1. Analiza todos los datos forenses de forma consolidada
2. Busca correlaciones entre diferentes fuentes de datos
3. Identifica patrones sospechosos que emergen al combinar información
4. Prioriza hallazgos por nivel de riesgo
5. Proporciona un análisis integral del estado del sistema
";
