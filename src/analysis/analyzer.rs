//! Analysis requests against the text-generation backend.
//!
//! [`ForensicAnalyzer`] turns collected task output into an
//! [`AnalysisResult`]. Every failure is folded into the result; nothing
//! is propagated to the caller.

use super::aggregator::build_consolidated_prompt;
use super::extractor::{
    extract, extract_strict, ExtractError, Extraction, FALLBACK_SUMMARY, FALLBACK_SUMMARY_MULTI,
};
use super::prompt::{build_single_prompt, Limits, SystemPrompt};
use crate::llm::{LlmError, TextGenerator};
use crate::models::AnalysisResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum AnalysisError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Sends forensic data to a model and extracts its findings.
pub struct ForensicAnalyzer {
    generator: Box<dyn TextGenerator>,
    system_prompt: SystemPrompt,
    limits: Limits,
    /// Require a pure JSON reply instead of prose followed by JSON.
    strict_json: bool,
    show_progress: bool,
}

impl ForensicAnalyzer {
    pub fn new(generator: Box<dyn TextGenerator>, system_prompt: SystemPrompt, limits: Limits) -> Self {
        Self {
            generator,
            system_prompt,
            limits,
            strict_json: false,
            show_progress: false,
        }
    }

    pub fn with_strict_json(mut self, strict_json: bool) -> Self {
        self.strict_json = strict_json;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Analyzes the output of a single task.
    pub async fn analyze(
        &self,
        task_name: &str,
        data: &str,
        additional_context: Option<&str>,
    ) -> AnalysisResult {
        info!("Requesting AI analysis of {}", task_name);

        let prompt = build_single_prompt(
            &self.system_prompt,
            task_name,
            data,
            additional_context,
            self.limits.single_task_chars,
            self.strict_json,
        );

        let spinner = self.spinner("Enviando datos al modelo (10-30 segundos)...");
        let result = self.request(&prompt, FALLBACK_SUMMARY).await;
        spinner.finish_and_clear();

        self.finish(result)
    }

    /// Analyzes several task outputs together in one consolidated call.
    pub async fn analyze_many<N, D>(&self, outputs: &[(N, D)]) -> AnalysisResult
    where
        N: AsRef<str>,
        D: AsRef<str>,
    {
        info!("Requesting consolidated AI analysis of {} tasks", outputs.len());

        let prompt =
            build_consolidated_prompt(&self.system_prompt, outputs, &self.limits, self.strict_json);

        let spinner = self.spinner("Enviando datos consolidados al modelo (30-60 segundos)...");
        let result = self.request(&prompt, FALLBACK_SUMMARY_MULTI).await;
        spinner.finish_and_clear();

        self.finish(result)
    }

    async fn request(
        &self,
        prompt: &str,
        fallback_summary: &str,
    ) -> Result<(String, Extraction), AnalysisError> {
        let full_text = self.generator.generate(prompt).await?;

        let extraction = if self.strict_json {
            extract_strict(&full_text, fallback_summary)?
        } else {
            extract(&full_text, fallback_summary)
        };

        Ok((full_text, extraction))
    }

    fn finish(&self, result: Result<(String, Extraction), AnalysisError>) -> AnalysisResult {
        match result {
            Ok((full_text, extraction)) => {
                info!(
                    "AI analysis returned {} findings",
                    extraction.structured.findings.len()
                );
                AnalysisResult {
                    success: true,
                    summary_short: extraction.summary_short,
                    structured: extraction.structured,
                    full_text,
                    error: None,
                }
            }
            Err(e) => {
                warn!("AI analysis failed: {}", e);
                AnalysisResult::failure(format!("Error al analizar con IA: {}", e))
            }
        }
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} [{elapsed}] {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedGenerator;
    use crate::models::StructuredAnalysis;

    fn analyzer(generator: &ScriptedGenerator) -> ForensicAnalyzer {
        ForensicAnalyzer::new(
            Box::new(generator.clone()),
            SystemPrompt::new("SYS"),
            Limits::default(),
        )
    }

    #[tokio::test]
    async fn test_analyze_extracts_reply() {
        let generator = ScriptedGenerator::replying(
            "Sistema limpio.\n\n{\"summary\":\"ok\",\"findings\":[],\"recommendations\":[]}",
        );

        let result = analyzer(&generator)
            .analyze("Get-UnsignedProcesses", "svchost.exe firmado", None)
            .await;

        assert!(result.success);
        assert_eq!(result.summary_short, "Sistema limpio.");
        assert_eq!(result.structured.summary.as_deref(), Some("ok"));
        assert!(result.error.is_none());
        assert!(result.full_text.starts_with("Sistema limpio."));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_truncates_data() {
        let generator = ScriptedGenerator::replying("sin datos");
        let data = "q".repeat(12_000);

        analyzer(&generator).analyze("t", &data, None).await;

        let prompt = generator.prompt(0);
        assert!(prompt.contains(&"q".repeat(10_000)));
        assert!(!prompt.contains(&"q".repeat(10_001)));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_still_success() {
        let generator = ScriptedGenerator::replying("no braces here");

        let result = analyzer(&generator).analyze("t", "d", None).await;

        assert!(result.success);
        assert_eq!(
            result.structured,
            StructuredAnalysis::fallback(FALLBACK_SUMMARY)
        );
        assert_eq!(result.summary_short, "no braces here...");
    }

    #[tokio::test]
    async fn test_backend_failure_is_folded_into_result() {
        let generator = ScriptedGenerator::failing();

        let result = analyzer(&generator).analyze("t", "d", None).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.starts_with("Error al analizar con IA:"));
        assert!(error.contains("http://mock"));
    }

    #[tokio::test]
    async fn test_analyze_many_uses_multi_fallback() {
        let generator = ScriptedGenerator::replying("Nada concluyente");
        let outputs = vec![
            ("Get-SuspiciousEvents".to_string(), "a".repeat(6_000)),
            ("Get-InternetProcesses".to_string(), "b".repeat(6_000)),
            ("Get-UnsignedProcesses".to_string(), "c".repeat(6_000)),
        ];

        let result = analyzer(&generator).analyze_many(&outputs).await;

        assert!(result.success);
        assert_eq!(
            result.structured.summary.as_deref(),
            Some(FALLBACK_SUMMARY_MULTI)
        );

        let prompt = generator.prompt(0);
        assert!(prompt.contains(&"a".repeat(5_000)));
        assert!(!prompt.contains(&"a".repeat(5_001)));
        assert!(prompt.contains("ANÁLISIS FORENSE MÚLTIPLE"));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_prose() {
        let generator = ScriptedGenerator::replying("Sistema limpio.");
        let analyzer = analyzer(&generator).with_strict_json(true);

        let result = analyzer.analyze("t", "d", None).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("no JSON object"));
    }

    #[tokio::test]
    async fn test_strict_mode_accepts_object() {
        let generator = ScriptedGenerator::replying(
            "{\"summary\":\"Riesgo bajo\",\"findings\":[{\"id\":\"F1\",\"risk_level\":\"low\"}]}",
        );
        let analyzer = analyzer(&generator).with_strict_json(true);

        let result = analyzer.analyze("t", "d", None).await;

        assert!(result.success);
        assert_eq!(result.summary_short, "Riesgo bajo");
        assert_eq!(result.structured.findings.len(), 1);
    }
}
