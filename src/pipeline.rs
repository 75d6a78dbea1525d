//! Collection and analysis orchestration.
//!
//! These functions tie a [`CommandRunner`] to an optional
//! [`ForensicAnalyzer`]. Both the interactive menu and the
//! non-interactive flags go through here.

use crate::analysis::ForensicAnalyzer;
use crate::collector::{CommandRunner, ForensicTask, TaskParameters};
use crate::models::{AnalysisResult, TaskResult};
use tracing::{debug, info, warn};

/// What the running process is able to do.
///
/// Built once at startup. When no analyzer could be created the reason is
/// kept so the menu can explain why AI options are disabled.
pub struct Capabilities {
    pub analyzer: Option<ForensicAnalyzer>,
    pub ai_unavailable_reason: Option<String>,
}

impl Capabilities {
    pub fn with_analyzer(analyzer: ForensicAnalyzer) -> Self {
        Self {
            analyzer: Some(analyzer),
            ai_unavailable_reason: None,
        }
    }

    pub fn collection_only(reason: impl Into<String>) -> Self {
        Self {
            analyzer: None,
            ai_unavailable_reason: Some(reason.into()),
        }
    }

    /// Returns the analyzer, or the reason it is unavailable.
    pub fn analyzer(&self) -> Result<&ForensicAnalyzer, &str> {
        self.analyzer.as_ref().ok_or_else(|| {
            self.ai_unavailable_reason
                .as_deref()
                .unwrap_or("Análisis con IA no disponible")
        })
    }
}

/// Result of a collection followed by an analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The routine failed; no analysis was requested.
    CollectionFailed(TaskResult),
    Analyzed {
        task: TaskResult,
        analysis: AnalysisResult,
    },
}

/// Everything produced by one full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Collection result of every task, in execution order.
    pub collections: Vec<(ForensicTask, TaskResult)>,
    /// Individual analysis of each successful task.
    pub per_task: Vec<(String, AnalysisResult)>,
    /// `None` when no task produced data.
    pub consolidated: Option<AnalysisResult>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> usize {
        self.collections.iter().filter(|(_, r)| r.success).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (ForensicTask, &TaskResult)> {
        self.collections
            .iter()
            .filter(|(_, r)| !r.success)
            .map(|(task, r)| (*task, r))
    }
}

/// Runs a collection routine.
pub async fn collect(
    runner: &dyn CommandRunner,
    task: ForensicTask,
    parameters: &TaskParameters,
) -> TaskResult {
    info!("Running {}", task);
    debug!("Parameters: {}", parameters.encode());

    let result = runner.run(task, parameters).await;

    if result.success {
        info!("{} finished ({} bytes of output)", task, result.output.len());
    } else {
        warn!(
            "{} failed with exit code {}: {}",
            task,
            result.exit_code,
            result.diagnostic()
        );
    }

    result
}

/// Runs a routine and, if it succeeded, analyzes its output.
pub async fn collect_and_analyze(
    runner: &dyn CommandRunner,
    analyzer: &ForensicAnalyzer,
    task: ForensicTask,
    parameters: &TaskParameters,
) -> TaskOutcome {
    let result = collect(runner, task, parameters).await;

    if !result.success {
        return TaskOutcome::CollectionFailed(result);
    }

    let analysis = analyzer.analyze(task.cmdlet(), &result.output, None).await;
    TaskOutcome::Analyzed {
        task: result,
        analysis,
    }
}

/// Runs every task, analyzes each success, then analyzes them together.
///
/// Tasks run with `DontSaveReport` so the routines do not write their own
/// report files.
pub async fn full_pipeline(
    runner: &dyn CommandRunner,
    analyzer: &ForensicAnalyzer,
    tasks: &[ForensicTask],
    max_events: i64,
    threshold: i64,
) -> PipelineReport {
    let mut report = PipelineReport::default();

    for &task in tasks {
        let parameters = task.parameters(max_events, threshold, true);
        let result = collect(runner, task, &parameters).await;
        report.collections.push((task, result));
    }

    let outputs: Vec<(&str, &str)> = report
        .collections
        .iter()
        .filter(|(_, r)| r.success)
        .map(|(task, r)| (task.cmdlet(), r.output.as_str()))
        .collect();

    if outputs.is_empty() {
        warn!("No collection task succeeded; skipping AI analysis");
        return report;
    }

    let mut per_task = Vec::with_capacity(outputs.len());
    for (name, data) in &outputs {
        let analysis = analyzer.analyze(name, data, None).await;
        per_task.push((name.to_string(), analysis));
    }

    let consolidated = analyzer.analyze_many(&outputs).await;

    report.per_task = per_task;
    report.consolidated = Some(consolidated);
    report
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Runner returning canned results and recording each invocation.
    #[derive(Clone, Default)]
    pub struct FakeRunner {
        results: HashMap<ForensicTask, TaskResult>,
        pub invocations: Arc<Mutex<Vec<(ForensicTask, String)>>>,
    }

    impl FakeRunner {
        pub fn succeeding(mut self, task: ForensicTask, output: &str) -> Self {
            self.results.insert(
                task,
                TaskResult {
                    success: true,
                    output: output.to_string(),
                    error: String::new(),
                    exit_code: 0,
                },
            );
            self
        }

        pub fn failing(mut self, task: ForensicTask, exit_code: i32, error: &str) -> Self {
            self.results.insert(
                task,
                TaskResult {
                    success: false,
                    output: String::new(),
                    error: error.to_string(),
                    exit_code,
                },
            );
            self
        }

        pub fn invocations(&self) -> Vec<(ForensicTask, String)> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, task: ForensicTask, parameters: &TaskParameters) -> TaskResult {
            self.invocations
                .lock()
                .unwrap()
                .push((task, parameters.encode()));
            self.results
                .get(&task)
                .cloned()
                .unwrap_or_else(|| TaskResult::spawn_failure("not scripted"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::FakeRunner;
    use super::*;
    use crate::analysis::{Limits, SystemPrompt};
    use crate::llm::mock::ScriptedGenerator;

    const REPLY: &str = "Sistema limpio.\n\n{\"summary\":\"ok\",\"findings\":[],\"recommendations\":[]}";

    fn analyzer(generator: &ScriptedGenerator) -> ForensicAnalyzer {
        ForensicAnalyzer::new(
            Box::new(generator.clone()),
            SystemPrompt::new("SYS"),
            Limits::default(),
        )
    }

    #[tokio::test]
    async fn test_failed_collection_never_reaches_analyzer() {
        let runner = FakeRunner::default().failing(
            ForensicTask::UnsignedProcesses,
            1,
            "Access denied",
        );
        let generator = ScriptedGenerator::replying(REPLY);

        let outcome = collect_and_analyze(
            &runner,
            &analyzer(&generator),
            ForensicTask::UnsignedProcesses,
            &TaskParameters::new(),
        )
        .await;

        match outcome {
            TaskOutcome::CollectionFailed(result) => {
                assert!(!result.success);
                assert_eq!(result.exit_code, 1);
                assert_eq!(result.diagnostic(), "Access denied");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_collection_is_analyzed() {
        let runner =
            FakeRunner::default().succeeding(ForensicTask::UnsignedProcesses, "evil.exe sin firma");
        let generator = ScriptedGenerator::replying(REPLY);

        let outcome = collect_and_analyze(
            &runner,
            &analyzer(&generator),
            ForensicTask::UnsignedProcesses,
            &TaskParameters::new(),
        )
        .await;

        let TaskOutcome::Analyzed { task, analysis } = outcome else {
            panic!("expected an analysis");
        };
        assert_eq!(task.output, "evil.exe sin firma");
        assert!(analysis.success);
        assert_eq!(analysis.summary_short, "Sistema limpio.");
        assert_eq!(generator.calls(), 1);
        assert!(generator.prompt(0).contains("evil.exe sin firma"));
        assert!(generator.prompt(0).contains("Get-UnsignedProcesses"));
    }

    #[tokio::test]
    async fn test_full_pipeline_analyzes_successes_only() {
        let runner = FakeRunner::default()
            .succeeding(ForensicTask::SuspiciousEvents, "4625 x42")
            .failing(ForensicTask::InternetProcesses, 1, "boom")
            .succeeding(ForensicTask::UnsignedProcesses, "evil.exe")
            .succeeding(ForensicTask::SuspiciousInternetProcesses, "203.0.113.5");
        let generator = ScriptedGenerator::replying(REPLY);

        let report =
            full_pipeline(&runner, &analyzer(&generator), &ForensicTask::PIPELINE, 2000, 10).await;

        assert_eq!(report.collections.len(), 4);
        assert_eq!(report.succeeded(), 3);
        let failed: Vec<_> = report.failures().map(|(task, _)| task).collect();
        assert_eq!(failed, vec![ForensicTask::InternetProcesses]);

        let names: Vec<_> = report.per_task.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Get-SuspiciousEvents",
                "Get-UnsignedProcesses",
                "Get-SuspiciousInternetProcesses"
            ]
        );
        assert!(report.consolidated.as_ref().unwrap().success);

        // Three individual analyses plus one consolidated call.
        assert_eq!(generator.calls(), 4);
        let consolidated_prompt = generator.prompt(3);
        assert!(consolidated_prompt.contains("=== Get-SuspiciousEvents ===\n4625 x42"));
        assert!(!consolidated_prompt.contains("=== Get-InternetProcesses ==="));
    }

    #[tokio::test]
    async fn test_full_pipeline_passes_dont_save_report() {
        let runner = FakeRunner::default()
            .succeeding(ForensicTask::SuspiciousEvents, "a")
            .succeeding(ForensicTask::SuspiciousInternetProcesses, "b");
        let generator = ScriptedGenerator::replying(REPLY);

        full_pipeline(
            &runner,
            &analyzer(&generator),
            &[
                ForensicTask::SuspiciousEvents,
                ForensicTask::SuspiciousInternetProcesses,
            ],
            500,
            250,
        )
        .await;

        let invocations = runner.invocations();
        assert_eq!(
            invocations[0],
            (
                ForensicTask::SuspiciousEvents,
                "-MaxEvents 500 -DontSaveReport".to_string()
            )
        );
        assert_eq!(
            invocations[1],
            (
                ForensicTask::SuspiciousInternetProcesses,
                "-Threshold 100 -DontSaveReport".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_full_pipeline_without_data_makes_no_model_call() {
        let runner = FakeRunner::default();
        let generator = ScriptedGenerator::replying(REPLY);

        let report =
            full_pipeline(&runner, &analyzer(&generator), &ForensicTask::PIPELINE, 2000, 10).await;

        assert_eq!(report.succeeded(), 0);
        assert!(report.per_task.is_empty());
        assert!(report.consolidated.is_none());
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_capabilities_reason() {
        let caps = Capabilities::collection_only("GOOGLE_API_KEY no configurada");

        assert!(caps.analyzer.is_none());
        assert_eq!(caps.analyzer().err(), Some("GOOGLE_API_KEY no configurada"));
    }
}
