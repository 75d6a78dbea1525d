//! Interactive menu and the one-shot runs behind it.
//!
//! [`Session`] bundles everything a run needs. The numbered menu and the
//! `--task`/`--full` flags both end up in the same `run_*` methods.

use crate::collector::{CommandRunner, ForensicTask, ParamValue, TaskParameters};
use crate::models::{AnalysisResult, TaskResult};
use crate::pipeline::{self, Capabilities, TaskOutcome};
use crate::report::ReportRenderer;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error};

const SEPARATOR_WIDTH: usize = 60;

/// A parsed menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Options 1-5: run one collection routine.
    Collect(ForensicTask),
    /// Option 6: collect, analyze with AI and write a report.
    AnalyzeTask,
    /// Option 7: the full pipeline with a consolidated report.
    FullPipeline,
    /// Option 0.
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "0" => Some(MenuChoice::Exit),
            "6" => Some(MenuChoice::AnalyzeTask),
            "7" => Some(MenuChoice::FullPipeline),
            other => task_by_number(other).map(MenuChoice::Collect),
        }
    }

    fn requires_ai(&self) -> bool {
        matches!(self, MenuChoice::AnalyzeTask | MenuChoice::FullPipeline)
    }
}

/// Maps `1`-`5` to the routine listed at that position.
fn task_by_number(input: &str) -> Option<ForensicTask> {
    let n: usize = input.trim().parse().ok()?;
    n.checked_sub(1).and_then(|idx| ForensicTask::ALL.get(idx).copied())
}

/// Parses a numeric answer. An empty answer selects the default.
pub fn parse_number(answer: &str, default: i64) -> Option<i64> {
    let answer = answer.trim();
    if answer.is_empty() {
        Some(default)
    } else {
        answer.parse().ok()
    }
}

/// Everything needed to run tasks and write their reports.
pub struct Session<'a> {
    pub runner: &'a dyn CommandRunner,
    pub capabilities: &'a Capabilities,
    pub renderer: &'a ReportRenderer,
    pub max_events: i64,
    pub threshold: i64,
    /// `OutputPath` for routines that save their own CSV.
    pub routine_output: Option<String>,
}

impl<'a> Session<'a> {
    /// Runs one routine and prints its output. Returns whether it succeeded.
    pub async fn run_collection(&self, task: ForensicTask, parameters: &TaskParameters) -> bool {
        println!("\n[Ejecutando {}...]", task);
        if task == ForensicTask::FullForensicAnalysis {
            println!("Esto puede tardar varios minutos...");
        }

        let result = pipeline::collect(self.runner, task, parameters).await;
        print_collection(&result);
        result.success
    }

    /// Collects, analyzes and writes a single-task report.
    pub async fn run_analysis(&self, task: ForensicTask, parameters: &TaskParameters) -> bool {
        let analyzer = match self.capabilities.analyzer() {
            Ok(analyzer) => analyzer,
            Err(reason) => {
                println!("\n✗ Análisis con IA no disponible: {}", reason);
                return false;
            }
        };

        println!("\n[Ejecutando {} y analizando con IA...]", task);
        let outcome = pipeline::collect_and_analyze(self.runner, analyzer, task, parameters).await;

        let analysis = match outcome {
            TaskOutcome::CollectionFailed(result) => {
                print_collection(&result);
                return false;
            }
            TaskOutcome::Analyzed { analysis, .. } => analysis,
        };

        if !print_analysis(&analysis) {
            return false;
        }

        match self.renderer.render_single(&analysis, task.cmdlet()) {
            Ok(path) => {
                println!("✓ Reporte generado: {}", path.display());
                true
            }
            Err(e) => {
                error!("{}", e);
                println!("✗ Error al generar el reporte: {}", e);
                false
            }
        }
    }

    /// Runs the full pipeline and writes the consolidated report.
    pub async fn run_full_pipeline(&self) -> bool {
        let analyzer = match self.capabilities.analyzer() {
            Ok(analyzer) => analyzer,
            Err(reason) => {
                println!("\n✗ Análisis con IA no disponible: {}", reason);
                return false;
            }
        };

        println!("\n[Ejecutando análisis completo con IA...]");
        println!("Tareas: {}", task_list(&ForensicTask::PIPELINE));

        let report = pipeline::full_pipeline(
            self.runner,
            analyzer,
            &ForensicTask::PIPELINE,
            self.max_events,
            self.threshold,
        )
        .await;

        println!(
            "  ✓ {} de {} tareas completadas",
            report.succeeded(),
            report.collections.len()
        );
        for (task, result) in report.failures() {
            println!("  ✗ {}: {}", task, result.diagnostic());
        }

        let Some(consolidated) = report.consolidated.as_ref() else {
            println!("\n✗ Ninguna tarea produjo datos; no se realizó el análisis.");
            return false;
        };

        print_analysis(consolidated);

        match self
            .renderer
            .render_consolidated(Some(consolidated), &report.per_task)
        {
            Ok(path) => {
                println!("✓ Reporte consolidado generado: {}", path.display());
                consolidated.success
            }
            Err(e) => {
                error!("{}", e);
                println!("✗ Error al generar el reporte: {}", e);
                false
            }
        }
    }

    /// Runs the numbered menu until the user exits or input ends.
    pub async fn run_menu<R>(&self, input: &mut R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            self.print_menu();

            let Some(answer) = ask(input, "Seleccione una opción (0-7): ").await? else {
                println!("\nSaliendo...");
                return Ok(());
            };

            let Some(choice) = MenuChoice::parse(&answer) else {
                println!("\n✗ Opción no válida. Por favor seleccione 0-7.");
                print_separator();
                continue;
            };
            debug!("Menu choice: {:?}", choice);

            if choice.requires_ai() {
                if let Err(reason) = self.capabilities.analyzer() {
                    println!("\n✗ Opción deshabilitada: {}", reason);
                    print_separator();
                    continue;
                }
            }

            match choice {
                MenuChoice::Exit => {
                    println!("\nSaliendo...");
                    return Ok(());
                }
                MenuChoice::Collect(task) => {
                    let Some(parameters) = self.ask_parameters(input, task, false).await? else {
                        return Ok(());
                    };
                    self.run_collection(task, &parameters).await;
                }
                MenuChoice::AnalyzeTask => {
                    let Some(answer) = ask(input, "Tarea a analizar (1-5): ").await? else {
                        return Ok(());
                    };
                    match task_by_number(&answer) {
                        Some(task) => {
                            let Some(parameters) = self.ask_parameters(input, task, true).await?
                            else {
                                return Ok(());
                            };
                            self.run_analysis(task, &parameters).await;
                        }
                        None => println!("\n✗ Tarea no válida. Por favor seleccione 1-5."),
                    }
                }
                MenuChoice::FullPipeline => {
                    self.run_full_pipeline().await;
                }
            }

            print_separator();
        }
    }

    /// Prompts for the numeric settings the task accepts.
    ///
    /// Returns `None` when input ends.
    async fn ask_parameters<R>(
        &self,
        input: &mut R,
        task: ForensicTask,
        dont_save_report: bool,
    ) -> std::io::Result<Option<TaskParameters>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut max_events = self.max_events;
        let mut threshold = self.threshold;

        if task.accepts("MaxEvents") {
            let message = format!("Max eventos (Enter para {}): ", self.max_events);
            let Some(answer) = ask(input, &message).await? else {
                return Ok(None);
            };
            max_events = answer_or_default(&answer, self.max_events, |n| n >= 1);
        }

        if task.accepts("Threshold") {
            let message = format!("Threshold (Enter para {}): ", self.threshold);
            let Some(answer) = ask(input, &message).await? else {
                return Ok(None);
            };
            threshold = answer_or_default(&answer, self.threshold, |n| (0..=100).contains(&n));
        }

        Ok(Some(self.parameters(task, max_events, threshold, dont_save_report)))
    }

    /// Builds the parameters for `task`, adding `OutputPath` when the
    /// routine saves its own report.
    pub fn parameters(
        &self,
        task: ForensicTask,
        max_events: i64,
        threshold: i64,
        dont_save_report: bool,
    ) -> TaskParameters {
        let mut parameters = task.parameters(max_events, threshold, dont_save_report);
        if let Some(ref path) = self.routine_output {
            if !dont_save_report && task.accepts("OutputPath") {
                parameters.set("OutputPath", ParamValue::Text(path.clone()));
            }
        }
        parameters
    }

    fn print_menu(&self) {
        println!("Funciones disponibles:");
        for (idx, task) in ForensicTask::ALL.iter().enumerate() {
            println!("{}. {} - {}", idx + 1, task, task.description());
        }

        match self.capabilities.analyzer() {
            Ok(analyzer) => {
                println!("6. Analizar una tarea con IA y generar reporte ({})", analyzer.model_name());
                println!("7. Análisis completo con IA y reporte consolidado");
            }
            Err(reason) => {
                println!("6. Analizar una tarea con IA [deshabilitado: {}]", reason);
                println!("7. Análisis completo con IA [deshabilitado: {}]", reason);
            }
        }

        println!("0. Salir");
        println!();
    }
}

fn answer_or_default(answer: &str, default: i64, valid: impl Fn(i64) -> bool) -> i64 {
    match parse_number(answer, default) {
        Some(n) if valid(n) => n,
        _ => {
            println!("✗ Valor no válido, se usa {}", default);
            default
        }
    }
}

/// Prints `message` and reads one line. Returns `None` at end of input.
async fn ask<R>(input: &mut R, message: &str) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    print!("{}", message);
    std::io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_collection(result: &TaskResult) {
    if result.success {
        println!("\n✓ Ejecución exitosa");
        println!("{}", result.output);
    } else {
        println!("\n✗ Error en la ejecución (código {}):", result.exit_code);
        println!("{}", result.diagnostic());
    }
}

/// Prints the analysis summary. Returns whether the analysis succeeded.
fn print_analysis(analysis: &AnalysisResult) -> bool {
    if !analysis.success {
        println!(
            "\n✗ {}",
            analysis.error.as_deref().unwrap_or("Error al analizar con IA")
        );
        return false;
    }

    println!("\n✓ Análisis recibido");
    println!("\n{}", analysis.summary_short);
    let findings = analysis.structured.findings.len();
    if findings > 0 {
        println!("\nHallazgos: {}", findings);
        for finding in &analysis.structured.findings {
            println!(
                "  [{}] {}",
                finding.risk_level,
                finding.title.as_deref().unwrap_or("Sin título")
            );
        }
    }
    true
}

fn print_separator() {
    println!("\n{}\n", "-".repeat(SEPARATOR_WIDTH));
}

fn task_list(tasks: &[ForensicTask]) -> String {
    tasks
        .iter()
        .map(ForensicTask::cmdlet)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ForensicAnalyzer, Limits, SystemPrompt};
    use crate::llm::mock::ScriptedGenerator;
    use crate::pipeline::mock::FakeRunner;
    use crate::report::ReportFormat;

    const REPLY: &str = "Sistema limpio.\n\n{\"summary\":\"ok\",\"findings\":[],\"recommendations\":[]}";

    fn capabilities(generator: &ScriptedGenerator) -> Capabilities {
        Capabilities::with_analyzer(ForensicAnalyzer::new(
            Box::new(generator.clone()),
            SystemPrompt::new("SYS"),
            Limits::default(),
        ))
    }

    fn session<'a>(
        runner: &'a FakeRunner,
        capabilities: &'a Capabilities,
        renderer: &'a ReportRenderer,
    ) -> Session<'a> {
        Session {
            runner,
            capabilities,
            renderer,
            max_events: 2000,
            threshold: 10,
            routine_output: None,
        }
    }

    fn report_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_menu_choice_parse() {
        assert_eq!(
            MenuChoice::parse("1"),
            Some(MenuChoice::Collect(ForensicTask::SuspiciousEvents))
        );
        assert_eq!(
            MenuChoice::parse(" 5 "),
            Some(MenuChoice::Collect(ForensicTask::FullForensicAnalysis))
        );
        assert_eq!(MenuChoice::parse("6"), Some(MenuChoice::AnalyzeTask));
        assert_eq!(MenuChoice::parse("7"), Some(MenuChoice::FullPipeline));
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("8"), None);
        assert_eq!(MenuChoice::parse("-1"), None);
        assert_eq!(MenuChoice::parse("uno"), None);
        assert_eq!(MenuChoice::parse(""), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("", 2000), Some(2000));
        assert_eq!(parse_number("  ", 10), Some(10));
        assert_eq!(parse_number("500", 2000), Some(500));
        assert_eq!(parse_number("mucho", 2000), None);
    }

    #[test]
    fn test_routine_output_only_when_saving() {
        let runner = FakeRunner::default();
        let caps = Capabilities::collection_only("sin clave");
        let renderer = ReportRenderer::new("unused", ReportFormat::Pdf);
        let mut session = session(&runner, &caps, &renderer);
        session.routine_output = Some("C:\\casos\\eventos.csv".to_string());

        let saving = session.parameters(ForensicTask::SuspiciousEvents, 100, 10, false);
        assert_eq!(saving.encode(), "-MaxEvents 100 -OutputPath 'C:\\casos\\eventos.csv'");

        let piped = session.parameters(ForensicTask::SuspiciousEvents, 100, 10, true);
        assert_eq!(piped.encode(), "-MaxEvents 100 -DontSaveReport");

        let unsupported = session.parameters(ForensicTask::InternetProcesses, 100, 10, false);
        assert_eq!(unsupported.encode(), "");
    }

    #[tokio::test]
    async fn test_menu_exits_at_end_of_input() {
        let runner = FakeRunner::default();
        let caps = Capabilities::collection_only("sin clave");
        let renderer = ReportRenderer::new("unused", ReportFormat::Pdf);

        let mut input: &[u8] = b"";
        session(&runner, &caps, &renderer)
            .run_menu(&mut input)
            .await
            .unwrap();

        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_menu_continues_after_failure() {
        let runner = FakeRunner::default()
            .failing(ForensicTask::UnsignedProcesses, 1, "denied")
            .succeeding(ForensicTask::InternetProcesses, "ok");
        let caps = Capabilities::collection_only("sin clave");
        let renderer = ReportRenderer::new("unused", ReportFormat::Pdf);

        let mut input: &[u8] = b"9\n3\n2\n0\n";
        session(&runner, &caps, &renderer)
            .run_menu(&mut input)
            .await
            .unwrap();

        let tasks: Vec<_> = runner.invocations().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            tasks,
            vec![ForensicTask::UnsignedProcesses, ForensicTask::InternetProcesses]
        );
    }

    #[tokio::test]
    async fn test_menu_prompts_for_parameters() {
        let runner = FakeRunner::default()
            .succeeding(ForensicTask::SuspiciousEvents, "a")
            .succeeding(ForensicTask::SuspiciousInternetProcesses, "b");
        let caps = Capabilities::collection_only("sin clave");
        let renderer = ReportRenderer::new("unused", ReportFormat::Pdf);

        let mut input: &[u8] = b"1\n\n1\n150\n4\n999\n0\n";
        session(&runner, &caps, &renderer)
            .run_menu(&mut input)
            .await
            .unwrap();

        let encoded: Vec<_> = runner.invocations().into_iter().map(|(_, p)| p).collect();
        assert_eq!(encoded, vec!["-MaxEvents 2000", "-MaxEvents 150", "-Threshold 10"]);
    }

    #[tokio::test]
    async fn test_ai_options_disabled_without_analyzer() {
        let runner = FakeRunner::default().succeeding(ForensicTask::UnsignedProcesses, "x");
        let caps = Capabilities::collection_only("sin clave");
        let renderer = ReportRenderer::new("unused", ReportFormat::Pdf);

        let mut input: &[u8] = b"6\n3\n7\n0\n";
        session(&runner, &caps, &renderer)
            .run_menu(&mut input)
            .await
            .unwrap();

        // "3" after the disabled option is read as a plain menu choice.
        let tasks: Vec<_> = runner.invocations().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tasks, vec![ForensicTask::UnsignedProcesses]);
    }

    #[tokio::test]
    async fn test_menu_analysis_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default().succeeding(ForensicTask::UnsignedProcesses, "evil.exe");
        let generator = ScriptedGenerator::replying(REPLY);
        let caps = capabilities(&generator);
        let renderer = ReportRenderer::new(dir.path(), ReportFormat::Markdown);

        let mut input: &[u8] = b"6\n3\n0\n";
        session(&runner, &caps, &renderer)
            .run_menu(&mut input)
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(report_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_run_analysis_skips_report_on_failed_collection() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default().failing(ForensicTask::UnsignedProcesses, 1, "denied");
        let generator = ScriptedGenerator::replying(REPLY);
        let caps = capabilities(&generator);
        let renderer = ReportRenderer::new(dir.path(), ReportFormat::Markdown);

        let ok = session(&runner, &caps, &renderer)
            .run_analysis(ForensicTask::UnsignedProcesses, &TaskParameters::new())
            .await;

        assert!(!ok);
        assert_eq!(generator.calls(), 0);
        assert_eq!(report_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_run_full_pipeline_writes_consolidated_report() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default()
            .succeeding(ForensicTask::SuspiciousEvents, "a")
            .succeeding(ForensicTask::UnsignedProcesses, "b");
        let generator = ScriptedGenerator::replying(REPLY);
        let caps = capabilities(&generator);
        let renderer = ReportRenderer::new(dir.path(), ReportFormat::Markdown);

        let ok = session(&runner, &caps, &renderer).run_full_pipeline().await;

        assert!(ok);
        let name = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name();
        assert!(name.to_string_lossy().starts_with("reporte_forense_consolidado_"));
    }

    #[tokio::test]
    async fn test_failed_consolidated_analysis_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default().succeeding(ForensicTask::SuspiciousEvents, "a");
        let generator = ScriptedGenerator::failing();
        let caps = capabilities(&generator);
        let renderer = ReportRenderer::new(dir.path(), ReportFormat::Markdown);

        let ok = session(&runner, &caps, &renderer).run_full_pipeline().await;

        assert!(!ok);
        let path = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Análisis consolidado no disponible"));
        assert!(content.contains("http://mock"));
    }

    #[tokio::test]
    async fn test_run_full_pipeline_without_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default();
        let generator = ScriptedGenerator::replying(REPLY);
        let caps = capabilities(&generator);
        let renderer = ReportRenderer::new(dir.path(), ReportFormat::Markdown);

        let ok = session(&runner, &caps, &renderer).run_full_pipeline().await;

        assert!(!ok);
        assert_eq!(generator.calls(), 0);
        assert_eq!(report_count(dir.path()), 0);
    }
}
