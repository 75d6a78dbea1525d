//! Collection routine catalogue and parameter encoding.

use std::fmt;
use std::str::FromStr;

/// Default number of event log entries inspected by `Get-SuspiciousEvents`.
pub const DEFAULT_MAX_EVENTS: i64 = 2000;

/// Default abuse-confidence threshold for `Get-SuspiciousInternetProcesses`.
pub const DEFAULT_THRESHOLD: i64 = 10;

/// The fixed set of routines exported by the forensic PowerShell module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForensicTask {
    /// Suspicious entries in the Windows event logs.
    SuspiciousEvents,
    /// Processes holding network connections.
    InternetProcesses,
    /// Running processes without a valid digital signature.
    UnsignedProcesses,
    /// Remote addresses checked against AbuseIPDB.
    SuspiciousInternetProcesses,
    /// Every routine above, in one pass.
    FullForensicAnalysis,
}

impl ForensicTask {
    pub const ALL: [ForensicTask; 5] = [
        ForensicTask::SuspiciousEvents,
        ForensicTask::InternetProcesses,
        ForensicTask::UnsignedProcesses,
        ForensicTask::SuspiciousInternetProcesses,
        ForensicTask::FullForensicAnalysis,
    ];

    /// Tasks combined by the full AI pipeline.
    pub const PIPELINE: [ForensicTask; 4] = [
        ForensicTask::SuspiciousEvents,
        ForensicTask::InternetProcesses,
        ForensicTask::UnsignedProcesses,
        ForensicTask::SuspiciousInternetProcesses,
    ];

    /// Name of the PowerShell cmdlet implementing the task.
    pub fn cmdlet(&self) -> &'static str {
        match self {
            ForensicTask::SuspiciousEvents => "Get-SuspiciousEvents",
            ForensicTask::InternetProcesses => "Get-InternetProcesses",
            ForensicTask::UnsignedProcesses => "Get-UnsignedProcesses",
            ForensicTask::SuspiciousInternetProcesses => "Get-SuspiciousInternetProcesses",
            ForensicTask::FullForensicAnalysis => "Get-FullForensicAnalysis",
        }
    }

    /// Short name accepted on the command line.
    pub fn alias(&self) -> &'static str {
        match self {
            ForensicTask::SuspiciousEvents => "events",
            ForensicTask::InternetProcesses => "internet",
            ForensicTask::UnsignedProcesses => "unsigned",
            ForensicTask::SuspiciousInternetProcesses => "suspicious-ips",
            ForensicTask::FullForensicAnalysis => "full",
        }
    }

    /// Human readable description shown in the menu.
    pub fn description(&self) -> &'static str {
        match self {
            ForensicTask::SuspiciousEvents => "Extraer eventos sospechosos",
            ForensicTask::InternetProcesses => "Procesos con conexiones de red",
            ForensicTask::UnsignedProcesses => "Procesos sin firma digital",
            ForensicTask::SuspiciousInternetProcesses => "IPs sospechosas (AbuseIPDB)",
            ForensicTask::FullForensicAnalysis => "Análisis forense completo",
        }
    }

    /// Whether the routine understands the named parameter.
    pub fn accepts(&self, parameter: &str) -> bool {
        let allowed: &[&str] = match self {
            ForensicTask::SuspiciousEvents => &["MaxEvents", "OutputPath", "DontSaveReport"],
            ForensicTask::InternetProcesses => &["DontSaveReport"],
            ForensicTask::UnsignedProcesses => &[],
            ForensicTask::SuspiciousInternetProcesses => &["Threshold", "DontSaveReport"],
            ForensicTask::FullForensicAnalysis => &["OutputPath", "DontSaveReport"],
        };
        allowed.iter().any(|name| name.eq_ignore_ascii_case(parameter))
    }

    /// Parameters for a run with the given numeric settings.
    ///
    /// Settings the task does not accept are left out.
    pub fn parameters(&self, max_events: i64, threshold: i64, dont_save_report: bool) -> TaskParameters {
        let mut params = TaskParameters::new();
        if self.accepts("MaxEvents") {
            params.set("MaxEvents", ParamValue::Number(max_events));
        }
        if self.accepts("Threshold") {
            params.set("Threshold", ParamValue::Number(threshold.clamp(0, 100)));
        }
        if self.accepts("DontSaveReport") {
            params.set("DontSaveReport", ParamValue::Switch(dont_save_report));
        }
        params
    }
}

impl fmt::Display for ForensicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cmdlet())
    }
}

impl FromStr for ForensicTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ForensicTask::ALL
            .into_iter()
            .find(|task| {
                task.cmdlet().eq_ignore_ascii_case(needle) || task.alias().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| {
                let known: Vec<_> = ForensicTask::ALL.iter().map(|t| t.alias()).collect();
                format!("Unknown task '{}'. Expected one of: {}", needle, known.join(", "))
            })
    }
}

/// A single parameter value passed to a cmdlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Number(i64),
    /// A switch parameter; `false` leaves it out of the invocation.
    Switch(bool),
    Text(String),
}

/// Named parameters in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskParameters {
    entries: Vec<(String, ParamValue)>,
}

impl TaskParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any earlier value with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Encodes the parameters as PowerShell arguments.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(name, value)| match value {
                ParamValue::Number(n) => Some(format!("-{} {}", name, n)),
                ParamValue::Switch(true) => Some(format!("-{}", name)),
                ParamValue::Switch(false) => None,
                ParamValue::Text(text) => Some(format!("-{} {}", name, quote_single(text))),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Characters PowerShell accepts as single-quote delimiters.
const SINGLE_QUOTES: [char; 5] = ['\'', '\u{2018}', '\u{2019}', '\u{201A}', '\u{201B}'];

/// Characters PowerShell accepts as double-quote delimiters.
const DOUBLE_QUOTES: [char; 4] = ['"', '\u{201C}', '\u{201D}', '\u{201E}'];

/// Quotes a value as a PowerShell verbatim string.
///
/// Every quote character is doubled, including the typographic ones.
pub fn quote_single(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if SINGLE_QUOTES.contains(&c) {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Escapes a value for embedding inside a double-quoted PowerShell string.
pub fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '`' || c == '$' || DOUBLE_QUOTES.contains(&c) {
            escaped.push('`');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_from_str() {
        assert_eq!(
            "get-suspiciousevents".parse::<ForensicTask>(),
            Ok(ForensicTask::SuspiciousEvents)
        );
        assert_eq!("unsigned".parse::<ForensicTask>(), Ok(ForensicTask::UnsignedProcesses));
        assert!("format-disk".parse::<ForensicTask>().is_err());
    }

    #[test]
    fn test_encode_parameters() {
        let mut params = TaskParameters::new();
        params
            .set("MaxEvents", ParamValue::Number(500))
            .set("OutputPath", ParamValue::Text("C:\\out\\o'brien.csv".to_string()))
            .set("DontSaveReport", ParamValue::Switch(true));

        assert_eq!(
            params.encode(),
            "-MaxEvents 500 -OutputPath 'C:\\out\\o''brien.csv' -DontSaveReport"
        );
    }

    #[test]
    fn test_switch_false_is_omitted() {
        let mut params = TaskParameters::new();
        params.set("DontSaveReport", ParamValue::Switch(false));
        assert_eq!(params.encode(), "");
    }

    #[test]
    fn test_set_replaces_existing_value() {
        let mut params = TaskParameters::new();
        params.set("Threshold", ParamValue::Number(10));
        params.set("Threshold", ParamValue::Number(50));
        assert_eq!(params.encode(), "-Threshold 50");
    }

    #[test]
    fn test_task_parameters_only_include_accepted() {
        let params = ForensicTask::UnsignedProcesses.parameters(2000, 10, true);
        assert_eq!(params, TaskParameters::new());

        let params = ForensicTask::SuspiciousInternetProcesses.parameters(2000, 250, true);
        assert_eq!(params.encode(), "-Threshold 100 -DontSaveReport");
    }

    #[test]
    fn test_escape_double_quoted() {
        assert_eq!(
            escape_double_quoted(r#"C:\Tools\"x"\$mod`.psm1"#),
            r#"C:\Tools\`"x`"\`$mod``.psm1"#
        );
    }

    #[test]
    fn test_typographic_quotes_are_escaped() {
        assert_eq!(
            quote_single("C:\\casos\\informe ‘final’ ‚a‛.csv"),
            "'C:\\casos\\informe ‘‘final’’ ‚‚a‛‛.csv'"
        );
        assert_eq!(
            escape_double_quoted("C:\\Tools\\“mod” „x.psm1"),
            "C:\\Tools\\`“mod`” `„x.psm1"
        );
    }
}
