use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which loop shape produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    Single,
    Partitioned,
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopMode::Single => write!(f, "single"),
            LoopMode::Partitioned => write!(f, "partitioned"),
        }
    }
}

/// Structured log events for the generate-critique-revise loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        mode: LoopMode,
        topic: String,
        max_iterations: usize,
    },
    GenerationStarted {
        attempt: usize,
        part: Option<String>,
    },
    GenerationCompleted {
        attempt: usize,
        part: Option<String>,
        duration_secs: f64,
    },
    PrecheckCompleted {
        attempt: usize,
        issues: usize,
    },
    CritiqueStarted {
        attempt: usize,
    },
    CritiqueCompleted {
        attempt: usize,
        passed: bool,
        score: f64,
        issues: usize,
    },
    FeedbackRecorded {
        attempt: usize,
    },
    PartsPending {
        attempt: usize,
        keys: Vec<String>,
    },
    RunConverged {
        mode: LoopMode,
        iterations: usize,
        score: f64,
    },
    RunAccepted {
        mode: LoopMode,
        iterations: usize,
        score: f64,
    },
    IterationBudgetExhausted {
        iterations: usize,
    },
    RunInterrupted {
        iterations: usize,
    },
    StageStarted {
        stage: String,
    },
    StageCompleted {
        stage: String,
        converged: bool,
        score: f64,
    },
    ArtifactSaved {
        path: PathBuf,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for run events - handles both console output and file capture.
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger that also appends JSONL events to a file.
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File capture is always JSON, whatever the console format.
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted {
                mode,
                topic,
                max_iterations,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} loop for {} (budget {})",
                    "▶".bright_blue(),
                    mode.to_string().bold(),
                    topic.bright_white(),
                    max_iterations
                );
            }
            LogEvent::GenerationStarted { attempt, part } => {
                let label = match part {
                    Some(key) => format!("GENERATE {}", key),
                    None => "GENERATE".to_string(),
                };
                let _ = writeln!(
                    stderr,
                    "  {} {} (attempt {})",
                    "▶".bright_cyan(),
                    label.bright_cyan().bold(),
                    attempt + 1
                );
            }
            LogEvent::GenerationCompleted {
                part,
                duration_secs,
                ..
            } => {
                let label = match part {
                    Some(key) => format!("{} done", key),
                    None => "done".to_string(),
                };
                let _ = writeln!(
                    stderr,
                    "    {} {} ({:.1}s)",
                    "✓".bright_green(),
                    label,
                    duration_secs
                );
            }
            LogEvent::PrecheckCompleted { issues, .. } => {
                if *issues > 0 {
                    let _ = writeln!(
                        stderr,
                        "    {} pre-check flagged {} issue(s)",
                        "⚠".bright_yellow(),
                        issues
                    );
                } else {
                    let _ = writeln!(stderr, "    {} pre-check clean", "✓".bright_green());
                }
            }
            LogEvent::CritiqueStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "CRITIQUE".bright_magenta().bold()
                );
            }
            LogEvent::CritiqueCompleted {
                passed,
                score,
                issues,
                ..
            } => {
                let styled = if *passed {
                    format!("✓ passed (score {:.1})", score)
                        .bright_green()
                        .to_string()
                } else {
                    format!("→ failed (score {:.1}, {} issue(s))", score, issues)
                        .bright_yellow()
                        .to_string()
                };
                let _ = writeln!(stderr, "    {}", styled);
            }
            LogEvent::FeedbackRecorded { attempt } => {
                let _ = writeln!(
                    stderr,
                    "    {} feedback recorded for attempt {}",
                    "↻".dimmed(),
                    attempt + 2
                );
            }
            LogEvent::PartsPending { keys, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} regenerating: {}",
                    "↻".bright_yellow(),
                    keys.join(", ")
                );
            }
            LogEvent::RunConverged {
                iterations, score, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{} converged after {} iteration(s), score {:.1}",
                    "✓".bright_green(),
                    iterations,
                    score
                );
            }
            LogEvent::RunAccepted {
                iterations, score, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{} accepted with residual warnings after {} iteration(s), score {:.1}",
                    "→".bright_yellow(),
                    iterations,
                    score
                );
            }
            LogEvent::IterationBudgetExhausted { iterations } => {
                let _ = writeln!(
                    stderr,
                    "{} iteration budget exhausted ({}), returning best effort",
                    "⚠".bright_yellow(),
                    iterations
                );
            }
            LogEvent::RunInterrupted { iterations } => {
                let _ = writeln!(
                    stderr,
                    "{} interrupted after {} iteration(s)",
                    "✗".bright_red(),
                    iterations
                );
            }
            LogEvent::StageStarted { stage } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    format!("── {} ──────────────────────", stage)
                        .bright_blue()
                        .bold()
                );
            }
            LogEvent::StageCompleted {
                stage,
                converged,
                score,
            } => {
                let mark = if *converged {
                    "✓".bright_green()
                } else {
                    "⚠".bright_yellow()
                };
                let _ = writeln!(stderr, "{} {} finished (score {:.1})", mark, stage, score);
            }
            LogEvent::ArtifactSaved { path } => {
                let _ = writeln!(
                    stderr,
                    "    {} saved {}",
                    "💾".dimmed(),
                    path.display().to_string().dimmed()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { mode, .. } => format!("[{}] run:start:{}", timestamp, mode),
            LogEvent::GenerationStarted { attempt, part } => format!(
                "[{}] generate:start:{} {}",
                timestamp,
                attempt + 1,
                part.as_deref().unwrap_or("-")
            ),
            LogEvent::GenerationCompleted {
                attempt,
                part,
                duration_secs,
            } => format!(
                "[{}] generate:done:{} {} {:.1}s",
                timestamp,
                attempt + 1,
                part.as_deref().unwrap_or("-"),
                duration_secs
            ),
            LogEvent::PrecheckCompleted { attempt, issues } => {
                format!("[{}] precheck:{} issues={}", timestamp, attempt + 1, issues)
            }
            LogEvent::CritiqueStarted { attempt } => {
                format!("[{}] critique:start:{}", timestamp, attempt + 1)
            }
            LogEvent::CritiqueCompleted {
                attempt,
                passed,
                score,
                issues,
            } => format!(
                "[{}] critique:done:{} passed={} score={:.1} issues={}",
                timestamp,
                attempt + 1,
                passed,
                score,
                issues
            ),
            LogEvent::FeedbackRecorded { attempt } => {
                format!("[{}] feedback:{}", timestamp, attempt + 1)
            }
            LogEvent::PartsPending { attempt, keys } => format!(
                "[{}] pending:{} {}",
                timestamp,
                attempt + 1,
                keys.join(",")
            ),
            LogEvent::RunConverged {
                iterations, score, ..
            } => format!(
                "[{}] run:converged:{} score={:.1}",
                timestamp, iterations, score
            ),
            LogEvent::RunAccepted {
                iterations, score, ..
            } => format!(
                "[{}] run:accepted:{} score={:.1}",
                timestamp, iterations, score
            ),
            LogEvent::IterationBudgetExhausted { iterations } => {
                format!("[{}] run:limit:{}", timestamp, iterations)
            }
            LogEvent::RunInterrupted { iterations } => {
                format!("[{}] run:interrupted:{}", timestamp, iterations)
            }
            LogEvent::StageStarted { stage } => format!("[{}] stage:start:{}", timestamp, stage),
            LogEvent::StageCompleted {
                stage,
                converged,
                score,
            } => format!(
                "[{}] stage:done:{} converged={} score={:.1}",
                timestamp, stage, converged, score
            ),
            LogEvent::ArtifactSaved { path } => {
                format!("[{}] saved:{}", timestamp, path.display())
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}
