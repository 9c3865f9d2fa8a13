//! Structured run reports.
//!
//! A report is collected in memory while a command runs and written once, as
//! pretty JSON, when the process is about to exit. Nothing is written unless
//! `--report-json` was given.

use crate::config::expand_home;
use crate::routing::{Routing, RoutingRecord};
use crate::rpcli::RunResult;
use crate::{ERROR_EXIT_CODE, Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Version of the report document layout.
pub const REPORT_VERSION: u32 = 1;

/// Characters of stdout/stderr kept per stage.
pub const TAIL_CHARS: usize = 600;

/// One `rp-cli` invocation as recorded in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub name: String,
    pub classification: String,
    pub code: i32,
    pub timed_out: bool,
    pub signal: Option<i32>,
    pub duration_ms: u64,
    pub stdout_chars: usize,
    pub stderr_chars: usize,
    pub stdout_tail: String,
    pub stderr_tail: String,
    /// Stage-specific fields (e.g. `retry_timeout_seconds`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StageRecord {
    pub fn new(name: &str, res: &RunResult, builder_related: bool) -> Self {
        Self {
            name: name.to_string(),
            classification: res.classify(builder_related).to_string(),
            code: res.code,
            timed_out: res.timed_out,
            signal: res.signal,
            duration_ms: res.elapsed.as_millis() as u64,
            stdout_chars: res.stdout.chars().count(),
            stderr_chars: res.stderr.chars().count(),
            stdout_tail: tail(&res.stdout, TAIL_CHARS),
            stderr_tail: tail(&res.stderr, TAIL_CHARS),
            extra: Map::new(),
        }
    }
}

/// What happened when a previous export was offered as a substitute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeRecord {
    pub attempted: bool,
    pub used: bool,
    pub reason: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_exists: Option<bool>,
}

/// The document written to `--report-json`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub report_version: u32,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: i32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingRecord>,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Report under construction for one command.
#[derive(Debug, Clone)]
pub struct RunReport {
    command: String,
    started_at: DateTime<Utc>,
    started: Instant,
    stages: Vec<StageRecord>,
    routing: Option<RoutingRecord>,
    resume: Option<ResumeRecord>,
    extra: Map<String, Value>,
}

impl RunReport {
    pub fn start(command: &str) -> Self {
        Self {
            command: command.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            stages: Vec::new(),
            routing: None,
            resume: None,
            extra: Map::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Record a stage and return it so callers can attach extras.
    pub fn add_stage(
        &mut self,
        name: &str,
        res: &RunResult,
        builder_related: bool,
    ) -> &mut StageRecord {
        self.stages.push(StageRecord::new(name, res, builder_related));
        let last = self.stages.len() - 1;
        &mut self.stages[last]
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn set_routing(&mut self, routing: &Routing) {
        self.routing = Some(routing.record());
    }

    pub fn set_resume(&mut self, resume: ResumeRecord) {
        self.resume = Some(resume);
    }

    pub fn resume(&self) -> Option<&ResumeRecord> {
        self.resume.as_ref()
    }

    /// Set a top-level command-specific field.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.extra.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Final document for a command that returned `exit_code`.
    pub fn finish(&self, exit_code: i32) -> ReportDocument {
        ReportDocument {
            report_version: REPORT_VERSION,
            command: self.command.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            exit_code,
            ok: exit_code == 0,
            routing: self.routing.clone(),
            stages: self.stages.clone(),
            resume: self.resume.clone(),
            error: None,
            classification: None,
            extra: self.extra.clone(),
        }
    }

    /// Final document for a command that aborted with `err`.
    pub fn finish_with_error(&self, err: &Error) -> ReportDocument {
        let mut doc = self.finish(ERROR_EXIT_CODE);
        doc.error = Some(err.to_string());
        doc.classification = Some("rpflow_error".to_string());
        doc
    }
}

/// Write a report document, creating parent directories.
pub fn write_report(path: &Path, doc: &ReportDocument) -> Result<()> {
    let path = expand_home(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(&path, format!("{}\n", json))?;
    tracing::debug!(path = %path.display(), exit_code = doc.exit_code, "wrote run report");
    Ok(())
}

/// The last `limit` characters of `text`.
pub fn tail(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}
