//! Report orchestration: one model execution, one report directory.
//!
//! Stages run strictly in order:
//! `Created → DirectoryReady → LoggingReady → ConfigPersisted → DatasetReady →
//! ModelReady → Executing → Done`. The first failure aborts the run; whatever
//! was written to the report directory up to that point stays on disk.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::HarnessConfig;
use crate::descriptor::{DatasetDescriptor, Entity, ModelDescriptor};
use crate::error::Result;
use crate::exec::{ExecContext, Executor, OutputCapture};
use crate::git;
use crate::obs::{
    emit_report_finished, emit_report_started, emit_stage, emit_summary_error, ReportSpan,
};
use crate::setup::SetupStage;
use crate::telemetry::report_dispatch;
use crate::vars::{Vars, DATASET, SABATH_REPORT};

pub const MODEL_FILE: &str = "model.json";
pub const DATASET_FILE: &str = "dataset.json";
pub const LOG_FILE: &str = "log.txt";
pub const STDOUT_FILE: &str = "stdout.txt";
pub const STDERR_FILE: &str = "stderr.txt";
pub const SUMMARY_FILE: &str = "summary.json";

/// Environment variable extended with the install root for child programs.
pub const SEARCH_PATH_VAR: &str = "PYTHONPATH";

/// Progress of a report through its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStage {
    Created,
    DirectoryReady,
    LoggingReady,
    ConfigPersisted,
    DatasetReady,
    ModelReady,
    Executing,
    Done,
}

impl ReportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStage::Created => "created",
            ReportStage::DirectoryReady => "directory-ready",
            ReportStage::LoggingReady => "logging-ready",
            ReportStage::ConfigPersisted => "config-persisted",
            ReportStage::DatasetReady => "dataset-ready",
            ReportStage::ModelReady => "model-ready",
            ReportStage::Executing => "executing",
            ReportStage::Done => "done",
        }
    }
}

/// Contents of `summary.json`, written when a run terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub model: String,
    pub dataset: Option<String>,
    pub dest: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    /// Last stage reached.
    pub stage: ReportStage,
    pub error: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub dataset_dir: Option<PathBuf>,
    /// HEAD of the model's clone, when it is a git checkout.
    pub model_revision: Option<String>,
}

#[derive(Debug, Default)]
struct Progress {
    model_dir: Option<PathBuf>,
    dataset_dir: Option<PathBuf>,
}

/// A single model execution and the directory recording it.
///
/// [`Report::run`] consumes the report, so it cannot be re-run.
pub struct Report {
    config: HarnessConfig,
    dest: PathBuf,
    model: ModelDescriptor,
    dataset: Option<DatasetDescriptor>,
    stage: ReportStage,
}

impl Report {
    pub fn new(
        config: HarnessConfig,
        dest: impl AsRef<Path>,
        model: ModelDescriptor,
        dataset: Option<DatasetDescriptor>,
    ) -> Self {
        let dest = dest.as_ref();
        let dest = std::path::absolute(dest).unwrap_or_else(|_| dest.to_path_buf());
        Self {
            config,
            dest,
            model,
            dataset,
            stage: ReportStage::Created,
        }
    }

    /// `report-<model-id>-<unix-timestamp>` relative to the current directory.
    pub fn default_destination(model_id: &str) -> PathBuf {
        PathBuf::from(format!("report-{}-{}", model_id, Utc::now().timestamp()))
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn stage(&self) -> ReportStage {
        self.stage
    }

    fn advance(&mut self, stage: ReportStage) {
        self.stage = stage;
        emit_stage(stage.as_str());
    }

    /// Execute the whole pipeline.
    ///
    /// Returns the summary on success. On failure the original error is
    /// returned; the summary (with `success: false`) is still written.
    pub fn run(mut self) -> Result<ReportSummary> {
        let started_at = Utc::now();
        let start = Instant::now();

        std::fs::create_dir_all(&self.dest)?;
        self.advance(ReportStage::DirectoryReady);

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dest.join(LOG_FILE))?;
        let dispatch = report_dispatch(self.config.log, log_file);
        let _log_guard = tracing::dispatcher::set_default(&dispatch);
        let _span = ReportSpan::enter(self.model.id());
        self.advance(ReportStage::LoggingReady);

        emit_report_started(
            self.model.id(),
            self.dataset.as_ref().map(|d| d.id()),
            &self.dest.display().to_string(),
        );

        let mut progress = Progress::default();
        let result = self.execute(&mut progress);

        let model_revision = progress.model_dir.as_deref().and_then(git::clone_revision);

        let summary = ReportSummary {
            model: self.model.id().to_string(),
            dataset: self.dataset.as_ref().map(|d| d.id().to_string()),
            dest: self.dest.clone(),
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: result.is_ok(),
            stage: self.stage,
            error: result.as_ref().err().map(|e| e.to_string()),
            model_dir: progress.model_dir,
            dataset_dir: progress.dataset_dir,
            model_revision,
        };

        if let Err(e) = write_summary(&self.dest.join(SUMMARY_FILE), &summary) {
            emit_summary_error(self.model.id(), &e);
        }
        emit_report_finished(self.model.id(), summary.duration_ms, summary.success);

        match result {
            Ok(()) => Ok(summary),
            Err(e) => {
                error!("report failed: {}", e);
                Err(e)
            }
        }
    }

    fn execute(&mut self, progress: &mut Progress) -> Result<()> {
        let capture = OutputCapture::new(self.dest.join(STDOUT_FILE), self.dest.join(STDERR_FILE));
        capture.touch()?;
        let executor = Executor::new(self.report_context(capture));
        let setup = SetupStage::new(self.config.fetcher(executor.clone()));

        self.persist_config()?;
        self.advance(ReportStage::ConfigPersisted);

        let dataset_dir = match &self.dataset {
            Some(dataset) => Some(setup.fetcher().fetch(dataset)?),
            None => None,
        };
        if dataset_dir.is_some() {
            progress.dataset_dir = dataset_dir;
            self.advance(ReportStage::DatasetReady);
        }

        let model_dir = setup.ensure_setup(&self.model)?;
        progress.model_dir = Some(model_dir.clone());
        self.advance(ReportStage::ModelReady);

        info!("RUN {} ...", self.model.id());
        self.advance(ReportStage::Executing);
        let mut overlay = Vars::new();
        if let Some(ds) = self.model.primary_dataset() {
            let ds_dir = setup.fetcher().cache().locate(ds);
            overlay.insert(DATASET, ds_dir.to_string_lossy());
        }
        executor.execute(&self.model.run, &model_dir, &overlay)?;

        self.advance(ReportStage::Done);
        info!("report written to {}", self.dest.display());
        Ok(())
    }

    fn report_context(&self, capture: OutputCapture) -> ExecContext {
        let dest = self.dest.to_string_lossy().into_owned();
        let root = self.config.root.to_string_lossy().into_owned();
        let search_path = match std::env::var(SEARCH_PATH_VAR) {
            Ok(existing) if !existing.is_empty() => format!("{root}:{existing}"),
            _ => root,
        };

        self.config
            .exec_context()
            .with_var(SABATH_REPORT, dest.clone())
            .with_env(SABATH_REPORT, dest)
            .with_env(SEARCH_PATH_VAR, search_path)
            .with_capture(capture)
    }

    fn persist_config(&self) -> Result<()> {
        write_json(&self.dest.join(MODEL_FILE), self.model.raw())?;
        if let Some(dataset) = &self.dataset {
            write_json(&self.dest.join(DATASET_FILE), dataset.raw())?;
        }
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Write `summary.json` in pretty JSON format.
pub fn write_summary(path: &Path, summary: &ReportSummary) -> Result<()> {
    write_json(path, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shell_model(run: serde_json::Value) -> ModelDescriptor {
        ModelDescriptor::from_json(json!({
            "id": "M1",
            "clone": {"shell": "true"},
            "run": run
        }))
        .unwrap()
    }

    #[test]
    fn test_stage_order() {
        assert!(ReportStage::Created < ReportStage::DirectoryReady);
        assert!(ReportStage::ModelReady < ReportStage::Executing);
        assert!(ReportStage::Executing < ReportStage::Done);
        assert_eq!(ReportStage::ConfigPersisted.as_str(), "config-persisted");
    }

    #[test]
    fn test_default_destination_format() {
        let dest = Report::default_destination("M1");
        let name = dest.to_string_lossy();
        let ts = name.strip_prefix("report-M1-").expect("prefix");
        assert!(ts.parse::<i64>().is_ok(), "timestamp suffix: {ts}");
    }

    #[test]
    fn test_run_without_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new(tmp.path());
        let dest = tmp.path().join("reports/r1");

        let summary = Report::new(config, &dest, shell_model(json!("echo '$[DATASET]'")), None)
            .run()
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.stage, ReportStage::Done);
        assert!(summary.dataset.is_none());
        assert!(dest.join(MODEL_FILE).exists());
        assert!(!dest.join(DATASET_FILE).exists());
        // no dataset, token stays verbatim
        let out = std::fs::read_to_string(dest.join(STDOUT_FILE)).unwrap();
        assert_eq!(out.trim(), "$[DATASET]");
    }

    #[test]
    fn test_children_see_report_location() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new(tmp.path());
        let dest = tmp.path().join("r2");

        Report::new(
            config.clone(),
            &dest,
            shell_model(json!(["echo $SABATH_REPORT", "echo $[SABATH_REPORT]", "echo $PYTHONPATH"])),
            None,
        )
        .run()
        .unwrap();

        let out = std::fs::read_to_string(dest.join(STDOUT_FILE)).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], dest.to_string_lossy());
        assert_eq!(lines[1], dest.to_string_lossy());
        assert!(lines[2].starts_with(&*config.root.to_string_lossy()));
    }

    #[test]
    fn test_failed_run_writes_summary_and_keeps_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new(tmp.path());
        let dest = tmp.path().join("r3");

        let err = Report::new(config, &dest, shell_model(json!(["echo partial", "exit 7"])), None)
            .run()
            .unwrap_err();
        assert_eq!(err.failed_command(), Some("exit 7"));

        let summary: ReportSummary =
            serde_json::from_str(&std::fs::read_to_string(dest.join(SUMMARY_FILE)).unwrap())
                .unwrap();
        assert!(!summary.success);
        assert_eq!(summary.stage, ReportStage::Executing);
        assert!(summary.error.unwrap().contains("exit 7"));
        assert_eq!(
            std::fs::read_to_string(dest.join(STDOUT_FILE)).unwrap(),
            "partial\n"
        );
        assert!(std::fs::read_to_string(dest.join(LOG_FILE))
            .unwrap()
            .contains("command failed: exit 7"));
    }
}
