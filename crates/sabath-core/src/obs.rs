//! Structured lifecycle events for report runs.
//!
//! Events are emitted at `info!` with an `event` field so JSON log consumers
//! can filter on them.

use tracing::info;

/// RAII guard that enters a report-scoped span for the duration of a run.
pub struct ReportSpan {
    _span: tracing::span::EnteredSpan,
}

impl ReportSpan {
    pub fn enter(model_id: &str) -> Self {
        let span = tracing::info_span!("sabath.report", model = %model_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: report started.
pub fn emit_report_started(model_id: &str, dataset_id: Option<&str>, dest: &str) {
    info!(
        event = "report.started",
        model = %model_id,
        dataset = dataset_id.unwrap_or("-"),
        dest = %dest,
    );
}

/// Emit event: pipeline stage reached.
pub fn emit_stage(stage: &str) {
    tracing::debug!(event = "report.stage", stage = %stage);
}

/// Emit event: report finished.
pub fn emit_report_finished(model_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "report.finished",
        model = %model_id,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: the summary artifact could not be written (warning level).
pub fn emit_summary_error(model_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "report.summary_error", model = %model_id, error = %error);
}
