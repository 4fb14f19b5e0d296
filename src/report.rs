//! Integration report
//!
//! One record per orchestrator step, in execution order, plus a human
//! summary. Printed after a run or emitted as JSON with `--json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version of the JSON report
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier of the JSON report
pub const REPORT_SCHEMA_ID: &str = "mmine/integration_report@1";

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step wrote something
    Applied,
    /// Everything was already in place
    Unchanged,
    /// The step could not run; the reason is recorded
    Skipped,
}

/// Record of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Report of one integration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub main_target: String,
    pub extension_target: String,
    pub cordova: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    pub human_summary: String,
}

impl IntegrationReport {
    pub fn new(main_target: &str, extension_target: &str, cordova: bool) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            main_target: main_target.to_string(),
            extension_target: extension_target.to_string(),
            cordova,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            human_summary: String::new(),
        }
    }

    /// Record a step as applied or unchanged
    pub fn record(&mut self, step: &str, changed: bool) {
        let status = if changed {
            StepStatus::Applied
        } else {
            StepStatus::Unchanged
        };
        self.push(step, status, None);
    }

    pub fn skip(&mut self, step: &str, reason: impl Into<String>) {
        self.push(step, StepStatus::Skipped, Some(reason.into()));
    }

    fn push(&mut self, step: &str, status: StepStatus, detail: Option<String>) {
        self.steps.push(StepRecord {
            step: step.to_string(),
            status,
            detail,
        });
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Whether any step wrote something
    pub fn changed(&self) -> bool {
        self.count(StepStatus::Applied) > 0
    }

    /// Stamp the finish time and compute the human summary
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self.human_summary = self.generate_human_summary();
        self
    }

    fn generate_human_summary(&self) -> String {
        let applied = self.count(StepStatus::Applied);
        let skipped = self.count(StepStatus::Skipped);
        let mut summary = if applied == 0 {
            format!(
                "{} already integrated into {}: nothing to change",
                self.extension_target, self.main_target
            )
        } else {
            format!(
                "Integrated {} into {}: {}/{} steps applied",
                self.extension_target,
                self.main_target,
                applied,
                self.steps.len()
            )
        };
        if skipped > 0 {
            summary.push_str(&format!(", {} skipped", skipped));
        }
        summary
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
