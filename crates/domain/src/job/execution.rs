//! Recurring job execution — one recorded run of a job's handler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{JobExecutionId, JobId, TenantId};
use crate::time::{Timestamp, elapsed_ms};

/// Lifecycle of a job run. Runs are created already `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

impl JobRunStatus {
    /// Stable storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for JobRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobRunStatus {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
    }
}

/// What a job handler reports back on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Items inspected.
    pub processed: u64,
    /// Items actually changed, notified or deleted.
    pub affected: u64,
    pub data: Value,
}

/// A run of a [`RecurringJob`](super::RecurringJob).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringJobExecution {
    pub id: JobExecutionId,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub status: JobRunStatus,
    pub duration_ms: Option<u64>,
    pub processed_items: u64,
    pub affected_items: u64,
    pub error_message: Option<String>,
    pub output_data: Option<Value>,
}

impl RecurringJobExecution {
    /// A run that has just been claimed.
    #[must_use]
    pub fn start(tenant_id: TenantId, job_id: JobId, started_at: Timestamp) -> Self {
        Self {
            id: JobExecutionId::new(),
            tenant_id,
            job_id,
            started_at,
            finished_at: None,
            status: JobRunStatus::Running,
            duration_ms: None,
            processed_items: 0,
            affected_items: 0,
            error_message: None,
            output_data: None,
        }
    }

    /// Whether the run has reached a final status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status != JobRunStatus::Running
    }

    fn finish(&mut self, status: JobRunStatus, at: Timestamp) {
        // finished_at never precedes started_at, even with a skewed clock.
        let at = at.max(self.started_at);
        self.status = status;
        self.finished_at = Some(at);
        self.duration_ms = Some(elapsed_ms(self.started_at, at));
    }

    /// Finish successfully with the handler's outcome.
    pub fn complete(&mut self, at: Timestamp, outcome: JobOutcome) {
        self.finish(JobRunStatus::Completed, at);
        self.processed_items = outcome.processed;
        self.affected_items = outcome.affected;
        self.output_data = Some(outcome.data);
    }

    /// Finish with the handler's error.
    pub fn fail(&mut self, at: Timestamp, message: impl Into<String>) {
        self.finish(JobRunStatus::Failed, at);
        self.error_message = Some(message.into());
    }

    /// Finish because the handler exceeded the job's timeout.
    pub fn time_out(&mut self, at: Timestamp, timeout_secs: u64) {
        self.finish(JobRunStatus::Timeout, at);
        self.error_message = Some(format!("timed out after {timeout_secs}s"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;
    use chrono::TimeDelta;
    use serde_json::json;

    fn started() -> RecurringJobExecution {
        RecurringJobExecution::start(TenantId::new(), JobId::new(), now())
    }

    #[test]
    fn should_start_running_without_finish_time() {
        let run = started();
        assert_eq!(run.status, JobRunStatus::Running);
        assert!(run.finished_at.is_none());
        assert!(!run.is_finished());
    }

    #[test]
    fn should_record_outcome_and_duration_on_completion() {
        let mut run = started();
        let at = run.started_at + TimeDelta::milliseconds(250);
        run.complete(
            at,
            JobOutcome {
                processed: 10,
                affected: 3,
                data: json!({"tagged": 3}),
            },
        );
        assert_eq!(run.status, JobRunStatus::Completed);
        assert_eq!(run.finished_at, Some(at));
        assert_eq!(run.duration_ms, Some(250));
        assert_eq!(run.processed_items, 10);
        assert_eq!(run.affected_items, 3);
        assert_eq!(run.output_data, Some(json!({"tagged": 3})));
    }

    #[test]
    fn should_never_finish_before_start() {
        let mut run = started();
        let earlier = run.started_at - TimeDelta::seconds(5);
        run.fail(earlier, "boom");
        assert_eq!(run.finished_at, Some(run.started_at));
        assert_eq!(run.duration_ms, Some(0));
        assert_eq!(run.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn should_describe_timeout() {
        let mut run = started();
        run.time_out(run.started_at + TimeDelta::seconds(30), 30);
        assert_eq!(run.status, JobRunStatus::Timeout);
        assert_eq!(run.error_message.as_deref(), Some("timed out after 30s"));
    }
}
