//! Job handlers — the work behind each [`JobKind`].

use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::TimeDelta;
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::TenantId;
use leadflow_domain::job::{JobKind, JobOutcome, RecurringJob};
use leadflow_domain::lead::{Lead, LeadFilter, LeadPatch};
use leadflow_domain::time::Timestamp;
use serde_json::json;

use crate::ports::{Clock, ExecutionStore, LeadRepository, Notifier};
use crate::scheduler::JobRunner;

const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// Dispatches a job run to the handler of its kind.
pub struct JobHandlerRegistry<L, E, N, C> {
    leads: L,
    executions: E,
    notifier: N,
    clock: C,
}

impl<L, E, N, C> JobHandlerRegistry<L, E, N, C>
where
    L: LeadRepository + Send + Sync,
    E: ExecutionStore + Send + Sync,
    N: Notifier,
    C: Clock,
{
    /// Create a registry over the given ports.
    pub fn new(leads: L, executions: E, notifier: N, clock: C) -> Self {
        Self {
            leads,
            executions,
            notifier,
            clock,
        }
    }

    /// Run `job` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns the first storage or notification error hit; the run is then
    /// counted as failed by the scheduler.
    #[tracing::instrument(skip(self, job, now), fields(job_id = %job.id, kind = job.kind.as_str()))]
    pub async fn handle(
        &self,
        job: &RecurringJob,
        now: Timestamp,
    ) -> Result<JobOutcome, LeadflowError> {
        let tenant_id = job.tenant_id;
        match &job.kind {
            JobKind::StaleLeadSweep {
                status,
                idle_days,
                set_status,
                add_tag,
            } => {
                self.sweep_stale_leads(
                    tenant_id,
                    now - days(*idle_days),
                    status,
                    set_status.as_deref(),
                    add_tag.as_deref(),
                )
                .await
            }
            JobKind::ExecutionCleanup { retain_days } => {
                let cutoff = now - days(*retain_days);
                let report = self
                    .executions
                    .purge_finished_before(tenant_id, cutoff)
                    .await?;
                Ok(JobOutcome {
                    processed: report.total(),
                    affected: report.total(),
                    data: json!({
                        "cutoff": cutoff,
                        "automation_executions": report.automation,
                        "job_executions": report.jobs,
                    }),
                })
            }
            JobKind::FollowUpReminder {
                stage,
                status,
                idle_hours,
                recipient,
            } => {
                let filter = LeadFilter {
                    status: status.clone(),
                    stage: stage.clone(),
                    updated_before: Some(now - hours(*idle_hours)),
                    created_since: None,
                };
                let leads = self.leads.find(tenant_id, filter).await?;
                for lead in &leads {
                    self.notifier
                        .notify(recipient, &reminder_message(lead, now))?;
                }
                Ok(JobOutcome {
                    processed: leads.len() as u64,
                    affected: leads.len() as u64,
                    data: json!({ "lead_ids": leads.iter().map(|l| l.id).collect::<Vec<_>>() }),
                })
            }
            JobKind::LeadDigest {
                recipient,
                window_hours,
            } => {
                let filter = LeadFilter {
                    created_since: Some(now - hours(*window_hours)),
                    ..LeadFilter::default()
                };
                let leads = self.leads.find(tenant_id, filter).await?;
                let sent = !leads.is_empty();
                if sent {
                    self.notifier
                        .notify(recipient, &digest_message(&leads, *window_hours))?;
                }
                Ok(JobOutcome {
                    processed: leads.len() as u64,
                    affected: u64::from(sent),
                    data: json!({ "new_leads": leads.len(), "sent": sent }),
                })
            }
        }
    }

    async fn sweep_stale_leads(
        &self,
        tenant_id: TenantId,
        idle_since: Timestamp,
        status: &str,
        set_status: Option<&str>,
        add_tag: Option<&str>,
    ) -> Result<JobOutcome, LeadflowError> {
        let filter = LeadFilter {
            status: Some(status.to_string()),
            updated_before: Some(idle_since),
            ..LeadFilter::default()
        };
        let leads = self.leads.find(tenant_id, filter).await?;
        let mut touched = Vec::new();
        for lead in &leads {
            let mut changed = false;
            if let Some(tag) = add_tag {
                changed |= self
                    .leads
                    .add_tag(tenant_id, lead.id, tag.to_string())
                    .await?;
            }
            if let Some(next) = set_status.filter(|next| *next != lead.status) {
                self.leads
                    .update(tenant_id, lead.id, LeadPatch::status(next), self.clock.now())
                    .await?;
                changed = true;
            }
            if changed {
                touched.push(lead.id);
            }
        }
        tracing::debug!(matched = leads.len(), touched = touched.len(), "stale leads swept");
        Ok(JobOutcome {
            processed: leads.len() as u64,
            affected: touched.len() as u64,
            data: json!({ "lead_ids": touched }),
        })
    }
}

impl<L, E, N, C> JobRunner for JobHandlerRegistry<L, E, N, C>
where
    L: LeadRepository + Send + Sync,
    E: ExecutionStore + Send + Sync,
    N: Notifier,
    C: Clock,
{
    fn run(
        &self,
        job: RecurringJob,
        now: Timestamp,
    ) -> impl Future<Output = Result<JobOutcome, LeadflowError>> + Send {
        async move { self.handle(&job, now).await }
    }
}

fn days(count: u32) -> TimeDelta {
    leadflow_domain::time::seconds(u64::from(count) * SECS_PER_DAY)
}

fn hours(count: u32) -> TimeDelta {
    leadflow_domain::time::seconds(u64::from(count) * SECS_PER_HOUR)
}

fn reminder_message(lead: &Lead, now: Timestamp) -> String {
    let idle = (now - lead.updated_at)
        .to_std()
        .unwrap_or(StdDuration::ZERO)
        .as_secs()
        / SECS_PER_HOUR;
    format!(
        "Follow up with {} ({}): no activity for {idle}h",
        lead.name, lead.status
    )
}

fn digest_message(leads: &[Lead], window_hours: u32) -> String {
    let names: Vec<&str> = leads.iter().map(|lead| lead.name.as_str()).collect();
    format!(
        "{} new lead(s) in the last {window_hours}h: {}",
        leads.len(),
        names.join(", ")
    )
}
