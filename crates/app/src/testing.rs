//! In-memory port fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use leadflow_domain::automation::{AutomationExecution, AutomationRule, ExecutionStatus, TriggerType};
use leadflow_domain::error::{LeadflowError, NotFoundError, NotifyError};
use leadflow_domain::id::{ExecutionId, JobId, LeadId, RuleId, TenantId};
use leadflow_domain::job::{JobOutcome, RecurringJob, RecurringJobExecution};
use leadflow_domain::lead::{Lead, LeadFilter, LeadPatch};
use leadflow_domain::time::Timestamp;

use crate::dispatcher::Dispatch;
use crate::ports::{
    Clock, ExecutionStats, ExecutionStore, JobRepository, LeadRepository, Notifier, PurgeReport,
    RuleRepository,
};
use crate::scheduler::JobRunner;

fn not_found(entity: &'static str, id: impl ToString) -> LeadflowError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

fn storage_failure(message: &str) -> LeadflowError {
    LeadflowError::Storage(message.to_string().into())
}

// ── Rules ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRules {
    store: Mutex<HashMap<RuleId, AutomationRule>>,
    fail_record_trigger: AtomicBool,
}

impl InMemoryRules {
    pub fn with(rules: Vec<AutomationRule>) -> Self {
        Self {
            store: Mutex::new(rules.into_iter().map(|r| (r.id, r)).collect()),
            fail_record_trigger: AtomicBool::new(false),
        }
    }

    pub fn get(&self, id: RuleId) -> Option<AutomationRule> {
        self.store.lock().unwrap().get(&id).cloned()
    }

    pub fn fail_record_trigger(&self) {
        self.fail_record_trigger.store(true, Ordering::SeqCst);
    }
}

impl RuleRepository for InMemoryRules {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, LeadflowError>> + Send {
        self.store.lock().unwrap().insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, LeadflowError>> + Send {
        let r = self
            .store
            .lock()
            .unwrap()
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned();
        async { Ok(r) }
    }

    fn list(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, LeadflowError>> + Send {
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn find_active(
        &self,
        tenant_id: TenantId,
        trigger: TriggerType,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, LeadflowError>> + Send {
        // HashMap order: the engine must not rely on the store sorting.
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.active && r.trigger == trigger)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, LeadflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let r = match store.get_mut(&rule.id) {
            Some(existing) if existing.tenant_id == rule.tenant_id => {
                *existing = rule.clone();
                Ok(rule)
            }
            _ => Err(not_found("AutomationRule", rule.id)),
        };
        async { r }
    }

    fn delete(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let r = if store.get(&id).is_some_and(|r| r.tenant_id == tenant_id) {
            store.remove(&id);
            Ok(())
        } else {
            Err(not_found("AutomationRule", id))
        };
        async { r }
    }

    fn record_trigger(
        &self,
        tenant_id: TenantId,
        id: RuleId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        let r = if self.fail_record_trigger.load(Ordering::SeqCst) {
            Err(storage_failure("counter update refused"))
        } else {
            let mut store = self.store.lock().unwrap();
            match store.get_mut(&id).filter(|r| r.tenant_id == tenant_id) {
                Some(rule) => {
                    rule.execution_count += 1;
                    rule.last_executed_at = Some(at);
                    Ok(())
                }
                None => Err(not_found("AutomationRule", id)),
            }
        };
        async { r }
    }
}

// ── Jobs ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryJobs {
    store: Mutex<HashMap<JobId, RecurringJob>>,
    fail_set_next_run: AtomicBool,
}

impl InMemoryJobs {
    pub fn with(jobs: Vec<RecurringJob>) -> Self {
        Self {
            store: Mutex::new(jobs.into_iter().map(|j| (j.id, j)).collect()),
            fail_set_next_run: AtomicBool::new(false),
        }
    }

    pub fn fail_set_next_run(&self) {
        self.fail_set_next_run.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, id: JobId) -> Option<RecurringJob> {
        self.store.lock().unwrap().get(&id).cloned()
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        id: JobId,
        f: impl FnOnce(&mut RecurringJob),
    ) -> Result<RecurringJob, LeadflowError> {
        let mut store = self.store.lock().unwrap();
        let job = store
            .get_mut(&id)
            .filter(|j| j.tenant_id == tenant_id)
            .ok_or_else(|| not_found("RecurringJob", id))?;
        f(job);
        Ok(job.clone())
    }
}

impl JobRepository for InMemoryJobs {
    fn create(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        self.store.lock().unwrap().insert(job.id, job.clone());
        async { Ok(job) }
    }

    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> impl Future<Output = Result<Option<RecurringJob>, LeadflowError>> + Send {
        let r = self
            .store
            .lock()
            .unwrap()
            .get(&id)
            .filter(|j| j.tenant_id == tenant_id)
            .cloned();
        async { Ok(r) }
    }

    fn list(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<RecurringJob>, LeadflowError>> + Send {
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn find_all_active(
        &self,
    ) -> impl Future<Output = Result<Vec<RecurringJob>, LeadflowError>> + Send {
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.active)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn update(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        let r = self.modify(job.tenant_id, job.id, |existing| *existing = job.clone());
        async { r }
    }

    fn delete(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let r = if store.get(&id).is_some_and(|j| j.tenant_id == tenant_id) {
            store.remove(&id);
            Ok(())
        } else {
            Err(not_found("RecurringJob", id))
        };
        async { r }
    }

    fn record_success(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        let r = self.modify(tenant_id, id, |job| job.record_success(at, next_run_at));
        async { r }
    }

    fn record_failure(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        message: String,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        let r = self.modify(tenant_id, id, |job| {
            job.record_failure(at, message, next_run_at);
        });
        async { r }
    }

    fn set_next_run(
        &self,
        tenant_id: TenantId,
        id: JobId,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        let r = if self.fail_set_next_run.load(Ordering::SeqCst) {
            Err(storage_failure("disk full"))
        } else {
            self.modify(tenant_id, id, |job| job.next_run_at = next_run_at)
                .map(|_| ())
        };
        async { r }
    }

    fn set_active(
        &self,
        tenant_id: TenantId,
        id: JobId,
        active: bool,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        let r = self.modify(tenant_id, id, |job| {
            if active {
                job.active = true;
                job.retry_count = 0;
            } else {
                job.active = false;
                job.next_run_at = None;
            }
        });
        async { r }
    }
}

// ── Executions ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryExecutions {
    automations: Mutex<HashMap<ExecutionId, AutomationExecution>>,
    job_runs: Mutex<Vec<RecurringJobExecution>>,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryExecutions {
    pub fn get(&self, id: ExecutionId) -> Option<AutomationExecution> {
        self.automations.lock().unwrap().get(&id).cloned()
    }

    pub fn insert(&self, execution: AutomationExecution) {
        self.automations
            .lock()
            .unwrap()
            .insert(execution.id, execution);
    }

    pub fn automation_count(&self) -> usize {
        self.automations.lock().unwrap().len()
    }

    pub fn job_runs(&self) -> Vec<RecurringJobExecution> {
        self.job_runs.lock().unwrap().clone()
    }

    pub fn insert_job_run(&self, run: RecurringJobExecution) {
        self.job_runs.lock().unwrap().push(run);
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    fn cas(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        next: ExecutionStatus,
        at: Timestamp,
    ) -> bool {
        let mut store = self.automations.lock().unwrap();
        match store.get_mut(&id) {
            Some(exec)
                if exec.tenant_id == tenant_id && exec.status == ExecutionStatus::Pending =>
            {
                exec.status = next;
                if next == ExecutionStatus::Running {
                    exec.executed_at = Some(at);
                } else {
                    exec.finished_at = Some(at);
                }
                true
            }
            _ => false,
        }
    }
}

impl ExecutionStore for InMemoryExecutions {
    fn create_automation(
        &self,
        execution: AutomationExecution,
    ) -> impl Future<Output = Result<AutomationExecution, LeadflowError>> + Send {
        let r = if self.fail_creates.load(Ordering::SeqCst) {
            Err(storage_failure("insert refused"))
        } else {
            self.insert(execution.clone());
            Ok(execution)
        };
        async { r }
    }

    fn get_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<AutomationExecution>, LeadflowError>> + Send {
        let r = self.get(id).filter(|e| e.tenant_id == tenant_id);
        async { Ok(r) }
    }

    fn claim_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        let r = self.cas(tenant_id, id, ExecutionStatus::Running, at);
        async move { Ok(r) }
    }

    fn skip_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        let r = self.cas(tenant_id, id, ExecutionStatus::Skipped, at);
        async move { Ok(r) }
    }

    fn update_automation(
        &self,
        execution: AutomationExecution,
    ) -> impl Future<Output = Result<AutomationExecution, LeadflowError>> + Send {
        let r = if self.fail_updates.load(Ordering::SeqCst) {
            Err(storage_failure("update refused"))
        } else {
            let mut store = self.automations.lock().unwrap();
            match store.get_mut(&execution.id) {
                Some(existing)
                    if existing.tenant_id == execution.tenant_id
                        && existing.status == ExecutionStatus::Running =>
                {
                    *existing = execution.clone();
                    Ok(execution)
                }
                _ => Err(not_found("AutomationExecution", execution.id)),
            }
        };
        async { r }
    }

    fn find_due_automations(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AutomationExecution>, LeadflowError>> + Send {
        let mut r: Vec<_> = self
            .automations
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();
        r.sort_by_key(|e| e.scheduled_for);
        r.truncate(limit as usize);
        async { Ok(r) }
    }

    fn list_automations(
        &self,
        tenant_id: TenantId,
        rule_id: Option<RuleId>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AutomationExecution>, LeadflowError>> + Send {
        let mut r: Vec<_> = self
            .automations
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.tenant_id == tenant_id && rule_id.is_none_or(|id| e.rule_id == id))
            .cloned()
            .collect();
        r.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        r.truncate(limit as usize);
        async { Ok(r) }
    }

    fn automation_stats(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<ExecutionStats, LeadflowError>> + Send {
        let mut stats = ExecutionStats::default();
        for exec in self.automations.lock().unwrap().values() {
            if exec.tenant_id == tenant_id {
                stats.add(exec.status, 1);
            }
        }
        async move { Ok(stats) }
    }

    fn create_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> impl Future<Output = Result<RecurringJobExecution, LeadflowError>> + Send {
        self.insert_job_run(run.clone());
        async { Ok(run) }
    }

    fn update_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> impl Future<Output = Result<RecurringJobExecution, LeadflowError>> + Send {
        let mut runs = self.job_runs.lock().unwrap();
        let r = match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(run)
            }
            None => Err(not_found("RecurringJobExecution", run.id)),
        };
        async { r }
    }

    fn list_job_runs(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RecurringJobExecution>, LeadflowError>> + Send {
        let mut r: Vec<_> = self
            .job_runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.job_id == job_id)
            .cloned()
            .collect();
        r.sort_by_key(|r| std::cmp::Reverse(r.started_at));
        r.truncate(limit as usize);
        async { Ok(r) }
    }

    fn purge_finished_before(
        &self,
        tenant_id: TenantId,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<PurgeReport, LeadflowError>> + Send {
        let mut report = PurgeReport::default();
        self.automations.lock().unwrap().retain(|_, e| {
            let purge = e.tenant_id == tenant_id
                && e.status.is_terminal()
                && e.finished_at.is_some_and(|at| at < cutoff);
            if purge {
                report.automation += 1;
            }
            !purge
        });
        self.job_runs.lock().unwrap().retain(|r| {
            let purge = r.tenant_id == tenant_id
                && r.is_finished()
                && r.finished_at.is_some_and(|at| at < cutoff);
            if purge {
                report.jobs += 1;
            }
            !purge
        });
        async move { Ok(report) }
    }
}

// ── Leads ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryLeads {
    store: Mutex<HashMap<LeadId, Lead>>,
}

impl InMemoryLeads {
    pub fn with(leads: Vec<Lead>) -> Self {
        Self {
            store: Mutex::new(leads.into_iter().map(|l| (l.id, l)).collect()),
        }
    }

    pub fn get(&self, id: LeadId) -> Option<Lead> {
        self.store.lock().unwrap().get(&id).cloned()
    }

    fn modify<T>(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        f: impl FnOnce(&mut Lead) -> T,
    ) -> Result<T, LeadflowError> {
        let mut store = self.store.lock().unwrap();
        let lead = store
            .get_mut(&id)
            .filter(|l| l.tenant_id == tenant_id)
            .ok_or_else(|| not_found("Lead", id))?;
        Ok(f(lead))
    }
}

impl LeadRepository for InMemoryLeads {
    fn create(&self, lead: Lead) -> impl Future<Output = Result<Lead, LeadflowError>> + Send {
        self.store.lock().unwrap().insert(lead.id, lead.clone());
        async { Ok(lead) }
    }

    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: LeadId,
    ) -> impl Future<Output = Result<Option<Lead>, LeadflowError>> + Send {
        let r = self.get(id).filter(|l| l.tenant_id == tenant_id);
        async { Ok(r) }
    }

    fn update(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        patch: LeadPatch,
        at: Timestamp,
    ) -> impl Future<Output = Result<Lead, LeadflowError>> + Send {
        let r = self.modify(tenant_id, id, |lead| {
            lead.apply(patch, at);
            lead.clone()
        });
        async { r }
    }

    fn add_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        let r = self.modify(tenant_id, id, |lead| lead.tags.insert(tag));
        async { r }
    }

    fn remove_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        let r = self.modify(tenant_id, id, |lead| lead.tags.remove(&tag));
        async { r }
    }

    fn find(
        &self,
        tenant_id: TenantId,
        filter: LeadFilter,
    ) -> impl Future<Output = Result<Vec<Lead>, LeadflowError>> + Send {
        let mut r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.tenant_id == tenant_id && filter.matches(l))
            .cloned()
            .collect();
        r.sort_by_key(|l| l.created_at);
        async { Ok(r) }
    }
}

// ── Notifier ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    refuse: Mutex<Option<String>>,
    explode: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every delivery to `recipient` fail.
    pub fn refuse(&self, recipient: &str) {
        *self.refuse.lock().unwrap() = Some(recipient.to_string());
    }

    /// Make every delivery panic.
    pub fn explode(&self) {
        self.explode.store(true, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        assert!(!self.explode.load(Ordering::SeqCst), "notifier exploded");
        if self.refuse.lock().unwrap().as_deref() == Some(recipient) {
            return Err(NotifyError {
                recipient: recipient.to_string(),
                reason: "mailbox unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

// ── Dispatch ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDispatch {
    dispatched: Mutex<Vec<ExecutionId>>,
}

impl RecordingDispatch {
    pub fn dispatched(&self) -> Vec<ExecutionId> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl Dispatch for RecordingDispatch {
    fn dispatch(&self, _tenant_id: TenantId, execution_id: ExecutionId) {
        self.dispatched.lock().unwrap().push(execution_id);
    }
}

// ── Clock driven by tokio's (pausable) time ────────────────────────

pub struct TokioClock {
    base: Timestamp,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        let elapsed = chrono::TimeDelta::from_std(self.origin.elapsed()).unwrap();
        self.base + elapsed
    }
}

// ── Job runners ────────────────────────────────────────────────────

/// Plays back a fixed script of results, then keeps succeeding.
#[derive(Default)]
pub struct ScriptedRunner {
    script: Mutex<Vec<Result<JobOutcome, String>>>,
    calls: Mutex<Vec<JobId>>,
}

impl ScriptedRunner {
    pub fn failing(times: usize) -> Self {
        Self {
            script: Mutex::new((0..times).map(|i| Err(format!("failure #{}", i + 1))).collect()),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl JobRunner for ScriptedRunner {
    fn run(
        &self,
        job: RecurringJob,
        _now: Timestamp,
    ) -> impl Future<Output = Result<JobOutcome, LeadflowError>> + Send {
        self.calls.lock().unwrap().push(job.id);
        let mut script = self.script.lock().unwrap();
        let next = if script.is_empty() {
            Ok(JobOutcome {
                processed: 1,
                affected: 1,
                data: serde_json::json!({"ok": true}),
            })
        } else {
            script.remove(0)
        };
        async move { next.map_err(|message| storage_failure(&message)) }
    }
}

/// Blocks every run until released, to hold the reentrancy guard.
pub struct BlockingRunner {
    pub started: Arc<tokio::sync::Notify>,
    pub release: Arc<tokio::sync::Notify>,
    calls: Mutex<usize>,
}

impl Default for BlockingRunner {
    fn default() -> Self {
        Self {
            started: Arc::new(tokio::sync::Notify::new()),
            release: Arc::new(tokio::sync::Notify::new()),
            calls: Mutex::new(0),
        }
    }
}

impl BlockingRunner {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl JobRunner for BlockingRunner {
    fn run(
        &self,
        _job: RecurringJob,
        _now: Timestamp,
    ) -> impl Future<Output = Result<JobOutcome, LeadflowError>> + Send {
        *self.calls.lock().unwrap() += 1;
        let started = Arc::clone(&self.started);
        let release = Arc::clone(&self.release);
        async move {
            started.notify_one();
            release.notified().await;
            Ok(JobOutcome::default())
        }
    }
}

/// Panics on every run.
#[derive(Default)]
pub struct PanickingRunner {
    calls: Mutex<usize>,
}

impl PanickingRunner {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl JobRunner for PanickingRunner {
    fn run(
        &self,
        _job: RecurringJob,
        _now: Timestamp,
    ) -> impl Future<Output = Result<JobOutcome, LeadflowError>> + Send {
        *self.calls.lock().unwrap() += 1;
        async move {
            let outcome: Result<JobOutcome, LeadflowError> = Ok(JobOutcome::default());
            assert!(outcome.is_err(), "handler exploded");
            outcome
        }
    }
}
