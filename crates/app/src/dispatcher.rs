//! Execution dispatcher — fire-and-forget hand-off of executions to workers.
//!
//! Trigger evaluation never waits for actions to run. Every dispatched
//! execution is spawned on a tracked [`JoinSet`] so that shutdown and tests
//! can wait for in-flight work, and every failure (an error returned by the
//! runner or a panic inside it) is routed to an error sink supplied at
//! construction.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{ExecutionId, TenantId};
use tokio::task::{JoinError, JoinSet};

use crate::action_executor::RunOutcome;

/// Something that can run one automation execution to completion.
pub trait ExecutionRunner: Send + Sync + 'static {
    fn run(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
    ) -> impl Future<Output = Result<RunOutcome, LeadflowError>> + Send;

    /// Close an execution whose run died without recording an outcome.
    /// Returns whether a `running` record was moved to `failed`.
    fn abandon(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
        reason: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send;
}

/// Human-readable cause of a task that did not return.
pub(crate) fn panic_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("cancelled: {err}");
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("panicked: {message}")
}

/// Accepts executions for asynchronous processing.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, tenant_id: TenantId, execution_id: ExecutionId);
}

impl<T: Dispatch + ?Sized> Dispatch for Arc<T> {
    fn dispatch(&self, tenant_id: TenantId, execution_id: ExecutionId) {
        (**self).dispatch(tenant_id, execution_id);
    }
}

/// A dispatched execution that did not finish cleanly.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub tenant_id: TenantId,
    pub execution_id: ExecutionId,
    pub reason: String,
}

/// Receives every [`DispatchFailure`].
pub type ErrorSink = Arc<dyn Fn(DispatchFailure) + Send + Sync>;

/// Spawns executions on the tokio runtime and tracks them until completion.
pub struct ExecutionDispatcher<X> {
    runner: Arc<X>,
    tasks: Mutex<JoinSet<()>>,
    on_error: ErrorSink,
}

impl<X: ExecutionRunner> ExecutionDispatcher<X> {
    /// Create a dispatcher around `runner`. `on_error` is mandatory so that
    /// no failure of a detached task goes unobserved.
    pub fn new(runner: Arc<X>, on_error: ErrorSink) -> Self {
        Self {
            runner,
            tasks: Mutex::new(JoinSet::new()),
            on_error,
        }
    }

    /// Number of dispatched executions not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait until every dispatched execution, including ones dispatched while
    /// waiting, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut batch = std::mem::take(
                &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if batch.is_empty() {
                return;
            }
            while batch.join_next().await.is_some() {}
        }
    }
}

impl<X: ExecutionRunner> Dispatch for ExecutionDispatcher<X> {
    fn dispatch(&self, tenant_id: TenantId, execution_id: ExecutionId) {
        let runner = Arc::clone(&self.runner);
        let on_error = Arc::clone(&self.on_error);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let worker_runner = Arc::clone(&runner);
            let worker =
                tokio::spawn(async move { worker_runner.run(tenant_id, execution_id).await });
            let reason = match worker.await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(%tenant_id, %execution_id, ?outcome, "execution finished");
                    return;
                }
                Ok(Err(err)) => err.to_string(),
                Err(join) => {
                    let reason = format!("execution {}", panic_reason(join));
                    if let Err(err) = runner.abandon(tenant_id, execution_id, reason.clone()).await {
                        tracing::warn!(%tenant_id, %execution_id, error = %err, "could not close abandoned execution");
                    }
                    reason
                }
            };
            on_error(DispatchFailure {
                tenant_id,
                execution_id,
                reason,
            });
        });
    }
}
