//! Due-execution poller — periodically dispatches delayed executions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::automation_engine::AutomationEngine;
use crate::dispatcher::Dispatch;
use crate::ports::{Clock, ExecutionStore, RuleRepository};

/// Spawn a task calling [`AutomationEngine::dispatch_due`] every `every`,
/// handing at most `batch` executions to the dispatcher per tick.
///
/// The task runs until aborted through the returned handle.
pub fn spawn_due_poller<R, E, C, D>(
    engine: Arc<AutomationEngine<R, E, C, D>>,
    every: Duration,
    batch: u32,
) -> JoinHandle<()>
where
    R: RuleRepository + Send + Sync + 'static,
    E: ExecutionStore + Send + Sync + 'static,
    C: Clock + 'static,
    D: Dispatch + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = engine.dispatch_due(batch).await {
                tracing::warn!(error = %err, "due execution poll failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeDelta;
    use leadflow_domain::automation::{Action, AutomationRule, TriggerEvent, TriggerType};
    use leadflow_domain::time;

    use crate::ports::ManualClock;
    use crate::testing::{InMemoryExecutions, InMemoryRules, RecordingDispatch};

    #[tokio::test(start_paused = true)]
    async fn should_dispatch_delayed_execution_once_due() {
        let rule = AutomationRule::builder()
            .name("Later")
            .trigger(TriggerType::Manual)
            .delay_secs(60)
            .action(Action::AddTag {
                tag: "later".to_string(),
            })
            .build()
            .unwrap();
        let clock = Arc::new(ManualClock::new(time::now()));
        let executions = Arc::new(InMemoryExecutions::default());
        let event = TriggerEvent::new(
            rule.tenant_id,
            TriggerType::Manual,
            None,
            serde_json::json!({}),
        );
        let execution = rule.schedule(&event, clock.now());
        executions.insert(execution.clone());

        let dispatch = Arc::new(RecordingDispatch::default());
        let engine = Arc::new(AutomationEngine::new(
            Arc::new(InMemoryRules::with(vec![rule])),
            Arc::clone(&executions),
            Arc::clone(&clock),
            Arc::clone(&dispatch),
        ));
        let poller = spawn_due_poller(engine, Duration::from_secs(5), 10);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(dispatch.dispatched().is_empty());

        clock.advance(TimeDelta::seconds(60));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(dispatch.dispatched(), vec![execution.id]);

        poller.abort();
    }
}
