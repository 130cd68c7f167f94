//! # leadflowd — leadflow daemon
//!
//! Composition root that wires the storage adapter into the application
//! layer and keeps the automation machinery running.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Install the `tracing` subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct the executor, dispatcher, engine and scheduler, injecting
//!   repositories via port traits
//! - Arm every active recurring job and poll for delayed executions
//! - Handle graceful shutdown (SIGINT): stop timers, drain in-flight work
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use leadflow_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteExecutionStore, SqliteJobRepository, SqliteLeadRepository,
    SqliteRuleRepository,
};
use leadflow_app::action_executor::ActionExecutor;
use leadflow_app::automation_engine::AutomationEngine;
use leadflow_app::dispatcher::{DispatchFailure, ErrorSink, ExecutionDispatcher};
use leadflow_app::job_handlers::JobHandlerRegistry;
use leadflow_app::poller::spawn_due_poller;
use leadflow_app::ports::{Notifier, SystemClock};
use leadflow_app::scheduler::{ExecutionScheduler, SchedulerOptions, SchedulerState};
use leadflow_domain::error::NotifyError;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Delivers notifications to the log. Stands in for mail or chat delivery.
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "leadflow::notify", %recipient, %message, "notification");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|err| {
            eprintln!("invalid log filter {:?}: {err}", config.logging.filter);
            EnvFilter::new("info")
        }))
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Repositories
    let rules = Arc::new(SqliteRuleRepository::new(pool.clone()));
    let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
    let executions = Arc::new(SqliteExecutionStore::new(pool.clone()));
    let leads = Arc::new(SqliteLeadRepository::new(pool));
    let notifier = Arc::new(LogNotifier);

    // Automation rules
    let executor = Arc::new(ActionExecutor::new(
        Arc::clone(&rules),
        Arc::clone(&leads),
        Arc::clone(&executions),
        Arc::clone(&notifier),
        SystemClock,
    ));
    let on_error: ErrorSink = Arc::new(|failure: DispatchFailure| {
        tracing::error!(
            tenant_id = %failure.tenant_id,
            execution_id = %failure.execution_id,
            reason = %failure.reason,
            "automation execution failed"
        );
    });
    let dispatcher = Arc::new(ExecutionDispatcher::new(executor, on_error));
    let engine = Arc::new(AutomationEngine::new(
        rules,
        Arc::clone(&executions),
        SystemClock,
        Arc::clone(&dispatcher),
    ));

    // Recurring jobs
    let handlers = JobHandlerRegistry::new(leads, Arc::clone(&executions), notifier, SystemClock);
    let scheduler = Arc::new(ExecutionScheduler::new(
        jobs,
        executions,
        handlers,
        SystemClock,
        SchedulerState::new(),
        SchedulerOptions {
            enforce_timeouts: config.scheduler.enforce_timeouts,
        },
    ));
    let armed = scheduler
        .schedule_all()
        .await
        .context("failed to arm recurring jobs")?;

    // The first tick fires immediately and catches up on executions that
    // came due while the daemon was down.
    let poller = spawn_due_poller(
        Arc::clone(&engine),
        config.poll_interval(),
        config.scheduler.due_batch_size,
    );
    tracing::info!(armed, database = %config.database.url, "leadflowd running");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    poller.abort();
    let disarmed = scheduler.stop_all();
    scheduler.wait_idle().await;
    dispatcher.wait_idle().await;
    tracing::info!(disarmed, "leadflowd stopped");

    Ok(())
}
