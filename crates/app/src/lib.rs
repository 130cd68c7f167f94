//! # leadflow-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RuleRepository` — CRUD and counters for automation rules
//!   - `JobRepository` — CRUD and run statistics for recurring jobs
//!   - `ExecutionStore` — audit trail of rule and job runs
//!   - `LeadRepository` — the leads that actions and jobs mutate
//!   - `Notifier`, `Clock` — outbound messages and the current time
//! - Define **driving/inbound ports** as use-case structs:
//!   - `AutomationEngine` — match trigger events against rules
//!   - `ActionExecutor` — run the actions of one execution
//!   - `ExecutionScheduler` — cron timers and guarded job runs
//!   - `RuleService`, `JobService` — tenant-scoped management
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `leadflow-domain` only (plus `tokio` for tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod action_executor;
pub mod automation_engine;
pub mod dispatcher;
pub mod job_handlers;
pub mod poller;
pub mod ports;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod testing;
