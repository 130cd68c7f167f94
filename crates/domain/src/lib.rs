//! # leadflow-domain
//!
//! Pure domain model for the leadflow automation backend.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Automation rules** (trigger → condition → action) and their
//!   **executions** with a monotonic status machine
//! - Define **Recurring jobs**, their cron schedules, run statistics and
//!   circuit-breaker bookkeeping
//! - Define **Leads**, the subjects rules and jobs act upon
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod job;
pub mod lead;
