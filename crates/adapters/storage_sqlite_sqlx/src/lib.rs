//! # leadflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `leadflow-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Every query is scoped by tenant, except the scheduler-wide lookups
//! (`find_due_automations`, `find_all_active`). State changes that must not
//! race (claiming an execution, counting a job failure) are single
//! conditional `UPDATE` statements.
//!
//! ## Dependency rule
//! Depends on `leadflow-app` (for port traits) and `leadflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod execution_store;
pub mod job_repo;
pub mod lead_repo;
pub mod pool;
pub mod rule_repo;
mod row;

pub use execution_store::SqliteExecutionStore;
pub use job_repo::SqliteJobRepository;
pub use lead_repo::SqliteLeadRepository;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
