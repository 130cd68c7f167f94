//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Every method that touches tenant data takes a [`TenantId`] and must filter
//! on it; there is no port method that reads another tenant's records by id.
//!
//! [`TenantId`]: leadflow_domain::id::TenantId

pub mod clock;
pub mod execution_store;
pub mod job_repo;
pub mod lead_repo;
pub mod notifier;
pub mod rule_repo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use execution_store::{ExecutionStats, ExecutionStore, PurgeReport};
pub use job_repo::JobRepository;
pub use lead_repo::LeadRepository;
pub use notifier::Notifier;
pub use rule_repo::RuleRepository;
