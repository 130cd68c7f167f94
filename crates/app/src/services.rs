//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod job_service;
pub mod rule_service;

pub use job_service::JobService;
pub use rule_service::RuleService;
