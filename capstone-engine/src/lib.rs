//! Capstone Engine - Topic Workflows and Council Scheduling
//!
//! Implements the thesis topic workflow on top of any [`StorageTrait`]
//! backend:
//!
//! - [`MembershipRegistry`]: topic creation, joining, leaving, edit rights
//! - [`ApprovalLedger`]: multi-approver consensus and the head-of-department path
//! - [`CouncilScheduler`]: conflict-free four-lecturer defense councils
//! - [`ProgressReviewWorkflow`]: WEEK_4/8/12 review councils and grading
//!
//! [`CapstoneEngine`] bundles them behind one facade. Every mutating call
//! runs as a single scoped transaction and is retried on commit conflicts.
//!
//! [`StorageTrait`]: capstone_storage::StorageTrait

mod approval;
mod engine;
mod membership;
mod progress_review;
mod scheduler;
pub mod telemetry;

pub use approval::{ApprovalLedger, ApprovalOutcome};
pub use engine::CapstoneEngine;
pub use membership::MembershipRegistry;
pub use progress_review::ProgressReviewWorkflow;
pub use scheduler::CouncilScheduler;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
