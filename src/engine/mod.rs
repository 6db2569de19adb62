// Sync Engine
// Batch processing, retries, the failed-operation queue and reconciliation

//! # Sync Engine Module
//!
//! The engine sits between the upstream clients and the outside world (HTTP
//! handlers, the cron job, the admin CLI). None of it knows about HTTP; it only
//! talks to the [`SourceSystem`](crate::SourceSystem) and
//! [`TargetSystem`](crate::TargetSystem) traits.
//!
//! ## Engine Components
//!
//! ### Batch Processor (`batch` module)
//! - Splits ID lists into batches and runs the per-item pipeline
//! - Preserves input order in the result list
//! - Owns the failed-operation queue of each job and drains it at the end
//!
//! ### Retry (`retry` module)
//! - Counted, sequential retry loops with fixed or exponential delays
//!
//! ### Pacing (`pacing` module)
//! - The injectable sleep used for every deliberate delay
//!
//! ### Enrichment (`enrich` module)
//! - Resolves the deal and account referenced by a shipment's customer
//!
//! ### Reconciliation (`reconcile`, `scheduler` modules)
//! - Daily create-vs-update pass and its cron trigger

pub mod batch;
pub mod enrich;
pub mod pacing;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{ShipmentSync, SyncReport};
pub use enrich::{Enrichment, EnrichmentResolver};
pub use pacing::{NoopSleeper, Pacer, Sleeper, TokioSleeper};
pub use queue::FailedOperationQueue;
pub use reconcile::{ReconcileReport, ReconcileState, ReconcileStatus, Reconciler};
pub use retry::RetryPolicy;
pub use scheduler::build_scheduler;
