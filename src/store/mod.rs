//! Record Store: durable persistence for diagnostic records and estimates.
//!
//! Submodules:
//! - `database`: SQLite implementation of both repository traits
//!
//! All mutation goes through these traits. Records are append-only and carry
//! an expiry that is applied as a read filter; estimates change only through
//! a single-row compare-and-swap.

pub mod database;

use chrono::{DateTime, Utc};

use crate::diagnostics::types::DiagnosticRecord;
use crate::errors::WorkflowError;
use crate::estimate::types::{CostEstimate, EstimateStatus};

pub use database::SqliteStore;

/// Append-only storage for diagnostic records.
pub trait RecordStore: Send + Sync {
    /// Append a record. Re-putting the same `record_id` is a no-op.
    fn put(&self, record: &DiagnosticRecord) -> Result<(), WorkflowError>;

    /// All records for a conversation with `expires_at > now`, in insertion order.
    fn query_by_conversation(
        &self,
        conversation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiagnosticRecord>, WorkflowError>;

    /// Physically remove expired records. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError>;
}

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The write landed.
    Applied,
    /// Nothing was written. `actual` is the status found afterwards
    /// (`None` if the estimate no longer exists).
    Conflict { actual: Option<EstimateStatus> },
}

/// Storage for cost estimates.
pub trait EstimateRepository: Send + Sync {
    fn insert_estimate(&self, estimate: &CostEstimate) -> Result<(), WorkflowError>;

    fn get_estimate(&self, estimate_id: &str) -> Result<Option<CostEstimate>, WorkflowError>;

    /// Estimates for a conversation, oldest first.
    fn list_estimates(&self, conversation_id: &str) -> Result<Vec<CostEstimate>, WorkflowError>;

    /// Replace the stored estimate only if its status is still `expected_status`
    /// and its version is still `expected_version`.
    fn compare_and_swap(
        &self,
        updated: &CostEstimate,
        expected_status: EstimateStatus,
        expected_version: u32,
    ) -> Result<CasOutcome, WorkflowError>;
}
