//! Diagnostic Aggregator: captures what the reasoning agent finds.
//!
//! Submodules:
//! - `aggregator`: Append-only capture and bundle assembly
//! - `money`: Exact decimal parsing for prices, rates, and hours
//! - `types`: Record kinds, typed payloads, bundles

pub mod aggregator;
pub mod money;
pub mod types;

pub use aggregator::{DiagnosticAggregator, RetentionPolicy};
pub use types::{
    CaptureReceipt, Captured, ConversationBundle, DiagnosticFindings, DiagnosticRecord,
    FindingsCapture, LaborItem, PartInfo, RecordKind, RecordPayload, RepairRecommendation,
    Severity, VehicleInfo,
};
