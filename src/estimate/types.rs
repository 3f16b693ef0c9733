//! CostEstimate and the vocabulary of its approval workflow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::diagnostics::types::VehicleInfo;
use crate::quote::{Breakdown, QuoteInputs};

// ─── Status ─────────────────────────────────────────────────────────────────

/// Lifecycle status of a CostEstimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    /// Compiled from a conversation, not yet shared.
    Draft,
    /// Customer shared it; waiting on the mechanic.
    SharedPendingMechanicApproval,
    /// Mechanic edited it; waiting on the customer.
    PendingCustomerApproval,
    Approved,
    Rejected,
}

impl EstimateStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::SharedPendingMechanicApproval => "shared_pending_mechanic_approval",
            EstimateStatus::PendingCustomerApproval => "pending_customer_approval",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
        }
    }

    /// Parse from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EstimateStatus::Draft),
            "shared_pending_mechanic_approval" => Some(EstimateStatus::SharedPendingMechanicApproval),
            "pending_customer_approval" => Some(EstimateStatus::PendingCustomerApproval),
            "approved" => Some(EstimateStatus::Approved),
            "rejected" => Some(EstimateStatus::Rejected),
            _ => None,
        }
    }

    /// No transitions leave a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EstimateStatus::Approved | EstimateStatus::Rejected)
    }
}

impl std::fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// The two parties acting on an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Customer,
    Mechanic,
}

/// Something an actor does to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateEvent {
    ShareWithMechanic,
    MechanicApprove,
    MechanicModify,
    MechanicDecline,
    CustomerApprove,
    CustomerReject,
}

impl EstimateEvent {
    /// Which party performs this event.
    pub fn actor(&self) -> Party {
        match self {
            EstimateEvent::ShareWithMechanic
            | EstimateEvent::CustomerApprove
            | EstimateEvent::CustomerReject => Party::Customer,
            EstimateEvent::MechanicApprove
            | EstimateEvent::MechanicModify
            | EstimateEvent::MechanicDecline => Party::Mechanic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateEvent::ShareWithMechanic => "share_with_mechanic",
            EstimateEvent::MechanicApprove => "mechanic_approve",
            EstimateEvent::MechanicModify => "mechanic_modify",
            EstimateEvent::MechanicDecline => "mechanic_decline",
            EstimateEvent::CustomerApprove => "customer_approve",
            EstimateEvent::CustomerReject => "customer_reject",
        }
    }
}

impl std::fmt::Display for EstimateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Estimate ───────────────────────────────────────────────────────────────

/// Frozen copy of the priced part of an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateSnapshot {
    pub breakdown: Breakdown,
    pub inputs: QuoteInputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    pub taken_at: DateTime<Utc>,
}

/// The synthesized, mutable workflow object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub estimate_id: String,
    pub conversation_id: String,
    pub vehicle_info: VehicleInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    pub breakdown: Breakdown,
    pub inputs: QuoteInputs,
    pub status: EstimateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Decimal>,
    pub valid_until: DateTime<Utc>,
    pub is_modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_estimate: Option<EstimateSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_estimate: Option<EstimateSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanic_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by the store on every persisted transition.
    pub version: u32,
}

impl CostEstimate {
    /// Snapshot the current priced state.
    pub fn snapshot(&self, at: DateTime<Utc>) -> EstimateSnapshot {
        EstimateSnapshot {
            breakdown: self.breakdown.clone(),
            inputs: self.inputs.clone(),
            selected_option: self.selected_option.clone(),
            taken_at: at,
        }
    }
}
