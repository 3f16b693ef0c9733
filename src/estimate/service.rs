//! EstimateService: creates estimates and drives them through approval.
//!
//! Every transition runs the same pipeline:
//! 1. request validation
//! 2. load (`NotFound`)
//! 3. expected-status check (`StateConflict`)
//! 4. terminal / table lookup (`TerminalState`, `InvalidTransition`)
//! 5. compare-and-swap write (a lost race is `StateConflict`)
//! 6. notify the other party; failures are logged only

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::WorkflowConfig;
use crate::diagnostics::{ConversationBundle, DiagnosticAggregator, VehicleInfo};
use crate::errors::WorkflowError;
use crate::quote::{compute_breakdown, LaborInput, QuoteInputs};
use crate::store::{CasOutcome, EstimateRepository};

use super::edits::{labor_lines, part_lines, EstimateEdits};
use super::notify::{NotificationEvent, Notifier};
use super::state_machine::{ensure_expected, notification_for, transition};
use super::types::{CostEstimate, EstimateEvent, EstimateStatus};

/// The mechanic's answer to a shared estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanicDecision {
    Approve,
    Decline,
}

/// The customer's answer to a modified estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerDecision {
    Approve,
    Reject,
}

pub struct EstimateService {
    estimates: Arc<dyn EstimateRepository>,
    aggregator: Arc<DiagnosticAggregator>,
    notifier: Arc<dyn Notifier>,
    config: WorkflowConfig,
}

impl EstimateService {
    pub fn new(
        estimates: Arc<dyn EstimateRepository>,
        aggregator: Arc<DiagnosticAggregator>,
        notifier: Arc<dyn Notifier>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            estimates,
            aggregator,
            notifier,
            config,
        }
    }

    // ─── Creation & Reads ───────────────────────────────────────────────

    /// Compile a draft estimate from the conversation's live records.
    ///
    /// The most recent record of each kind wins. Without an explicit
    /// `selected_option` the first recommendation's name is used.
    pub fn create_estimate(
        &self,
        conversation_id: &str,
        selected_option: Option<String>,
    ) -> Result<CostEstimate, WorkflowError> {
        let bundle = self.aggregator.get_conversation_bundle(conversation_id)?;
        if bundle.is_empty() {
            return Err(WorkflowError::NotFound {
                entity: "conversation data",
                id: conversation_id.to_string(),
            });
        }

        let now = Utc::now();
        let (inputs, vehicle_info, confidence, suggested) = self.project(&bundle);
        let breakdown = compute_breakdown(&inputs)?;
        let valid_until = now
            .checked_add_signed(self.config.estimate_validity())
            .ok_or_else(|| WorkflowError::validation("estimateValidityDays", "out of range"))?;

        let estimate = CostEstimate {
            estimate_id: uuid::Uuid::now_v7().to_string(),
            conversation_id: conversation_id.to_string(),
            vehicle_info,
            selected_option: selected_option
                .filter(|s| !s.trim().is_empty())
                .or(suggested),
            breakdown,
            inputs,
            status: EstimateStatus::Draft,
            confidence,
            valid_until,
            is_modified: false,
            original_estimate: None,
            modified_estimate: None,
            mechanic_notes: None,
            customer_notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.estimates.insert_estimate(&estimate)?;

        tracing::info!(
            estimate_id = %estimate.estimate_id,
            conversation_id,
            total = %estimate.breakdown.total,
            "created draft estimate"
        );
        Ok(estimate)
    }

    pub fn get_estimate(&self, estimate_id: &str) -> Result<CostEstimate, WorkflowError> {
        self.load(estimate_id)
    }

    pub fn list_estimates(&self, conversation_id: &str) -> Result<Vec<CostEstimate>, WorkflowError> {
        require_text("conversationId", conversation_id)?;
        self.estimates.list_estimates(conversation_id)
    }

    /// Turn a bundle into calculator inputs plus descriptive fields.
    fn project(
        &self,
        bundle: &ConversationBundle,
    ) -> (QuoteInputs, VehicleInfo, Option<Decimal>, Option<String>) {
        let findings = bundle.findings.last().map(|c| &c.payload);
        let vehicle_info = findings
            .map(|f| f.vehicle_info.clone())
            .unwrap_or_default();
        let confidence = findings.and_then(|f| f.findings.confidence);

        let labor = bundle
            .labor
            .last()
            .map(|c| labor_lines(&c.payload, self.config.default_labor_rate))
            .unwrap_or_default();
        let parts = bundle
            .parts
            .last()
            .map(|c| part_lines(&c.payload))
            .unwrap_or_default();
        let suggested = bundle
            .recommendations
            .last()
            .and_then(|c| c.payload.first())
            .map(|r| r.repair_name.clone());

        let inputs = QuoteInputs {
            labor: LaborInput::Itemized(labor),
            parts,
            shop_fees: self.config.shop_fees,
            tax_rate: self.config.tax_rate,
            tax_override: None,
        };
        (inputs, vehicle_info, confidence, suggested)
    }

    // ─── Transitions ────────────────────────────────────────────────────

    /// Customer hands the draft to the mechanic.
    pub fn share_estimate(
        &self,
        estimate_id: &str,
        expected: EstimateStatus,
    ) -> Result<CostEstimate, WorkflowError> {
        self.apply(estimate_id, expected, EstimateEvent::ShareWithMechanic, |est, now| {
            if est.original_estimate.is_none() {
                est.original_estimate = Some(est.snapshot(now));
            }
            Ok(())
        })
    }

    /// Mechanic edits the estimate and sends it back to the customer.
    pub fn modify_estimate(
        &self,
        estimate_id: &str,
        expected: EstimateStatus,
        edits: &EstimateEdits,
        mechanic_notes: Option<String>,
    ) -> Result<CostEstimate, WorkflowError> {
        edits.validate()?;
        let notes = non_blank(mechanic_notes);
        let default_rate = self.config.default_labor_rate;

        self.apply(estimate_id, expected, EstimateEvent::MechanicModify, |est, now| {
            if est.original_estimate.is_none() {
                est.original_estimate = Some(est.snapshot(now));
            }
            let inputs = edits.apply(&est.inputs, default_rate)?;
            est.breakdown = compute_breakdown(&inputs)?;
            est.inputs = inputs;
            if let Some(option) = non_blank(edits.selected_option.clone()) {
                est.selected_option = Some(option);
            }
            est.is_modified = true;
            est.modified_estimate = Some(est.snapshot(now));
            if notes.is_some() {
                est.mechanic_notes = notes;
            }
            Ok(())
        })
    }

    /// Mechanic approves as-is or declines with notes.
    pub fn review_estimate(
        &self,
        estimate_id: &str,
        expected: EstimateStatus,
        decision: MechanicDecision,
        notes: Option<String>,
    ) -> Result<CostEstimate, WorkflowError> {
        let notes = non_blank(notes);
        let event = match decision {
            MechanicDecision::Approve => EstimateEvent::MechanicApprove,
            MechanicDecision::Decline => {
                if notes.is_none() {
                    return Err(WorkflowError::validation(
                        "notes",
                        "a reason is required to decline",
                    ));
                }
                EstimateEvent::MechanicDecline
            }
        };

        self.apply(estimate_id, expected, event, |est, _| {
            if notes.is_some() {
                est.mechanic_notes = notes;
            }
            Ok(())
        })
    }

    /// Customer approves the modified estimate or returns it with notes.
    pub fn respond_to_estimate(
        &self,
        estimate_id: &str,
        expected: EstimateStatus,
        decision: CustomerDecision,
        notes: Option<String>,
    ) -> Result<CostEstimate, WorkflowError> {
        let notes = non_blank(notes);
        let event = match decision {
            CustomerDecision::Approve => EstimateEvent::CustomerApprove,
            CustomerDecision::Reject => {
                if notes.is_none() {
                    return Err(WorkflowError::validation(
                        "notes",
                        "a reason is required to reject",
                    ));
                }
                EstimateEvent::CustomerReject
            }
        };

        self.apply(estimate_id, expected, event, |est, _| {
            if notes.is_some() {
                est.customer_notes = notes;
            }
            Ok(())
        })
    }

    fn apply<F>(
        &self,
        estimate_id: &str,
        expected: EstimateStatus,
        event: EstimateEvent,
        mutate: F,
    ) -> Result<CostEstimate, WorkflowError>
    where
        F: FnOnce(&mut CostEstimate, DateTime<Utc>) -> Result<(), WorkflowError>,
    {
        let current = self.load(estimate_id)?;
        ensure_expected(estimate_id, expected, current.status)?;
        let next = transition(estimate_id, current.status, event)?;

        let now = Utc::now();
        let mut updated = current.clone();
        mutate(&mut updated, now)?;
        updated.status = next;
        updated.updated_at = now;
        updated.version = current.version + 1;

        match self
            .estimates
            .compare_and_swap(&updated, current.status, current.version)?
        {
            CasOutcome::Applied => {}
            CasOutcome::Conflict { actual: Some(actual) } => {
                tracing::warn!(estimate_id, %event, %actual, "lost compare-and-swap race");
                return Err(WorkflowError::StateConflict {
                    estimate_id: estimate_id.to_string(),
                    expected,
                    actual,
                });
            }
            CasOutcome::Conflict { actual: None } => {
                return Err(WorkflowError::NotFound {
                    entity: "estimate",
                    id: estimate_id.to_string(),
                });
            }
        }

        tracing::info!(
            estimate_id,
            conversation_id = %updated.conversation_id,
            %event,
            from = %current.status,
            to = %next,
            version = updated.version,
            "estimate transitioned"
        );

        let (recipient, kind) = notification_for(event);
        let notification = NotificationEvent::for_estimate(&updated, recipient, kind);
        if let Err(e) = self.notifier.notify(&notification) {
            tracing::warn!(estimate_id, error = %e, "failed to emit estimate notification");
        }

        Ok(updated)
    }

    fn load(&self, estimate_id: &str) -> Result<CostEstimate, WorkflowError> {
        require_text("estimateId", estimate_id)?;
        self.estimates
            .get_estimate(estimate_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "estimate",
                id: estimate_id.to_string(),
            })
    }
}

fn non_blank(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn require_text(field: &str, value: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::validation(field, "must not be blank"));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
