//! WorkflowGateway: stateless JSON request/response boundary.
//!
//! Every request is answered with exactly one JSON object. Success carries
//! `success: true` plus the operation's fields; failure is always
//! `{success: false, error: <kind>, message}`. Nothing panics through here.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::WorkflowConfig;
use crate::diagnostics::{CaptureReceipt, DiagnosticAggregator};
use crate::errors::WorkflowError;
use crate::estimate::{CostEstimate, EstimateService, Notifier};
use crate::store::SqliteStore;

use super::requests::GatewayRequest;

pub struct WorkflowGateway {
    aggregator: Arc<DiagnosticAggregator>,
    estimates: EstimateService,
}

impl WorkflowGateway {
    pub fn new(aggregator: Arc<DiagnosticAggregator>, estimates: EstimateService) -> Self {
        Self {
            aggregator,
            estimates,
        }
    }

    /// Wire the full workflow over one SQLite store.
    pub fn with_store(
        store: Arc<SqliteStore>,
        notifier: Arc<dyn Notifier>,
        config: WorkflowConfig,
    ) -> Self {
        let aggregator = Arc::new(DiagnosticAggregator::new(store.clone(), config.retention()));
        let estimates = EstimateService::new(store, aggregator.clone(), notifier, config);
        Self::new(aggregator, estimates)
    }

    /// Handle one raw JSON line.
    pub fn handle_line(&self, line: &str) -> Value {
        match serde_json::from_str::<Value>(line) {
            Ok(request) => self.handle(request),
            Err(e) => failure(&WorkflowError::from(e)),
        }
    }

    /// Handle one parsed request.
    pub fn handle(&self, request: Value) -> Value {
        let request: GatewayRequest = match serde_json::from_value(request) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "rejected malformed request");
                return failure(&WorkflowError::validation("request", e.to_string()));
            }
        };

        let operation = request.operation();
        tracing::debug!(operation, "handling request");

        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(operation, kind = e.kind(), error = %e, "request failed");
                failure(&e)
            }
        }
    }

    fn dispatch(&self, request: GatewayRequest) -> Result<Value, WorkflowError> {
        match request {
            // ─── Capture ────────────────────────────────────────────────
            GatewayRequest::CaptureDiagnosticFindings {
                conversation_id,
                vehicle_info,
                diagnostic_findings,
            } => self
                .aggregator
                .capture_findings(&conversation_id, &vehicle_info, &diagnostic_findings)
                .map(captured),
            GatewayRequest::CaptureRepairRecommendations {
                conversation_id,
                repair_recommendations,
            } => self
                .aggregator
                .capture_recommendations(&conversation_id, &repair_recommendations)
                .map(captured),
            GatewayRequest::CapturePartsInformation {
                conversation_id,
                parts_information,
            } => self
                .aggregator
                .capture_parts_information(&conversation_id, &parts_information)
                .map(captured),
            GatewayRequest::CaptureLaborEstimates {
                conversation_id,
                labor_estimates,
            } => self
                .aggregator
                .capture_labor_estimates(&conversation_id, &labor_estimates)
                .map(captured),

            // ─── Reads ──────────────────────────────────────────────────
            GatewayRequest::GetConversationData { conversation_id } => {
                let bundle = self.aggregator.get_conversation_bundle(&conversation_id)?;
                Ok(json!({
                    "success": true,
                    "total_entries": bundle.total_records,
                    "data": bundle,
                }))
            }
            GatewayRequest::GetEstimate { estimate_id } => {
                let estimate = self.estimates.get_estimate(&estimate_id)?;
                Ok(json!({ "success": true, "estimate": estimate }))
            }
            GatewayRequest::ListEstimates { conversation_id } => {
                let estimates = self.estimates.list_estimates(&conversation_id)?;
                Ok(json!({ "success": true, "estimates": estimates }))
            }

            // ─── Estimates ──────────────────────────────────────────────
            GatewayRequest::CreateEstimate {
                conversation_id,
                selected_option,
            } => {
                let estimate = self
                    .estimates
                    .create_estimate(&conversation_id, selected_option)?;
                Ok(json!({ "success": true, "estimate": estimate }))
            }
            GatewayRequest::ShareEstimate {
                estimate_id,
                expected_status,
            } => self
                .estimates
                .share_estimate(&estimate_id, expected_status)
                .map(transitioned),
            GatewayRequest::ModifyEstimate {
                estimate_id,
                expected_status,
                edits,
                mechanic_notes,
            } => self
                .estimates
                .modify_estimate(&estimate_id, expected_status, &edits, mechanic_notes)
                .map(transitioned),
            GatewayRequest::ReviewEstimate {
                estimate_id,
                expected_status,
                decision,
                notes,
            } => self
                .estimates
                .review_estimate(&estimate_id, expected_status, decision, notes)
                .map(transitioned),
            GatewayRequest::RespondToEstimate {
                estimate_id,
                expected_status,
                decision,
                notes,
            } => self
                .estimates
                .respond_to_estimate(&estimate_id, expected_status, decision, notes)
                .map(transitioned),
        }
    }
}

// ─── Response Shapes ────────────────────────────────────────────────────────

fn captured(receipt: CaptureReceipt) -> Value {
    json!({
        "success": true,
        "dataId": receipt.record_id,
        "kind": receipt.kind,
        "expiresAt": receipt.expires_at,
    })
}

fn transitioned(estimate: CostEstimate) -> Value {
    json!({
        "success": true,
        "status": estimate.status,
        "estimate": estimate,
    })
}

fn failure(error: &WorkflowError) -> Value {
    json!({
        "success": false,
        "error": error.kind(),
        "message": error.to_string(),
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
