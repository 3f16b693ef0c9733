//! Request shapes accepted by the gateway, tagged by `operation`.

use serde::Deserialize;
use serde_json::Value;

use crate::estimate::{CustomerDecision, EstimateEdits, EstimateStatus, MechanicDecision};

/// One named operation with its arguments.
///
/// Capture payloads stay as raw JSON here; the aggregator validates them so
/// field errors carry the record path (e.g. `partsInformation[2]`).
#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GatewayRequest {
    #[serde(rename_all = "camelCase")]
    CaptureDiagnosticFindings {
        conversation_id: String,
        vehicle_info: Value,
        diagnostic_findings: Value,
    },
    #[serde(rename_all = "camelCase")]
    CaptureRepairRecommendations {
        conversation_id: String,
        repair_recommendations: Value,
    },
    #[serde(rename_all = "camelCase")]
    CapturePartsInformation {
        conversation_id: String,
        parts_information: Value,
    },
    #[serde(rename_all = "camelCase")]
    CaptureLaborEstimates {
        conversation_id: String,
        labor_estimates: Value,
    },
    #[serde(rename_all = "camelCase")]
    GetConversationData { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    CreateEstimate {
        conversation_id: String,
        #[serde(default)]
        selected_option: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GetEstimate { estimate_id: String },
    #[serde(rename_all = "camelCase")]
    ListEstimates { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    ShareEstimate {
        estimate_id: String,
        expected_status: EstimateStatus,
    },
    #[serde(rename_all = "camelCase")]
    ModifyEstimate {
        estimate_id: String,
        expected_status: EstimateStatus,
        edits: EstimateEdits,
        #[serde(default)]
        mechanic_notes: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ReviewEstimate {
        estimate_id: String,
        expected_status: EstimateStatus,
        decision: MechanicDecision,
        #[serde(default)]
        notes: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RespondToEstimate {
        estimate_id: String,
        expected_status: EstimateStatus,
        decision: CustomerDecision,
        #[serde(default)]
        notes: Option<String>,
    },
}

impl GatewayRequest {
    /// Wire name of the operation, for logging.
    pub fn operation(&self) -> &'static str {
        match self {
            GatewayRequest::CaptureDiagnosticFindings { .. } => "capture_diagnostic_findings",
            GatewayRequest::CaptureRepairRecommendations { .. } => "capture_repair_recommendations",
            GatewayRequest::CapturePartsInformation { .. } => "capture_parts_information",
            GatewayRequest::CaptureLaborEstimates { .. } => "capture_labor_estimates",
            GatewayRequest::GetConversationData { .. } => "get_conversation_data",
            GatewayRequest::CreateEstimate { .. } => "create_estimate",
            GatewayRequest::GetEstimate { .. } => "get_estimate",
            GatewayRequest::ListEstimates { .. } => "list_estimates",
            GatewayRequest::ShareEstimate { .. } => "share_estimate",
            GatewayRequest::ModifyEstimate { .. } => "modify_estimate",
            GatewayRequest::ReviewEstimate { .. } => "review_estimate",
            GatewayRequest::RespondToEstimate { .. } => "respond_to_estimate",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_capture() {
        let req: GatewayRequest = serde_json::from_value(json!({
            "operation": "capture_parts_information",
            "conversationId": "CONV-1",
            "partsInformation": [{"part_name": "Front Brake Pads", "estimated_price": 45.99}]
        }))
        .unwrap();
        assert_eq!(req.operation(), "capture_parts_information");
        match req {
            GatewayRequest::CapturePartsInformation {
                conversation_id,
                parts_information,
            } => {
                assert_eq!(conversation_id, "CONV-1");
                assert!(parts_information.is_array());
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_parse_modify_with_edits() {
        let req: GatewayRequest = serde_json::from_value(json!({
            "operation": "modify_estimate",
            "estimateId": "e1",
            "expectedStatus": "shared_pending_mechanic_approval",
            "edits": {"laborHours": "2.0"}
        }))
        .unwrap();
        match req {
            GatewayRequest::ModifyEstimate {
                expected_status,
                edits,
                mechanic_notes,
                ..
            } => {
                assert_eq!(expected_status, EstimateStatus::SharedPendingMechanicApproval);
                assert!(edits.labor_hours.is_some());
                assert!(mechanic_notes.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_operation_and_status() {
        assert!(serde_json::from_value::<GatewayRequest>(json!({"operation": "delete_everything"}))
            .is_err());
        assert!(serde_json::from_value::<GatewayRequest>(json!({
            "operation": "share_estimate",
            "estimateId": "e1",
            "expectedStatus": "shown_to_customer"
        }))
        .is_err());
        assert!(serde_json::from_value::<GatewayRequest>(json!({
            "operation": "respond_to_estimate",
            "estimateId": "e1",
            "expectedStatus": "pending_customer_approval",
            "decision": "maybe"
        }))
        .is_err());
    }
}
