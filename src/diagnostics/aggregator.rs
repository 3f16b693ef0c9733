//! DiagnosticAggregator: append-only capture of agent output.
//!
//! Responsibilities:
//! - Validate raw tool-call arguments into typed payloads (exact decimals)
//! - Stamp capture time and expiry from the retention policy
//! - Append one record per capture; never merge or dedup
//! - Group live records into a `ConversationBundle` at read time

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::WorkflowError;
use crate::store::RecordStore;

use super::types::{
    CaptureReceipt, Captured, ConversationBundle, DiagnosticFindings, DiagnosticRecord,
    FindingsCapture, LaborItem, PartInfo, RecordPayload, RepairRecommendation, VehicleInfo,
};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Default number of days a captured record stays readable.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

// ─── Retention ──────────────────────────────────────────────────────────────

/// How long captured records remain readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// A window of whole days. Out-of-range counts saturate.
    pub fn days(days: i64) -> Self {
        Self::new(Duration::try_days(days).unwrap_or(Duration::MAX))
    }

    /// Expiry for a record captured at `captured_at`, truncated to whole
    /// seconds because the store keys expiry on epoch seconds.
    ///
    /// Saturates at the latest representable time.
    pub fn expires_at(&self, captured_at: DateTime<Utc>) -> DateTime<Utc> {
        let expiry = captured_at
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        DateTime::from_timestamp(expiry.timestamp(), 0).unwrap_or(expiry)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::days(DEFAULT_RETENTION_DAYS)
    }
}

// ─── DiagnosticAggregator ───────────────────────────────────────────────────

/// Owns creation of diagnostic records and assembly of conversation bundles.
pub struct DiagnosticAggregator {
    store: Arc<dyn RecordStore>,
    retention: RetentionPolicy,
}

impl DiagnosticAggregator {
    pub fn new(store: Arc<dyn RecordStore>, retention: RetentionPolicy) -> Self {
        Self { store, retention }
    }

    /// The retention policy records are stamped with.
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    // ─── Capture ────────────────────────────────────────────────────────

    /// Record the vehicle and the agent's diagnosis.
    pub fn capture_findings(
        &self,
        conversation_id: &str,
        vehicle_info: &Value,
        findings: &Value,
    ) -> Result<CaptureReceipt, WorkflowError> {
        let vehicle_info: VehicleInfo = decode_one("vehicleInfo", vehicle_info)?;
        let findings: DiagnosticFindings = decode_one("diagnosticFindings", findings)?;
        require_text("diagnosticFindings.primaryIssue", &findings.primary_issue)?;

        self.append(
            conversation_id,
            RecordPayload::Findings(FindingsCapture {
                vehicle_info,
                findings,
            }),
        )
    }

    /// Record the agent's repair recommendations (an empty list is valid).
    pub fn capture_recommendations(
        &self,
        conversation_id: &str,
        recommendations: &Value,
    ) -> Result<CaptureReceipt, WorkflowError> {
        let items: Vec<RepairRecommendation> =
            decode_list("repairRecommendations", recommendations)?;
        for (i, item) in items.iter().enumerate() {
            require_text(
                &format!("repairRecommendations[{i}].repairName"),
                &item.repair_name,
            )?;
        }
        self.append(conversation_id, RecordPayload::Recommendations(items))
    }

    /// Record parts with exact prices (an empty list is valid).
    pub fn capture_parts_information(
        &self,
        conversation_id: &str,
        parts: &Value,
    ) -> Result<CaptureReceipt, WorkflowError> {
        let items: Vec<PartInfo> = decode_list("partsInformation", parts)?;
        for (i, item) in items.iter().enumerate() {
            require_text(&format!("partsInformation[{i}].partName"), &item.part_name)?;
        }
        self.append(conversation_id, RecordPayload::Parts(items))
    }

    /// Record labor tasks with exact hours and rates (an empty list is valid).
    pub fn capture_labor_estimates(
        &self,
        conversation_id: &str,
        labor: &Value,
    ) -> Result<CaptureReceipt, WorkflowError> {
        let items: Vec<LaborItem> = decode_list("laborEstimates", labor)?;
        for (i, item) in items.iter().enumerate() {
            require_text(&format!("laborEstimates[{i}].task"), &item.task)?;
        }
        self.append(conversation_id, RecordPayload::Labor(items))
    }

    fn append(
        &self,
        conversation_id: &str,
        payload: RecordPayload,
    ) -> Result<CaptureReceipt, WorkflowError> {
        require_text("conversationId", conversation_id)?;

        let kind = payload.kind();
        let captured_at = Utc::now();
        let record = DiagnosticRecord {
            record_id: format!(
                "{kind}-{conversation_id}-{}",
                uuid::Uuid::now_v7().simple()
            ),
            conversation_id: conversation_id.to_string(),
            kind,
            payload,
            captured_at,
            expires_at: self.retention.expires_at(captured_at),
        };

        if let Err(e) = self.store.put(&record) {
            tracing::warn!(
                conversation_id,
                kind = %kind,
                error = %e,
                "failed to store diagnostic record"
            );
            return Err(e);
        }

        tracing::info!(
            conversation_id,
            kind = %kind,
            record_id = %record.record_id,
            items = record.payload.item_count(),
            "captured diagnostic record"
        );

        Ok(CaptureReceipt {
            record_id: record.record_id,
            kind,
            captured_at: record.captured_at,
            expires_at: record.expires_at,
        })
    }

    // ─── Retrieval ──────────────────────────────────────────────────────

    /// All live records for a conversation, grouped by kind.
    ///
    /// Unknown conversations and empty kinds yield empty lists, never errors.
    pub fn get_conversation_bundle(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationBundle, WorkflowError> {
        require_text("conversationId", conversation_id)?;
        let records = self.store.query_by_conversation(conversation_id, Utc::now())?;

        let mut bundle = ConversationBundle {
            conversation_id: conversation_id.to_string(),
            total_records: records.len(),
            ..ConversationBundle::default()
        };

        for record in records {
            let DiagnosticRecord {
                record_id,
                captured_at,
                expires_at,
                payload,
                ..
            } = record;
            match payload {
                RecordPayload::Findings(p) => bundle.findings.push(Captured {
                    record_id,
                    captured_at,
                    expires_at,
                    payload: p,
                }),
                RecordPayload::Recommendations(p) => bundle.recommendations.push(Captured {
                    record_id,
                    captured_at,
                    expires_at,
                    payload: p,
                }),
                RecordPayload::Parts(p) => bundle.parts.push(Captured {
                    record_id,
                    captured_at,
                    expires_at,
                    payload: p,
                }),
                RecordPayload::Labor(p) => bundle.labor.push(Captured {
                    record_id,
                    captured_at,
                    expires_at,
                    payload: p,
                }),
            }
        }

        tracing::debug!(
            conversation_id,
            total = bundle.total_records,
            "assembled conversation bundle"
        );
        Ok(bundle)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn decode_one<T: DeserializeOwned>(field: &str, value: &Value) -> Result<T, WorkflowError> {
    if value.is_null() {
        return Err(WorkflowError::validation(field, "is required"));
    }
    serde_json::from_value(value.clone()).map_err(|e| WorkflowError::validation(field, e.to_string()))
}

fn decode_list<T: DeserializeOwned>(field: &str, value: &Value) -> Result<Vec<T>, WorkflowError> {
    let items = value
        .as_array()
        .ok_or_else(|| WorkflowError::validation(field, "must be a list"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item.clone())
                .map_err(|e| WorkflowError::validation(format!("{field}[{i}]"), e.to_string()))
        })
        .collect()
}

fn require_text(field: &str, value: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::validation(field, "must not be blank"));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::diagnostics::types::RecordKind;
    use crate::store::SqliteStore;

    fn aggregator_with(retention: RetentionPolicy) -> DiagnosticAggregator {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        DiagnosticAggregator::new(store, retention)
    }

    fn aggregator() -> DiagnosticAggregator {
        aggregator_with(RetentionPolicy::default())
    }

    fn civic() -> Value {
        json!({"year": 2018, "make": "Honda", "model": "Civic"})
    }

    fn squeal() -> Value {
        json!({
            "primary_issue": "Worn front brake pads",
            "symptoms": ["squealing when braking"],
            "confidence": 0.85
        })
    }

    #[test]
    fn test_parts_price_is_stored_exactly() {
        let agg = aggregator();
        let receipt = agg
            .capture_parts_information(
                "CONV-1",
                &json!([{"part_name": "Front Brake Pads", "estimated_price": 45.99}]),
            )
            .unwrap();
        assert_eq!(receipt.kind, RecordKind::PartsInformation);
        assert!(receipt.record_id.starts_with("parts_information-CONV-1-"));

        let bundle = agg.get_conversation_bundle("CONV-1").unwrap();
        let price = bundle.parts[0].payload[0].estimated_price;
        assert_eq!(price, Decimal::from_str("45.99").unwrap());
        assert_eq!(price.to_string(), "45.99");
    }

    #[test]
    fn test_same_findings_twice_are_both_kept() {
        let agg = aggregator();
        let a = agg.capture_findings("CONV-1", &civic(), &squeal()).unwrap();
        let b = agg.capture_findings("CONV-1", &civic(), &squeal()).unwrap();
        assert_ne!(a.record_id, b.record_id);

        let bundle = agg.get_conversation_bundle("CONV-1").unwrap();
        assert_eq!(bundle.findings.len(), 2);
        assert_eq!(bundle.total_records, 2);
        assert_eq!(bundle.findings[0].record_id, a.record_id);
        assert_eq!(bundle.findings[1].record_id, b.record_id);
    }

    #[test]
    fn test_bundle_groups_by_kind() {
        let agg = aggregator();
        agg.capture_findings("CONV-1", &civic(), &squeal()).unwrap();
        agg.capture_recommendations(
            "CONV-1",
            &json!([{"repair_name": "Replace front pads", "priority": "high"}]),
        )
        .unwrap();
        agg.capture_labor_estimates(
            "CONV-1",
            &json!([{"task": "Replace pads", "hours": 1.5, "rate": 120}]),
        )
        .unwrap();
        agg.capture_parts_information("CONV-2", &json!([{"partName": "Rotor", "estimatedPrice": "80"}]))
            .unwrap();

        let bundle = agg.get_conversation_bundle("CONV-1").unwrap();
        assert_eq!(bundle.findings.len(), 1);
        assert_eq!(bundle.recommendations.len(), 1);
        assert_eq!(bundle.labor.len(), 1);
        assert!(bundle.parts.is_empty());
        assert_eq!(bundle.total_records, 3);
        assert_eq!(bundle.labor[0].payload[0].hours, Decimal::from_str("1.5").unwrap());
    }

    #[test]
    fn test_empty_list_is_a_record() {
        let agg = aggregator();
        assert!(agg.get_conversation_bundle("CONV-1").unwrap().is_empty());

        agg.capture_parts_information("CONV-1", &json!([])).unwrap();
        let bundle = agg.get_conversation_bundle("CONV-1").unwrap();
        assert_eq!(bundle.parts.len(), 1);
        assert!(bundle.parts[0].payload.is_empty());
        assert!(!bundle.is_empty());
    }

    #[test]
    fn test_unknown_conversation_is_empty_not_error() {
        let bundle = aggregator().get_conversation_bundle("NOPE").unwrap();
        assert_eq!(bundle.total_records, 0);
        assert!(bundle.findings.is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let agg = aggregator();

        let err = agg
            .capture_parts_information(
                "CONV-1",
                &json!([{"part_name": "Pads", "estimated_price": "forty"}]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("partsInformation[0]"));

        let err = agg
            .capture_labor_estimates("CONV-1", &json!({"task": "not a list"}))
            .unwrap_err();
        assert!(err.to_string().contains("must be a list"));

        let err = agg
            .capture_findings("CONV-1", &civic(), &json!({"primary_issue": "  "}))
            .unwrap_err();
        assert!(err.to_string().contains("primaryIssue"));

        let err = agg
            .capture_recommendations(" ", &json!([]))
            .unwrap_err();
        assert!(err.to_string().contains("conversationId"));

        // Nothing was written by any failed capture.
        assert!(agg.get_conversation_bundle("CONV-1").unwrap().is_empty());
    }

    #[test]
    fn test_expired_records_are_excluded() {
        let agg = aggregator_with(RetentionPolicy::new(Duration::zero()));
        agg.capture_findings("CONV-1", &civic(), &squeal()).unwrap();
        assert!(agg.get_conversation_bundle("CONV-1").unwrap().is_empty());
    }

    #[test]
    fn test_retention_expiry_is_whole_seconds() {
        let policy = RetentionPolicy::days(30);
        let at = DateTime::parse_from_rfc3339("2026-01-01T10:00:00.750Z")
            .unwrap()
            .with_timezone(&Utc);
        let exp = policy.expires_at(at);
        assert_eq!(exp.to_rfc3339(), "2026-01-31T10:00:00+00:00");
    }

    #[test]
    fn test_huge_retention_saturates() {
        let policy = RetentionPolicy::days(i64::MAX);
        let at = Utc::now();
        assert!(policy.expires_at(at) > at);

        let agg = aggregator_with(policy);
        agg.capture_parts_information("CONV-1", &json!([])).unwrap();
        assert_eq!(agg.get_conversation_bundle("CONV-1").unwrap().parts.len(), 1);
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn put(&self, _record: &DiagnosticRecord) -> Result<(), WorkflowError> {
            Err(WorkflowError::Persistence {
                reason: "disk full".into(),
            })
        }
        fn query_by_conversation(
            &self,
            _conversation_id: &str,
            _now: DateTime<Utc>,
        ) -> Result<Vec<DiagnosticRecord>, WorkflowError> {
            Ok(vec![])
        }
        fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, WorkflowError> {
            Ok(0)
        }
    }

    #[test]
    fn test_store_failure_surfaces_as_persistence_error() {
        let agg = DiagnosticAggregator::new(Arc::new(FailingStore), RetentionPolicy::default());
        let err = agg.capture_parts_information("CONV-1", &json!([])).unwrap_err();
        assert_eq!(err.kind(), "PersistenceError");
    }
}
