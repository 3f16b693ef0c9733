//! Typed diagnostic fragments captured from the reasoning agent.
//!
//! Field names serialize in camelCase; snake_case aliases are accepted on
//! input because the agent's tool schema uses them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money;

// ─── Record Kind ────────────────────────────────────────────────────────────

/// Which capture operation produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    DiagnosticFindings,
    RepairRecommendations,
    PartsInformation,
    LaborEstimates,
}

impl RecordKind {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::DiagnosticFindings => "diagnostic_findings",
            RecordKind::RepairRecommendations => "repair_recommendations",
            RecordKind::PartsInformation => "parts_information",
            RecordKind::LaborEstimates => "labor_estimates",
        }
    }

    /// Parse from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "diagnostic_findings" => Some(RecordKind::DiagnosticFindings),
            "repair_recommendations" => Some(RecordKind::RepairRecommendations),
            "parts_information" => Some(RecordKind::PartsInformation),
            "labor_estimates" => Some(RecordKind::LaborEstimates),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Payloads ───────────────────────────────────────────────────────────────

/// Vehicle description as reported in the conversation. Passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    /// Anything else the agent attached (color, transmission, …).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// How soon the issue should be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The agent's diagnosis for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticFindings {
    #[serde(alias = "primary_issue")]
    pub primary_issue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default, alias = "diagnostic_codes")]
    pub diagnostic_codes: Vec<String>,
    #[serde(
        default,
        deserialize_with = "money::de_opt_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Severity>,
}

/// A findings capture: the vehicle plus the diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingsCapture {
    #[serde(alias = "vehicle_info")]
    pub vehicle_info: VehicleInfo,
    pub findings: DiagnosticFindings,
}

/// One recommended repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRecommendation {
    #[serde(alias = "repair_name", alias = "name")]
    pub repair_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Severity>,
    #[serde(
        default,
        alias = "estimated_cost",
        deserialize_with = "money::de_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_cost: Option<Decimal>,
    #[serde(
        default,
        alias = "labor_hours",
        deserialize_with = "money::de_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub labor_hours: Option<Decimal>,
}

/// One part with its price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInfo {
    #[serde(alias = "part_name")]
    pub part_name: String,
    #[serde(default, alias = "part_number", skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(alias = "estimated_price", deserialize_with = "money::de_amount")]
    pub estimated_price: Decimal,
    #[serde(
        default = "money::default_quantity",
        deserialize_with = "money::de_quantity"
    )]
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

/// One labor task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborItem {
    #[serde(alias = "description")]
    pub task: String,
    #[serde(alias = "labor_hours", deserialize_with = "money::de_amount")]
    pub hours: Decimal,
    /// Hourly rate; the shop default applies when absent.
    #[serde(
        default,
        alias = "hourly_rate",
        deserialize_with = "money::de_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub rate: Option<Decimal>,
}

/// Kind-specific content of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordPayload {
    Findings(FindingsCapture),
    Recommendations(Vec<RepairRecommendation>),
    Parts(Vec<PartInfo>),
    Labor(Vec<LaborItem>),
}

impl RecordPayload {
    /// The record kind this payload belongs to.
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::Findings(_) => RecordKind::DiagnosticFindings,
            RecordPayload::Recommendations(_) => RecordKind::RepairRecommendations,
            RecordPayload::Parts(_) => RecordKind::PartsInformation,
            RecordPayload::Labor(_) => RecordKind::LaborEstimates,
        }
    }

    /// Decode a stored payload given the kind column it was written with.
    pub fn from_json(kind: RecordKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            RecordKind::DiagnosticFindings => RecordPayload::Findings(serde_json::from_value(value)?),
            RecordKind::RepairRecommendations => {
                RecordPayload::Recommendations(serde_json::from_value(value)?)
            }
            RecordKind::PartsInformation => RecordPayload::Parts(serde_json::from_value(value)?),
            RecordKind::LaborEstimates => RecordPayload::Labor(serde_json::from_value(value)?),
        })
    }

    /// Number of items carried (findings count as one).
    pub fn item_count(&self) -> usize {
        match self {
            RecordPayload::Findings(_) => 1,
            RecordPayload::Recommendations(v) => v.len(),
            RecordPayload::Parts(v) => v.len(),
            RecordPayload::Labor(v) => v.len(),
        }
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

/// An immutable, append-only fragment captured during a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    pub record_id: String,
    pub conversation_id: String,
    pub kind: RecordKind,
    pub payload: RecordPayload,
    pub captured_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Returned by every successful capture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureReceipt {
    pub record_id: String,
    pub kind: RecordKind,
    pub captured_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ─── Bundle ─────────────────────────────────────────────────────────────────

/// One record's payload with its provenance, as returned in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Captured<T> {
    pub record_id: String,
    pub captured_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payload: T,
}

/// All live records for a conversation, grouped by kind in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationBundle {
    pub conversation_id: String,
    pub findings: Vec<Captured<FindingsCapture>>,
    pub recommendations: Vec<Captured<Vec<RepairRecommendation>>>,
    pub parts: Vec<Captured<Vec<PartInfo>>>,
    pub labor: Vec<Captured<Vec<LaborItem>>>,
    pub total_records: usize,
}

impl ConversationBundle {
    /// True when nothing at all has been captured (or everything expired).
    pub fn is_empty(&self) -> bool {
        self.total_records == 0
    }
}
