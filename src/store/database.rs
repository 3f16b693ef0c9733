//! SQLite store for diagnostic records and cost estimates.
//!
//! Uses `rusqlite` in synchronous mode behind a mutex so one handle can be
//! shared across request handlers. WAL mode is enabled for file databases.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::diagnostics::types::{DiagnosticRecord, RecordKind, RecordPayload};
use crate::errors::WorkflowError;
use crate::estimate::types::{CostEstimate, EstimateStatus};

use super::{CasOutcome, EstimateRepository, RecordStore};

// ─── Database ───────────────────────────────────────────────────────────────

/// SQLite handle implementing [`RecordStore`] and [`EstimateRepository`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, WorkflowError> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA busy_timeout=5000;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        tracing::debug!(path, "record store opened");
        Ok(store)
    }

    /// Create all required tables if they don't exist.
    fn create_tables(&self) -> Result<(), WorkflowError> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS diagnostic_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                captured_at TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_conversation
                ON diagnostic_records(conversation_id, seq);

            CREATE INDEX IF NOT EXISTS idx_records_expiry
                ON diagnostic_records(expires_at);

            CREATE TABLE IF NOT EXISTS cost_estimates (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_estimates_conversation
                ON cost_estimates(conversation_id, created_at);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, WorkflowError> {
        self.conn.lock().map_err(|e| WorkflowError::Persistence {
            reason: format!("store lock poisoned: {e}"),
        })
    }

    fn read_status(
        conn: &Connection,
        estimate_id: &str,
    ) -> Result<Option<EstimateStatus>, WorkflowError> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM cost_estimates WHERE id = ?1",
                params![estimate_id],
                |row| row.get(0),
            )
            .optional()?;
        status.map(|s| parse_status(&s)).transpose()
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
    fn put(&self, record: &DiagnosticRecord) -> Result<(), WorkflowError> {
        let payload = serde_json::to_string(&record.payload).map_err(corrupt)?;
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO diagnostic_records
             (record_id, conversation_id, kind, payload, captured_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.record_id,
                record.conversation_id,
                record.kind.as_str(),
                payload,
                record.captured_at.to_rfc3339(),
                record.expires_at.timestamp(),
            ],
        )?;
        if inserted == 0 {
            tracing::debug!(record_id = %record.record_id, "record already stored");
        }
        Ok(())
    }

    fn query_by_conversation(
        &self,
        conversation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiagnosticRecord>, WorkflowError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT record_id, conversation_id, kind, payload, captured_at, expires_at
             FROM diagnostic_records
             WHERE conversation_id = ?1 AND expires_at > ?2
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id, now.timestamp()], |row| {
            Ok(RawRecord {
                record_id: row.get(0)?,
                conversation_id: row.get(1)?,
                kind: row.get(2)?,
                payload: row.get(3)?,
                captured_at: row.get(4)?,
                expires_at: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
        let removed = self.conn()?.execute(
            "DELETE FROM diagnostic_records WHERE expires_at <= ?1",
            params![now.timestamp()],
        )?;
        if removed > 0 {
            tracing::info!(removed, "purged expired diagnostic records");
        }
        Ok(removed)
    }
}

// ─── Estimates ──────────────────────────────────────────────────────────────

impl EstimateRepository for SqliteStore {
    fn insert_estimate(&self, estimate: &CostEstimate) -> Result<(), WorkflowError> {
        let body = serde_json::to_string(estimate).map_err(corrupt)?;
        self.conn()?.execute(
            "INSERT INTO cost_estimates
             (id, conversation_id, status, version, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                estimate.estimate_id,
                estimate.conversation_id,
                estimate.status.as_str(),
                estimate.version,
                body,
                estimate.created_at.to_rfc3339(),
                estimate.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_estimate(&self, estimate_id: &str) -> Result<Option<CostEstimate>, WorkflowError> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                "SELECT body FROM cost_estimates WHERE id = ?1",
                params![estimate_id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| decode_estimate(&b)).transpose()
    }

    fn list_estimates(&self, conversation_id: &str) -> Result<Vec<CostEstimate>, WorkflowError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM cost_estimates
             WHERE conversation_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| row.get::<_, String>(0))?;

        let mut estimates = Vec::new();
        for row in rows {
            estimates.push(decode_estimate(&row?)?);
        }
        Ok(estimates)
    }

    fn compare_and_swap(
        &self,
        updated: &CostEstimate,
        expected_status: EstimateStatus,
        expected_version: u32,
    ) -> Result<CasOutcome, WorkflowError> {
        let body = serde_json::to_string(updated).map_err(corrupt)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE cost_estimates
             SET status = ?2, version = ?3, body = ?4, updated_at = ?5
             WHERE id = ?1 AND status = ?6 AND version = ?7",
            params![
                updated.estimate_id,
                updated.status.as_str(),
                updated.version,
                body,
                updated.updated_at.to_rfc3339(),
                expected_status.as_str(),
                expected_version,
            ],
        )?;

        if changed == 1 {
            return Ok(CasOutcome::Applied);
        }
        let actual = Self::read_status(&conn, &updated.estimate_id)?;
        Ok(CasOutcome::Conflict { actual })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// A record row before its payload and timestamps are decoded.
struct RawRecord {
    record_id: String,
    conversation_id: String,
    kind: String,
    payload: String,
    captured_at: String,
    expires_at: i64,
}

impl RawRecord {
    fn decode(self) -> Result<DiagnosticRecord, WorkflowError> {
        let kind = RecordKind::parse(&self.kind).ok_or_else(|| WorkflowError::Persistence {
            reason: format!("record '{}' has unknown kind '{}'", self.record_id, self.kind),
        })?;
        let value: serde_json::Value = serde_json::from_str(&self.payload).map_err(corrupt)?;
        let payload = RecordPayload::from_json(kind, value).map_err(corrupt)?;
        let captured_at = DateTime::parse_from_rfc3339(&self.captured_at)
            .map_err(|e| WorkflowError::Persistence {
                reason: format!("bad captured_at on '{}': {e}", self.record_id),
            })?
            .with_timezone(&Utc);
        let expires_at =
            DateTime::from_timestamp(self.expires_at, 0).ok_or_else(|| WorkflowError::Persistence {
                reason: format!("bad expires_at on '{}'", self.record_id),
            })?;

        Ok(DiagnosticRecord {
            record_id: self.record_id,
            conversation_id: self.conversation_id,
            kind,
            payload,
            captured_at,
            expires_at,
        })
    }
}

fn decode_estimate(body: &str) -> Result<CostEstimate, WorkflowError> {
    serde_json::from_str(body).map_err(corrupt)
}

fn parse_status(s: &str) -> Result<EstimateStatus, WorkflowError> {
    EstimateStatus::parse(s).ok_or_else(|| WorkflowError::Persistence {
        reason: format!("unknown estimate status '{s}'"),
    })
}

/// Stored JSON that no longer decodes is a persistence fault, not a caller error.
fn corrupt(e: serde_json::Error) -> WorkflowError {
    WorkflowError::Persistence {
        reason: format!("stored data is corrupt: {e}"),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;
    use crate::diagnostics::types::{PartInfo, VehicleInfo};
    use crate::quote::{compute_breakdown, LaborInput, QuoteInputs};

    fn test_store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    fn parts_record(id: &str, conversation: &str, expires_in: Duration) -> DiagnosticRecord {
        let now = Utc::now();
        DiagnosticRecord {
            record_id: id.to_string(),
            conversation_id: conversation.to_string(),
            kind: RecordKind::PartsInformation,
            payload: RecordPayload::Parts(vec![PartInfo {
                part_name: "Front Brake Pads".into(),
                part_number: None,
                estimated_price: Decimal::from_str("45.99").unwrap(),
                quantity: Decimal::ONE,
                brand: None,
                availability: None,
            }]),
            captured_at: now,
            expires_at: now + expires_in,
        }
    }

    fn draft_estimate(id: &str) -> CostEstimate {
        let inputs = QuoteInputs {
            labor: LaborInput::Flat(Decimal::from(100)),
            parts: vec![],
            shop_fees: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_override: None,
        };
        let now = Utc::now();
        CostEstimate {
            estimate_id: id.to_string(),
            conversation_id: "CONV-1".into(),
            vehicle_info: VehicleInfo::default(),
            selected_option: None,
            breakdown: compute_breakdown(&inputs).unwrap(),
            inputs,
            status: EstimateStatus::Draft,
            confidence: None,
            valid_until: now + Duration::days(30),
            is_modified: false,
            original_estimate: None,
            modified_estimate: None,
            mechanic_notes: None,
            customer_notes: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn test_put_and_query_preserves_exact_price() {
        let store = test_store();
        store
            .put(&parts_record("r1", "CONV-1", Duration::days(30)))
            .unwrap();

        let records = store.query_by_conversation("CONV-1", Utc::now()).unwrap();
        assert_eq!(records.len(), 1);
        match &records[0].payload {
            RecordPayload::Parts(parts) => {
                assert_eq!(parts[0].estimated_price.to_string(), "45.99");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_put_is_idempotent() {
        let store = test_store();
        let record = parts_record("r1", "CONV-1", Duration::days(1));
        store.put(&record).unwrap();
        store.put(&record).unwrap();
        assert_eq!(
            store.query_by_conversation("CONV-1", Utc::now()).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_query_keeps_insertion_order_and_scopes_by_conversation() {
        let store = test_store();
        store.put(&parts_record("b", "CONV-1", Duration::days(1))).unwrap();
        store.put(&parts_record("a", "CONV-1", Duration::days(1))).unwrap();
        store.put(&parts_record("c", "CONV-2", Duration::days(1))).unwrap();

        let ids: Vec<String> = store
            .query_by_conversation("CONV-1", Utc::now())
            .unwrap()
            .into_iter()
            .map(|r| r.record_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_expired_records_are_filtered_then_purged() {
        let store = test_store();
        store
            .put(&parts_record("old", "CONV-1", Duration::seconds(-10)))
            .unwrap();
        store.put(&parts_record("new", "CONV-1", Duration::days(1))).unwrap();

        let live = store.query_by_conversation("CONV-1", Utc::now()).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].record_id, "new");

        assert_eq!(store.purge_expired(Utc::now()).unwrap(), 1);
        assert_eq!(store.purge_expired(Utc::now()).unwrap(), 0);
    }

    #[test]
    fn test_estimate_insert_get_list() {
        let store = test_store();
        store.insert_estimate(&draft_estimate("e1")).unwrap();
        store.insert_estimate(&draft_estimate("e2")).unwrap();

        let e1 = store.get_estimate("e1").unwrap().unwrap();
        assert_eq!(e1.status, EstimateStatus::Draft);
        assert_eq!(e1.breakdown.total.to_string(), "100.00");
        assert!(store.get_estimate("missing").unwrap().is_none());
        assert_eq!(store.list_estimates("CONV-1").unwrap().len(), 2);
        assert!(store.list_estimates("CONV-9").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_estimate_id_is_persistence_error() {
        let store = test_store();
        store.insert_estimate(&draft_estimate("e1")).unwrap();
        let err = store.insert_estimate(&draft_estimate("e1")).unwrap_err();
        assert_eq!(err.kind(), "PersistenceError");
    }

    #[test]
    fn test_compare_and_swap() {
        let store = test_store();
        let original = draft_estimate("e1");
        store.insert_estimate(&original).unwrap();

        let mut shared = original.clone();
        shared.status = EstimateStatus::SharedPendingMechanicApproval;
        shared.version = 2;
        assert_eq!(
            store
                .compare_and_swap(&shared, EstimateStatus::Draft, 1)
                .unwrap(),
            CasOutcome::Applied
        );

        // A second writer still holding the draft view loses.
        let mut stale = original.clone();
        stale.status = EstimateStatus::Approved;
        stale.version = 2;
        assert_eq!(
            store.compare_and_swap(&stale, EstimateStatus::Draft, 1).unwrap(),
            CasOutcome::Conflict {
                actual: Some(EstimateStatus::SharedPendingMechanicApproval)
            }
        );
        let stored = store.get_estimate("e1").unwrap().unwrap();
        assert_eq!(stored, shared);
    }

    #[test]
    fn test_compare_and_swap_missing_estimate() {
        let store = test_store();
        let ghost = draft_estimate("ghost");
        assert_eq!(
            store.compare_and_swap(&ghost, EstimateStatus::Draft, 1).unwrap(),
            CasOutcome::Conflict { actual: None }
        );
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repairdesk.db");
        let path = path.to_string_lossy().into_owned();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&parts_record("r1", "CONV-1", Duration::days(1))).unwrap();
            store.insert_estimate(&draft_estimate("e1")).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.query_by_conversation("CONV-1", Utc::now()).unwrap().len(),
            1
        );
        assert!(reopened.get_estimate("e1").unwrap().is_some());
    }
}
