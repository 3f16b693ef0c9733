//! Outbound notifications for estimate transitions.
//!
//! Delivery to devices is someone else's job; this module only hands events
//! to whatever sits behind the [`Notifier`] port. A failed hand-off is logged
//! by the caller and never undoes a committed transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{CostEstimate, EstimateStatus, Party};

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EstimateShared,
    EstimateModified,
    EstimateApproved,
    EstimateReturned,
    EstimateDeclined,
}

/// One notification emitted after a transition commits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub event_id: String,
    pub estimate_id: String,
    pub conversation_id: String,
    pub recipient: Party,
    pub kind: NotificationKind,
    pub status: EstimateStatus,
    pub emitted_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Build an event for the estimate as it was persisted.
    pub fn for_estimate(estimate: &CostEstimate, recipient: Party, kind: NotificationKind) -> Self {
        Self {
            event_id: uuid::Uuid::now_v7().to_string(),
            estimate_id: estimate.estimate_id.clone(),
            conversation_id: estimate.conversation_id.clone(),
            recipient,
            kind,
            status: estimate.status,
            emitted_at: Utc::now(),
        }
    }
}

/// Errors that can occur while handing off a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The receiving side is gone.
    #[error("notification channel closed")]
    ChannelClosed,
}

/// Port to the external notification collaborator.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

// ─── Implementations ────────────────────────────────────────────────────────

/// Writes each notification as a structured log line.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            estimate_id = %event.estimate_id,
            conversation_id = %event.conversation_id,
            recipient = ?event.recipient,
            kind = ?event.kind,
            status = %event.status,
            "estimate notification"
        );
        Ok(())
    }
}

/// Forwards notifications over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event.clone())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
