//! Estimate Approval: the CostEstimate lifecycle between customer and mechanic.
//!
//! Submodules:
//! - `types`: Status, events, the estimate itself
//! - `state_machine`: The transition table
//! - `edits`: Mechanic edits applied to quote inputs
//! - `notify`: Notification port and implementations
//! - `service`: Creation and the transition pipeline

pub mod edits;
pub mod notify;
pub mod service;
pub mod state_machine;
pub mod types;

pub use edits::EstimateEdits;
pub use notify::{
    ChannelNotifier, LogNotifier, NotificationEvent, NotificationKind, Notifier, NotifyError,
};
pub use service::{CustomerDecision, EstimateService, MechanicDecision};
pub use state_machine::transition;
pub use types::{CostEstimate, EstimateEvent, EstimateSnapshot, EstimateStatus, Party};
