//! Workflow Gateway: named JSON operations over the whole workflow.
//!
//! Submodules:
//! - `requests`: Operation-tagged request shapes
//! - `handler`: Dispatch and response shapes

pub mod handler;
pub mod requests;

pub use handler::WorkflowGateway;
pub use requests::GatewayRequest;
