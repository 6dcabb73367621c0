//! Taskrelay — relays infrastructure run-task approvals to a Teams
//! channel and the human decision back to the run's callback URL.
//!
//! Library crate so integration tests in `tests/` can drive the real
//! router and broker.

pub mod api;
pub mod auth;
pub mod broker;
pub mod config;
pub mod errors;
pub mod notification;
pub mod store;

use auth::RequestAuthenticator;
use broker::ApprovalBroker;

/// Shared application state passed to handlers.
pub struct AppState {
    pub broker: ApprovalBroker,
    pub authenticator: RequestAuthenticator,
}
