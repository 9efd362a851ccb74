//! Slack Web API implementation of the triage messaging client.

pub mod api;
pub mod error;

pub use api::{SlackApi, http_client};
pub use error::SlackError;
