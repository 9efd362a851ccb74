//! Error types for triage-slack.

use triage_core::messaging::MessagingError;

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    /// Transport failure or non-2xx status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack answered with `ok: false`.
    #[error("slack {method}: {error}")]
    Api { method: &'static str, error: String },

    /// A required field was absent from an `ok: true` response.
    #[error("no {field} in {method} response")]
    MissingField {
        method: &'static str,
        field: &'static str,
    },
}

impl From<SlackError> for MessagingError {
    fn from(e: SlackError) -> Self {
        match e {
            SlackError::Http(e) => Self::Http(e.to_string()),
            SlackError::Api { method, error } => Self::Api {
                method: method.to_owned(),
                error,
            },
            e @ SlackError::MissingField { .. } => Self::Decode(e.to_string()),
        }
    }
}
