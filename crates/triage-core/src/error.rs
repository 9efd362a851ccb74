//! Fatal run errors.

/// Errors that abort a run.
///
/// Channel-level failures are logged and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The secret store has no value under the configured path.
    #[error("credential not found in secret store at {path}")]
    CredentialMissing { path: String },

    /// The secret store could not be queried or decrypted.
    #[error("credential unavailable at {path}: {reason}")]
    CredentialUnavailable { path: String, reason: String },

    /// `now + lookback_days` falls outside the representable date range.
    #[error("lookback of {days} days is out of range")]
    LookbackOutOfRange { days: i64 },
}

impl RunError {
    /// Secret-store path involved in a credential failure.
    #[must_use]
    pub fn secret_path(&self) -> Option<&str> {
        match self {
            Self::CredentialMissing { path } | Self::CredentialUnavailable { path, .. } => {
                Some(path.as_str())
            }
            Self::LookbackOutOfRange { .. } => None,
        }
    }
}
