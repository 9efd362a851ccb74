mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};

/// Oldest accepted lookback, roughly a century.
pub const MIN_LOOKBACK_DAYS: i64 = -36_500;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values the runner cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_LOOKBACK_DAYS..0).contains(&self.triage.lookback_days) {
            bail!(
                "triage.lookback_days must be between {MIN_LOOKBACK_DAYS} and -1, got {}",
                self.triage.lookback_days
            );
        }
        if self.triage.ack_labels.is_empty() {
            bail!("triage.ack_labels must not be empty");
        }
        if self.triage.done_labels.is_empty() {
            bail!("triage.done_labels must not be empty");
        }
        if self.slack.api_base.trim().is_empty() {
            bail!("slack.api_base must not be empty");
        }
        if !(1..=1000).contains(&self.slack.page_limit) {
            bail!(
                "slack.page_limit must be between 1 and 1000, got {}",
                self.slack.page_limit
            );
        }
        if self.slack.token_secret.trim().is_empty() {
            bail!("slack.token_secret must not be empty");
        }
        if self.vault.backend == "age" {
            if self.vault.key_path.is_none() {
                bail!("vault.key_path is required for the age backend");
            }
            if self.vault.vault_path.is_none() {
                bail!("vault.vault_path is required for the age backend");
            }
        }
        if self.triage.channels.is_empty() {
            tracing::warn!("no channels configured, every conversation will be skipped");
        }
        Ok(())
    }

    #[must_use]
    pub fn channel_pause(&self) -> Duration {
        Duration::from_millis(self.runner.channel_pause_ms)
    }
}
