use std::path::PathBuf;

use super::Config;

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_slack();
        self.apply_env_overrides_triage();
        self.apply_env_overrides_vault();
    }

    fn apply_env_overrides_slack(&mut self) {
        if let Ok(v) = std::env::var("TRIAGE_SLACK_API_BASE") {
            self.slack.api_base = v;
        }
        if let Ok(v) = std::env::var("TRIAGE_SLACK_TOKEN_SECRET") {
            self.slack.token_secret = v;
        }
        if let Ok(v) = std::env::var("TRIAGE_SLACK_PAGE_LIMIT") {
            if let Ok(limit) = v.parse::<u32>() {
                self.slack.page_limit = limit;
            } else {
                tracing::warn!("ignoring invalid TRIAGE_SLACK_PAGE_LIMIT value: {v}");
            }
        }
    }

    fn apply_env_overrides_triage(&mut self) {
        if let Ok(v) = std::env::var("TRIAGE_CHANNELS") {
            self.triage.channels = split_list(&v);
        }
        if let Ok(v) = std::env::var("TRIAGE_LOOKBACK_DAYS") {
            if let Ok(days) = v.parse::<i64>() {
                self.triage.lookback_days = days;
            } else {
                tracing::warn!("ignoring invalid TRIAGE_LOOKBACK_DAYS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("TRIAGE_ACK_LABELS") {
            self.triage.ack_labels = split_list(&v);
        }
        if let Ok(v) = std::env::var("TRIAGE_DONE_LABELS") {
            self.triage.done_labels = split_list(&v);
        }
        if let Ok(v) = std::env::var("TRIAGE_DRY_RUN") {
            if let Ok(dry_run) = v.parse::<bool>() {
                self.runner.dry_run = dry_run;
            } else {
                tracing::warn!("ignoring invalid TRIAGE_DRY_RUN value: {v}");
            }
        }
        if let Ok(v) = std::env::var("TRIAGE_CHANNEL_PAUSE_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.runner.channel_pause_ms = ms;
            } else {
                tracing::warn!("ignoring invalid TRIAGE_CHANNEL_PAUSE_MS value: {v}");
            }
        }
    }

    fn apply_env_overrides_vault(&mut self) {
        if let Ok(v) = std::env::var("TRIAGE_VAULT_BACKEND") {
            self.vault.backend = v;
        }
        if let Ok(v) = std::env::var("TRIAGE_VAULT_KEY") {
            self.vault.key_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("TRIAGE_VAULT_PATH") {
            self.vault.vault_path = Some(PathBuf::from(v));
        }
    }
}
