use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".into()
}

fn default_token_secret() -> String {
    "TRIAGE_SLACK_BOT_TOKEN".into()
}

fn default_page_limit() -> u32 {
    200
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlackConfig {
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Secret-store path of the bot token.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            token_secret: default_token_secret(),
            page_limit: default_page_limit(),
        }
    }
}

fn default_lookback_days() -> i64 {
    -1
}

fn default_ack_labels() -> Vec<String> {
    vec!["eyes".into()]
}

fn default_done_labels() -> Vec<String> {
    vec!["white_check_mark".into()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriageConfig {
    /// Channel names to monitor; everything else is skipped.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Day offset of the history window, negative means the past.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_ack_labels")]
    pub ack_labels: Vec<String>,
    #[serde(default = "default_done_labels")]
    pub done_labels: Vec<String>,
}

impl TriageConfig {
    #[must_use]
    pub fn is_monitored(&self, channel_name: &str) -> bool {
        self.channels.iter().any(|c| c == channel_name)
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            lookback_days: default_lookback_days(),
            ack_labels: default_ack_labels(),
            done_labels: default_done_labels(),
        }
    }
}

fn default_channel_pause_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Compute and log warnings without posting them.
    #[serde(default)]
    pub dry_run: bool,
    /// Pause after each monitored channel to stay under platform rate limits.
    #[serde(default = "default_channel_pause_ms")]
    pub channel_pause_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            channel_pause_ms: default_channel_pause_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultConfig {
    /// `env` or `age`.
    #[serde(default = "default_vault_backend")]
    pub backend: String,
    /// age identity file, required by the `age` backend.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// age-encrypted JSON secrets file, required by the `age` backend.
    #[serde(default)]
    pub vault_path: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: default_vault_backend(),
            key_path: None,
            vault_path: None,
        }
    }
}

fn default_vault_backend() -> String {
    "env".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub exporter: String,
    #[serde(default = "default_otlp_endpoint")]
    pub endpoint: String,
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            exporter: String::new(),
            endpoint: default_otlp_endpoint(),
        }
    }
}
