//! One scheduled pass over the monitored channels.

use std::fmt::Write as _;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::Instrument as _;

use crate::config::{Config, TriageConfig};
use crate::error::RunError;
use crate::messaging::{Conversation, MessagingClient, Visibility};
use crate::triage::{LabelSets, TriageEngine, TriageResult};
use crate::vault::{Secret, VaultProvider};

/// Counters describing what a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub channels_processed: usize,
    pub channels_skipped: usize,
    pub warnings_composed: usize,
    pub warnings_posted: usize,
    pub post_failures: usize,
}

/// Oldest history timestamp for a run started at `now`, as unix seconds.
///
/// # Errors
///
/// Returns [`RunError::LookbackOutOfRange`] when the offset leaves chrono's
/// representable range.
pub fn lookback_boundary(now: DateTime<Utc>, lookback_days: i64) -> Result<String, RunError> {
    TimeDelta::try_days(lookback_days)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|oldest| oldest.timestamp().to_string())
        .ok_or(RunError::LookbackOutOfRange {
            days: lookback_days,
        })
}

/// Build the channel warning, or `None` when nothing needs attention.
#[must_use]
pub fn compose_warning(result: &TriageResult, triage: &TriageConfig) -> Option<String> {
    if !result.needs_attention() {
        return None;
    }
    let ack = triage.ack_labels.first().map_or("eyes", String::as_str);
    let done = triage
        .done_labels
        .first()
        .map_or("white_check_mark", String::as_str);
    let hours = triage.lookback_days.unsigned_abs().saturating_mul(24);

    let mut warning =
        format!(":wave: There are messages that have not been triaged in the last {hours} hours");
    if result.missed > 0 {
        let _ = write!(
            warning,
            "\n\nThere were {} messages missed :{ack}: ",
            result.missed
        );
    }
    if result.incomplete > 0 {
        let _ = write!(
            warning,
            "\n\n There were {} messages with :{ack}: but never completed with :{done}: ",
            result.incomplete
        );
    }
    Some(warning)
}

/// Orchestrates a single run: credential, enumeration, triage, warnings.
///
/// `connect` turns the retrieved credential into a messaging client.
pub struct AlertRunner<'a, F> {
    config: &'a Config,
    vault: &'a dyn VaultProvider,
    engine: TriageEngine,
    connect: F,
}

impl<'a, F, C> AlertRunner<'a, F>
where
    F: Fn(Secret) -> C,
    C: MessagingClient,
{
    pub fn new(config: &'a Config, vault: &'a dyn VaultProvider, connect: F) -> Self {
        Self {
            config,
            vault,
            engine: TriageEngine::new(LabelSets::from_config(&config.triage)),
            connect,
        }
    }

    /// Run once against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the lookback window cannot be computed or
    /// the credential cannot be obtained.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        self.run_at(Utc::now()).await
    }

    /// Run once with an explicit "now".
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the lookback window cannot be computed or
    /// the credential cannot be obtained.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        let oldest = lookback_boundary(now, self.config.triage.lookback_days)?;
        let span = tracing::info_span!(
            "triage_run",
            oldest = %oldest,
            dry_run = self.config.runner.dry_run
        );
        self.run_from(&oldest).instrument(span).await
    }

    async fn run_from(&self, oldest: &str) -> Result<RunReport, RunError> {
        let token = self.credential().await?;
        let client = (self.connect)(token);
        tracing::info!("starting triage run");

        let conversations = enumerate_conversations(&client).await;
        let pause = self.config.channel_pause();
        let mut report = RunReport::default();

        for conversation in &conversations {
            tracing::info!(channel = %conversation.name, "checking messages");
            if !self.config.triage.is_monitored(&conversation.name) {
                tracing::info!(
                    channel = %conversation.name,
                    "skipping channel, not configured in channel list"
                );
                report.channels_skipped += 1;
                continue;
            }

            let span = tracing::info_span!(
                "channel",
                channel = %conversation.name,
                channel_id = %conversation.id
            );
            self.process_channel(&client, conversation, oldest, &mut report)
                .instrument(span)
                .await;
            report.channels_processed += 1;

            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        tracing::info!(
            processed = report.channels_processed,
            skipped = report.channels_skipped,
            warnings = report.warnings_composed,
            posted = report.warnings_posted,
            "triage run finished"
        );
        Ok(report)
    }

    async fn credential(&self) -> Result<Secret, RunError> {
        let path = &self.config.slack.token_secret;
        match self.vault.get_secret(path).await {
            Ok(Some(value)) => Ok(Secret::new(value)),
            Ok(None) => Err(RunError::CredentialMissing { path: path.clone() }),
            Err(e) => Err(RunError::CredentialUnavailable {
                path: path.clone(),
                reason: format!("{e:#}"),
            }),
        }
    }

    async fn process_channel(
        &self,
        client: &C,
        conversation: &Conversation,
        oldest: &str,
        report: &mut RunReport,
    ) {
        let messages = match client.fetch_history(&conversation.id, oldest).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("unable to get messages for channel: {e}");
                Vec::new()
            }
        };

        let result = self.engine.classify(&messages);
        tracing::debug!(
            messages = messages.len(),
            missed = result.missed,
            incomplete = result.incomplete,
            done = result.done,
            "channel classified"
        );

        let Some(warning) = compose_warning(&result, &self.config.triage) else {
            return;
        };
        report.warnings_composed += 1;
        tracing::info!("{warning}");

        if self.config.runner.dry_run {
            tracing::info!("dry run, warning not posted");
            return;
        }
        match client.post_message(&conversation.id, &warning).await {
            Ok(()) => report.warnings_posted += 1,
            Err(e) => {
                report.post_failures += 1;
                tracing::error!("unable to write message to channel: {e}");
            }
        }
    }
}

/// Authenticate, then list every visibility class. Failures degrade to empty.
async fn enumerate_conversations<C: MessagingClient>(client: &C) -> Vec<Conversation> {
    let identity = match client.authenticate().await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("unable to resolve own user id, no conversations listed: {e}");
            return Vec::new();
        }
    };
    tracing::debug!(user_id = %identity.user_id, "authenticated");

    let mut conversations = Vec::new();
    for visibility in Visibility::ALL {
        match client.list_conversations(&identity, visibility).await {
            Ok(mut found) => {
                tracing::debug!(%visibility, count = found.len(), "conversations listed");
                conversations.append(&mut found);
            }
            Err(e) => {
                tracing::warn!(
                    %visibility,
                    "unable to retrieve conversations, check token scopes allow this: {e}"
                );
            }
        }
    }
    conversations
}
