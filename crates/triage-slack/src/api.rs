//! Slack Web API client for conversation listing, history and posting.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use triage_core::messaging::{
    AuthorKind, Conversation, Identity, Message, MessagingClient, MessagingError, Reaction,
    Visibility,
};
use triage_core::vault::Secret;

use crate::error::SlackError;

const SLACK_API: &str = "https://slack.com/api";
const DEFAULT_PAGE_LIMIT: u32 = 200;
const MAX_PAGES: usize = 50;

/// Message subtype Slack assigns to posts made by integrations.
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

pub struct SlackApi {
    client: reqwest::Client,
    token: Secret,
    base_url: String,
    page_limit: u32,
}

impl std::fmt::Debug for SlackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApi")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

impl ResponseMetadata {
    fn cursor(&self) -> Option<String> {
        let cursor = self.next_cursor.trim();
        (!cursor.is_empty()).then(|| cursor.to_owned())
    }
}

#[derive(Deserialize)]
struct AuthTest {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct ConversationsPage {
    #[serde(default)]
    channels: Vec<WireChannel>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<WireMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    reactions: Vec<WireReaction>,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct WireReaction {
    name: String,
    #[serde(default)]
    users: Vec<String>,
}

#[derive(Deserialize)]
struct Posted {}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

impl From<WireMessage> for Message {
    fn from(m: WireMessage) -> Self {
        let author = if m.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE) {
            AuthorKind::Automated
        } else {
            AuthorKind::Human
        };
        Self {
            author,
            reactions: m
                .reactions
                .into_iter()
                .map(|r| Reaction {
                    name: r.name,
                    users: r.users,
                })
                .collect(),
            ts: m.ts,
            text: m.text,
        }
    }
}

fn conversation_type(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public_channel",
        Visibility::Private => "private_channel",
    }
}

/// HTTP client for Web API calls. Build once and share across [`SlackApi`]s.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client() -> Result<reqwest::Client, SlackError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("triage-slack/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

impl SlackApi {
    #[must_use]
    pub fn new(client: reqwest::Client, token: Secret) -> Self {
        Self {
            client,
            token,
            base_url: SLACK_API.to_owned(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Override the Web API base URL (tests, proxies, Slack GovSlack).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    fn unwrap_envelope<T>(method: &'static str, envelope: Envelope<T>) -> Result<T, SlackError> {
        if envelope.ok {
            Ok(envelope.body)
        } else {
            Err(SlackError::Api {
                method,
                error: envelope.error.unwrap_or_else(|| "unknown".into()),
            })
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        let envelope: Envelope<T> = self
            .client
            .get(format!("{}/{method}", self.base_url))
            .bearer_auth(self.token.expose())
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::unwrap_envelope(method, envelope)
    }

    /// Call auth.test to retrieve the bot's own user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or Slack API fails.
    pub async fn auth_test(&self) -> Result<String, SlackError> {
        let resp: AuthTest = self.get("auth.test", &[]).await?;
        resp.user_id.ok_or(SlackError::MissingField {
            method: "auth.test",
            field: "user_id",
        })
    }

    /// List every conversation of one type the user belongs to, following cursors.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn users_conversations(
        &self,
        user_id: &str,
        visibility: Visibility,
    ) -> Result<Vec<Conversation>, SlackError> {
        let mut conversations = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut params = vec![
                ("user", user_id.to_owned()),
                ("types", conversation_type(visibility).to_owned()),
                ("exclude_archived", "true".to_owned()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = cursor.take() {
                params.push(("cursor", c));
            }
            let page: ConversationsPage = self.get("users.conversations", &params).await?;
            conversations.extend(page.channels.into_iter().map(|c| Conversation {
                id: c.id,
                name: c.name,
                visibility,
            }));
            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => return Ok(conversations),
            }
        }
        tracing::warn!(%visibility, "users.conversations page limit reached, listing truncated");
        Ok(conversations)
    }

    /// Fetch channel history newer than `oldest`, following cursors while `has_more`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn conversations_history(
        &self,
        channel: &str,
        oldest: &str,
    ) -> Result<Vec<Message>, SlackError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut params = vec![
                ("channel", channel.to_owned()),
                ("oldest", oldest.to_owned()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = cursor.take() {
                params.push(("cursor", c));
            }
            let page: HistoryPage = self.get("conversations.history", &params).await?;
            messages.extend(page.messages.into_iter().map(Message::from));
            match page.response_metadata.cursor() {
                Some(next) if page.has_more => cursor = Some(next),
                _ => return Ok(messages),
            }
        }
        tracing::warn!(channel, "conversations.history page limit reached, history truncated");
        Ok(messages)
    }

    /// Post a plain-text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or Slack API fails.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        let envelope: Envelope<Posted> = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(self.token.expose())
            .json(&PostMessage { channel, text })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::unwrap_envelope("chat.postMessage", envelope)?;
        Ok(())
    }
}

impl MessagingClient for SlackApi {
    async fn authenticate(&self) -> Result<Identity, MessagingError> {
        let user_id = self.auth_test().await?;
        Ok(Identity { user_id })
    }

    async fn list_conversations(
        &self,
        identity: &Identity,
        visibility: Visibility,
    ) -> Result<Vec<Conversation>, MessagingError> {
        Ok(self
            .users_conversations(&identity.user_id, visibility)
            .await?)
    }

    async fn fetch_history(
        &self,
        conversation_id: &str,
        oldest: &str,
    ) -> Result<Vec<Message>, MessagingError> {
        Ok(self.conversations_history(conversation_id, oldest).await?)
    }

    async fn post_message(&self, conversation_id: &str, text: &str) -> Result<(), MessagingError> {
        Ok(SlackApi::post_message(self, conversation_id, text).await?)
    }
}
