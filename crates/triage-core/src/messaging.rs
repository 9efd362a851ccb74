//! Messaging platform data model and client interface.

use std::fmt;
use std::future::Future;

/// Conversation visibility class used when enumerating channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Enumeration order: public channels first, then private.
    pub const ALL: [Self; 2] = [Self::Public, Self::Private];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
}

/// Who posted a message. Only `Automated` messages are triaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorKind {
    Human,
    Automated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub name: String,
    pub users: Vec<String>,
}

impl Reaction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub author: AuthorKind,
    pub reactions: Vec<Reaction>,
    /// Platform timestamp, opaque to the triage rule.
    pub ts: String,
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn is_automated(&self) -> bool {
        self.author == AuthorKind::Automated
    }

    pub fn reaction_names(&self) -> impl Iterator<Item = &str> {
        self.reactions.iter().map(|r| r.name.as_str())
    }
}

/// The authenticated identity the client acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Transport-level failure (connect, timeout, non-2xx status).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The platform answered but rejected the call.
    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    /// Response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Capabilities the runner needs from a messaging platform.
pub trait MessagingClient: Send + Sync {
    /// Resolve the identity behind the credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is rejected or the call fails.
    fn authenticate(&self) -> impl Future<Output = Result<Identity, MessagingError>> + Send;

    /// List conversations of one visibility class that `identity` belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    fn list_conversations(
        &self,
        identity: &Identity,
        visibility: Visibility,
    ) -> impl Future<Output = Result<Vec<Conversation>, MessagingError>> + Send;

    /// Fetch messages posted to `conversation_id` since `oldest` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if the history call fails.
    fn fetch_history(
        &self,
        conversation_id: &str,
        oldest: &str,
    ) -> impl Future<Output = Result<Vec<Message>, MessagingError>> + Send;

    /// Post a plain-text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the post is rejected or the call fails.
    fn post_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), MessagingError>> + Send;
}
