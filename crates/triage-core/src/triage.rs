//! Reaction-based triage of automated alert messages.

use std::collections::HashSet;

use crate::config::TriageConfig;
use crate::messaging::Message;

/// Reaction labels that mark an alert as seen or as handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSets {
    pub ack: HashSet<String>,
    pub done: HashSet<String>,
}

impl LabelSets {
    pub fn new<A, D>(ack: A, done: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            ack: ack.into_iter().map(Into::into).collect(),
            done: done.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &TriageConfig) -> Self {
        Self::new(config.ack_labels.iter().cloned(), config.done_labels.iter().cloned())
    }
}

impl Default for LabelSets {
    fn default() -> Self {
        Self::new(["eyes"], ["white_check_mark"])
    }
}

/// Triage state of a single automated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Carries a completion label.
    Done,
    /// Acknowledged but never completed.
    Incomplete,
    /// Carries neither an acknowledgment nor a completion label.
    Missed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriageResult {
    pub missed: usize,
    pub incomplete: usize,
    pub done: usize,
}

impl TriageResult {
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.missed + self.incomplete > 0
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Done => self.done += 1,
            Outcome::Incomplete => self.incomplete += 1,
            Outcome::Missed => self.missed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TriageEngine {
    labels: LabelSets,
}

impl TriageEngine {
    #[must_use]
    pub fn new(labels: LabelSets) -> Self {
        Self { labels }
    }

    /// Classify one message. Human-authored messages yield `None`.
    ///
    /// A completion label wins over an acknowledgment label.
    #[must_use]
    pub fn classify_message(&self, message: &Message) -> Option<Outcome> {
        if !message.is_automated() {
            return None;
        }
        let has = |set: &HashSet<String>| message.reaction_names().any(|n| set.contains(n));
        let outcome = if has(&self.labels.done) {
            Outcome::Done
        } else if has(&self.labels.ack) {
            Outcome::Incomplete
        } else {
            Outcome::Missed
        };
        Some(outcome)
    }

    #[must_use]
    pub fn classify(&self, messages: &[Message]) -> TriageResult {
        messages
            .iter()
            .filter_map(|m| self.classify_message(m))
            .fold(TriageResult::default(), |mut acc, outcome| {
                acc.record(outcome);
                acc
            })
    }
}
