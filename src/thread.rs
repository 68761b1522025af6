use std::{collections::HashSet, mem};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    assembler::{append_optimistic, build_thread, thread_order},
    models::{Message, OutgoingMessage, SentMessage, UserSummary},
};

/// A message the user sent that the backend has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub key: Uuid,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ThreadEntry {
    /// Came from a backend fetch.
    Confirmed(Message),
    /// Sent from here and acknowledged, but not seen in a fetch yet.
    Sent(Message),
    Pending(PendingMessage),
}

impl ThreadEntry {
    pub fn message(&self) -> &Message {
        match self {
            ThreadEntry::Confirmed(message) | ThreadEntry::Sent(message) => message,
            ThreadEntry::Pending(pending) => &pending.message,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ThreadEntry::Pending(_))
    }
}

/// The thread between two users with sent-but-unconfirmed messages kept
/// apart from the ones the backend returned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThreadState {
    entries: Vec<ThreadEntry>,
}

impl ThreadState {
    pub fn fetched(a_to_b: Vec<Message>, b_to_a: Vec<Message>) -> Self {
        Self {
            entries: build_thread(a_to_b, b_to_a)
                .into_iter()
                .map(ThreadEntry::Confirmed)
                .collect(),
        }
    }

    pub fn entries(&self) -> &[ThreadEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(ThreadEntry::message)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Appends `outgoing` as pending and returns the key to settle it with.
    pub fn push_pending(&mut self, outgoing: &OutgoingMessage, sender: UserSummary, receiver: UserSummary) -> Uuid {
        let key = Uuid::now_v7();
        let pending = PendingMessage {
            key,
            message: Message {
                id: None,
                sender: Some(sender),
                receiver: Some(receiver),
                content: outgoing.content.clone(),
                timestamp: None,
            },
        };
        self.entries = append_optimistic(mem::take(&mut self.entries), ThreadEntry::Pending(pending));
        key
    }

    /// Marks a pending entry as accepted by the backend, in place.
    pub fn confirm(&mut self, key: Uuid, sent: SentMessage) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| matches!(e, ThreadEntry::Pending(p) if p.key == key)) else {
            return false;
        };

        let mut message = entry.message().clone();
        message.id = sent.id;
        message.timestamp = sent.timestamp;
        *entry = ThreadEntry::Sent(message);
        true
    }

    pub fn discard(&mut self, key: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !matches!(e, ThreadEntry::Pending(p) if p.key == key));
        self.entries.len() != before
    }

    /// Replaces everything fetched before with `a_to_b` and `b_to_a`.
    ///
    /// Sent entries survive until a fetch returns their id, then the fetched
    /// copy takes over. Pending entries stay at the end.
    pub fn refresh(&mut self, a_to_b: Vec<Message>, b_to_a: Vec<Message>) {
        let mut sent = Vec::new();
        let mut pending = Vec::new();
        for entry in mem::take(&mut self.entries) {
            match entry {
                ThreadEntry::Confirmed(_) => {}
                ThreadEntry::Sent(message) => sent.push(message),
                ThreadEntry::Pending(p) => pending.push(ThreadEntry::Pending(p)),
            }
        }

        let fetched = build_thread(a_to_b, b_to_a);
        let seen: HashSet<_> = fetched.iter().filter_map(|m| m.id.as_ref()).collect();
        let unseen: Vec<ThreadEntry> = sent
            .into_iter()
            .filter(|m| m.id.as_ref().is_none_or(|id| !seen.contains(id)))
            .map(ThreadEntry::Sent)
            .collect();

        let mut entries: Vec<ThreadEntry> = fetched
            .into_iter()
            .map(ThreadEntry::Confirmed)
            .chain(unseen)
            .collect();
        entries.sort_by_cached_key(|e| thread_order(e.message()));
        for p in pending {
            entries = append_optimistic(entries, p);
        }
        self.entries = entries;
    }
}
