//! Turns raw, possibly overlapping message fetches into thread and inbox views.
//!
//! Nothing here does I/O. Malformed records are sorted last or skipped, never
//! reported, since the backend feeding these functions is not trusted to be
//! well formed.

use std::{cmp::Reverse, collections::{HashMap, HashSet}};

use serde::Serialize;
use time::OffsetDateTime;

use crate::models::{parse_timestamp, Message, UserId, UserSummary};

pub const NO_MESSAGES_YET: &str = "No messages yet";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterpart: UserSummary,
    pub last_message: Option<String>,
    pub last_timestamp: Option<String>,
}

impl ConversationSummary {
    pub fn preview(&self) -> &str {
        self.last_message.as_deref().unwrap_or(NO_MESSAGES_YET)
    }

    fn instant(&self) -> Option<OffsetDateTime> {
        self.last_timestamp.as_deref().and_then(parse_timestamp)
    }
}

/// Merges the two directional fetches of a conversation.
///
/// The result is ordered by timestamp (missing or unparseable ones last) and
/// holds every message id at most once, keeping the earliest copy. Messages
/// without an id are all kept.
pub fn build_thread(a_to_b: Vec<Message>, b_to_a: Vec<Message>) -> Vec<Message> {
    let mut all = a_to_b;
    all.extend(b_to_a);
    all.sort_by_cached_key(thread_order);

    let mut seen = HashSet::new();
    all.retain(|m| match &m.id {
        Some(id) => seen.insert(id.clone()),
        None => true,
    });
    all
}

/// Sort key of a thread: ascending by time, untimestamped messages last.
pub fn thread_order(message: &Message) -> (bool, Option<OffsetDateTime>) {
    let t = message.instant();
    (t.is_none(), t)
}

/// One summary per counterpart of `local`, most recent conversation first.
pub fn build_inbox(local: &UserId, messages: &[Message]) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> = Vec::new();
    let mut index: HashMap<UserId, usize> = HashMap::new();

    for message in messages {
        let Some(counterpart) = counterpart(local, message) else {
            continue;
        };

        match index.get(&counterpart.id).copied() {
            Some(i) => {
                let current = &mut summaries[i];
                if is_later(message.instant(), current.instant()) {
                    current.last_message = Some(message.content.clone());
                    current.last_timestamp = message.timestamp.clone();
                }
            }
            None => {
                index.insert(counterpart.id.clone(), summaries.len());
                summaries.push(ConversationSummary {
                    counterpart: counterpart.clone(),
                    last_message: Some(message.content.clone()),
                    last_timestamp: message.timestamp.clone(),
                });
            }
        }
    }

    summaries.sort_by_cached_key(|s| {
        let t = s.instant();
        (t.is_none(), Reverse(t))
    });
    summaries
}

/// Appends a just-sent message without deduplicating; the next
/// [`build_thread`] over a fresh fetch settles any overlap by id.
pub fn append_optimistic<T>(mut thread: Vec<T>, new: T) -> Vec<T> {
    thread.push(new);
    thread
}

/// The other party of `message` as seen from `local`, if `local` takes part.
pub fn counterpart<'m>(local: &UserId, message: &'m Message) -> Option<&'m UserSummary> {
    match (&message.sender, &message.receiver) {
        (Some(sender), receiver) if &sender.id == local => receiver.as_ref(),
        (sender, Some(receiver)) if &receiver.id == local => sender.as_ref(),
        _ => None,
    }
}

fn is_later(candidate: Option<OffsetDateTime>, current: Option<OffsetDateTime>) -> bool {
    match (candidate, current) {
        (Some(c), Some(cur)) => c > cur,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;

    fn user(id: &str) -> UserSummary {
        UserSummary {
            id: UserId::new(id),
            full_name: format!("user {id}"),
            role: None,
            email: None,
        }
    }

    fn msg(id: Option<&str>, from: &str, to: &str, content: &str, ts: Option<&str>) -> Message {
        Message {
            id: id.map(MessageId::new),
            sender: Some(user(from)),
            receiver: Some(user(to)),
            content: content.to_owned(),
            timestamp: ts.map(str::to_owned),
        }
    }

    fn ids(thread: &[Message]) -> Vec<Option<&str>> {
        thread.iter().map(|m| m.id.as_ref().map(MessageId::as_str)).collect()
    }

    #[test]
    fn interleaves_both_directions_by_time() {
        let a_to_b = vec![msg(Some("1"), "a", "b", "hi", Some("2024-01-01T10:00:00Z"))];
        let b_to_a = vec![msg(Some("2"), "b", "a", "hey", Some("2024-01-01T10:05:00Z"))];

        let thread = build_thread(a_to_b, b_to_a);
        assert_eq!(ids(&thread), vec![Some("1"), Some("2")]);

        let a_to_b = vec![msg(Some("3"), "a", "b", "late", Some("2024-01-02T00:00:00Z"))];
        let b_to_a = vec![msg(Some("4"), "b", "a", "early", Some("2024-01-01T00:00:00Z"))];
        assert_eq!(ids(&build_thread(a_to_b, b_to_a)), vec![Some("4"), Some("3")]);
    }

    #[test]
    fn same_message_in_both_fetches_appears_once() {
        let five = msg(Some("5"), "a", "b", "dup", Some("2024-01-01T10:00:00Z"));
        let thread = build_thread(vec![five.clone()], vec![five]);
        assert_eq!(ids(&thread), vec![Some("5")]);
    }

    #[test]
    fn overlapping_fetches_keep_each_id_once_in_order() {
        let a_to_b = vec![
            msg(Some("1"), "a", "b", "x", Some("2024-01-01T10:00:00Z")),
            msg(Some("2"), "a", "b", "y", Some("2024-01-01T10:02:00Z")),
            msg(Some("3"), "a", "b", "z", None),
        ];
        let b_to_a = vec![
            msg(Some("2"), "a", "b", "y", Some("2024-01-01T10:02:00Z")),
            msg(Some("4"), "b", "a", "w", Some("2024-01-01T10:01:00Z")),
            msg(Some("1"), "a", "b", "x", Some("2024-01-01T10:00:00Z")),
        ];

        let thread = build_thread(a_to_b, b_to_a);
        assert_eq!(ids(&thread), vec![Some("1"), Some("4"), Some("2"), Some("3")]);

        for pair in thread.windows(2) {
            match (pair[0].instant(), pair[1].instant()) {
                (Some(x), Some(y)) => assert!(x <= y),
                (_, None) => {}
                (None, Some(_)) => panic!("untimestamped entry before a timestamped one"),
            }
        }
    }

    #[test]
    fn bad_timestamps_sort_last_without_panicking() {
        let thread = build_thread(
            vec![
                msg(Some("1"), "a", "b", "garbled", Some("not a date")),
                msg(Some("2"), "a", "b", "fine", Some("2024-01-01T10:00:00Z")),
            ],
            vec![msg(Some("3"), "b", "a", "none", None)],
        );
        assert_eq!(ids(&thread), vec![Some("2"), Some("1"), Some("3")]);
    }

    #[test]
    fn missing_ids_are_never_collapsed() {
        let thread = build_thread(
            vec![msg(None, "a", "b", "one", None), msg(None, "a", "b", "two", None)],
            vec![],
        );
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "one");
    }

    #[test]
    fn empty_inputs_give_empty_views() {
        assert!(build_thread(vec![], vec![]).is_empty());
        assert!(build_inbox(&UserId::new("a"), &[]).is_empty());
    }

    #[test]
    fn inbox_has_one_row_per_counterpart_most_recent_first() {
        let me = UserId::new("a");
        let messages = vec![
            msg(Some("1"), "a", "b", "to b", Some("2024-01-01T09:00:00Z")),
            msg(Some("2"), "c", "a", "from c", Some("2024-01-01T11:00:00Z")),
            msg(Some("3"), "b", "a", "from b", Some("2024-01-01T10:00:00Z")),
            msg(Some("4"), "a", "d", "to d", Some("2024-01-01T08:00:00Z")),
        ];

        let inbox = build_inbox(&me, &messages);
        let order: Vec<_> = inbox.iter().map(|s| s.counterpart.id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "d"]);
        assert_eq!(inbox[1].preview(), "from b");

        for pair in inbox.windows(2) {
            if let (Some(x), Some(y)) = (pair[0].instant(), pair[1].instant()) {
                assert!(x >= y);
            }
        }
    }

    #[test]
    fn untimestamped_message_never_replaces_a_timestamped_one() {
        let me = UserId::new("a");
        let timestamped_first = vec![
            msg(Some("1"), "b", "a", "dated", Some("2024-01-01T09:00:00Z")),
            msg(Some("2"), "a", "b", "undated", None),
        ];
        assert_eq!(build_inbox(&me, &timestamped_first)[0].preview(), "dated");

        let undated_first = vec![
            msg(Some("2"), "a", "b", "undated", None),
            msg(Some("1"), "b", "a", "dated", Some("2024-01-01T09:00:00Z")),
        ];
        let inbox = build_inbox(&me, &undated_first);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].preview(), "dated");
    }

    #[test]
    fn inbox_ties_and_missing_times_keep_encounter_order() {
        let me = UserId::new("a");
        let messages = vec![
            msg(Some("1"), "a", "x", "x", None),
            msg(Some("2"), "a", "b", "b", Some("2024-01-01T09:00:00Z")),
            msg(Some("3"), "a", "y", "y", None),
            msg(Some("4"), "a", "c", "c", Some("2024-01-01T09:00:00Z")),
        ];
        let order: Vec<_> = build_inbox(&me, &messages)
            .into_iter()
            .map(|s| s.counterpart.id.to_string())
            .collect();
        assert_eq!(order, vec!["b", "c", "x", "y"]);
    }

    #[test]
    fn foreign_and_partial_records_are_skipped() {
        let me = UserId::new("a");
        let mut no_receiver = msg(Some("2"), "a", "b", "lost", None);
        no_receiver.receiver = None;
        let messages = vec![msg(Some("1"), "x", "y", "not mine", None), no_receiver];
        assert!(build_inbox(&me, &messages).is_empty());
    }

    #[test]
    fn counterpart_seen_from_either_side_counts_once() {
        let me = UserId::new("a");
        let messages = vec![
            msg(Some("1"), "b", "a", "in", Some("2024-01-01T09:00:00Z")),
            msg(Some("2"), "a", "b", "out", Some("2024-01-01T09:30:00Z")),
        ];
        let inbox = build_inbox(&me, &messages);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].preview(), "out");
    }

    #[test]
    fn optimistic_append_goes_last_and_does_not_dedup() {
        let existing = vec![msg(Some("1"), "a", "b", "hi", Some("2024-01-01T09:00:00Z"))];
        let echoed = msg(Some("1"), "a", "b", "hi", Some("2024-01-01T09:00:00Z"));
        let thread = append_optimistic(existing, echoed);
        assert_eq!(ids(&thread), vec![Some("1"), Some("1")]);
    }
}
