use std::future::Future;

use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::{
    assembler::{build_inbox, ConversationSummary},
    models::{Message, OutgoingMessage, SentMessage, UserId, UserSummary},
    thread::ThreadState,
};

/// What the messaging pages need from the backend.
///
/// The conversation query is directional: asking for `sender -> receiver`
/// and `receiver -> sender` can return different sets, so threads are
/// always loaded from both.
pub trait MessageTransport: Sync {
    fn messages_for_user(&self, user: &UserId) -> impl Future<Output = anyhow::Result<Vec<Message>>> + Send;

    fn conversation(&self, sender: &UserId, receiver: &UserId) -> impl Future<Output = anyhow::Result<Vec<Message>>> + Send;

    fn send_message(&self, outgoing: &OutgoingMessage) -> impl Future<Output = anyhow::Result<SentMessage>> + Send;

    /// Directory lookup, for naming the other side of a thread that has no
    /// messages yet.
    fn find_user(&self, id: &UserId) -> impl Future<Output = anyhow::Result<Option<UserSummary>>> + Send;
}

pub async fn load_thread<T: MessageTransport>(transport: &T, local: &UserId, counterpart: &UserId) -> anyhow::Result<ThreadState> {
    let (a_to_b, b_to_a) = fetch_both_directions(transport, local, counterpart).await?;
    Ok(ThreadState::fetched(a_to_b, b_to_a))
}

pub async fn refresh_thread<T: MessageTransport>(
    transport: &T,
    local: &UserId,
    counterpart: &UserId,
    state: &mut ThreadState,
) -> anyhow::Result<()> {
    let (a_to_b, b_to_a) = fetch_both_directions(transport, local, counterpart).await?;
    state.refresh(a_to_b, b_to_a);
    Ok(())
}

async fn fetch_both_directions<T: MessageTransport>(
    transport: &T,
    local: &UserId,
    counterpart: &UserId,
) -> anyhow::Result<(Vec<Message>, Vec<Message>)> {
    let (a_to_b, b_to_a) = tokio::try_join!(
        transport.conversation(local, counterpart),
        transport.conversation(counterpart, local),
    )?;
    debug!(%local, %counterpart, a_to_b = a_to_b.len(), b_to_a = b_to_a.len(), "fetched conversation");
    Ok((a_to_b, b_to_a))
}

/// Loads the inbox of `local`: one fetch of everything involving the user,
/// then one thread per counterpart for an up to date preview.
///
/// If any preview fetch fails the inbox falls back to the first fetch alone.
pub async fn load_inbox<T: MessageTransport>(transport: &T, local: &UserId) -> anyhow::Result<Vec<ConversationSummary>> {
    let messages = transport.messages_for_user(local).await?;
    let contacts = build_inbox(local, &messages);

    let threads = try_join_all(
        contacts
            .iter()
            .map(|summary| load_thread(transport, local, &summary.counterpart.id)),
    )
    .await;

    match threads {
        Ok(threads) => {
            let mut all = messages;
            for thread in threads {
                all.extend(thread.messages().cloned());
            }
            Ok(build_inbox(local, &all))
        }
        Err(err) => {
            warn!(%local, "inbox preview fetch failed, showing partial inbox: {err:#}");
            Ok(contacts)
        }
    }
}
