use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    assembler::counterpart,
    auth::{local_path, to_login},
    backend::Backend,
    include_res,
    models::{display_timestamp, OutgoingMessage, UserId, UserSummary},
    res::{self, escape},
    role::Role,
    session::{self, SessionUser},
    thread::ThreadState,
    transport::{load_thread, refresh_thread, MessageTransport},
    AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct SendForm {
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["chat", &id]).into_response());
    };
    let other = UserId::new(id);
    let api = backend.authed(&user);

    let state = match session::thread(&session, &other).await? {
        Some(mut state) => {
            refresh_thread(&api, &user.user_id, &other, &mut state).await?;
            state
        }
        None => load_thread(&api, &user.user_id, &other).await?,
    };
    session::store_thread(&session, &other, &state).await?;

    let other = match find_counterpart(&user, &state, &other) {
        Some(found) => found,
        None => lookup_user(&api, &other).await,
    };
    let flash = res::flash(&session).await?;

    Ok(res::page(
        &format!("Chat with {}", other.display_name()),
        &include_res!(str, "/pages/chat.html")
            .replace("{id}", &escape(other.id.as_str()))
            .replace("{name}", &escape(other.display_name()))
            .replace("{class}", Role::css_class(other.role))
            .replace("{flash}", &flash)
            .replace("{messages}", &render_thread(&user, &state)),
    ).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
    Form(SendForm { content }): Form<SendForm>,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["chat", &id]).into_response());
    };
    let other = UserId::new(id);

    send_to(&session, &backend.authed(&user), &user, &other, &content).await?;
    Ok(Redirect::to(&local_path(&["chat", other.as_str()])).into_response())
}

/// Sends `content` to `other` through the two-phase thread kept in the
/// session: pending first, then confirmed or dropped once the backend answers.
pub(crate) async fn send_to<T: MessageTransport>(
    session: &Session,
    api: &T,
    user: &SessionUser,
    other: &UserId,
    content: &str,
) -> AppResult<()> {
    let outgoing = match OutgoingMessage::new(user.user_id.clone(), other.clone(), content) {
        Ok(outgoing) => outgoing,
        Err(_) => {
            session::set_flash(session, "Type a message first.").await?;
            return Ok(());
        }
    };

    let mut state = match session::thread(session, other).await? {
        Some(state) => state,
        None => load_thread(api, &user.user_id, other).await?,
    };
    let receiver = match find_counterpart(user, &state, other) {
        Some(found) => found,
        None => lookup_user(api, other).await,
    };
    let key = state.push_pending(&outgoing, user.summary(), receiver);
    session::store_thread(session, other, &state).await?;

    match api.send_message(&outgoing).await {
        Ok(sent) => {
            info!(from = %user.user_id, to = %other, id = ?sent.id, "message sent");
            state.confirm(key, sent);
        }
        Err(err) => {
            warn!(from = %user.user_id, to = %other, "send failed: {err:#}");
            state.discard(key);
            session::set_flash(session, "Message could not be sent.").await?;
        }
    }
    session::store_thread(session, other, &state).await?;
    Ok(())
}

fn find_counterpart(user: &SessionUser, state: &ThreadState, other: &UserId) -> Option<UserSummary> {
    state
        .messages()
        .filter_map(|m| counterpart(&user.user_id, m))
        .find(|u| &u.id == other)
        .cloned()
}

/// For threads with no messages yet, where the name has to come from the
/// user directory instead.
async fn lookup_user<T: MessageTransport>(api: &T, id: &UserId) -> UserSummary {
    let found = match api.find_user(id).await {
        Ok(found) => found,
        Err(err) => {
            warn!(user = %id, "user directory unavailable: {err:#}");
            None
        }
    };
    found.unwrap_or_else(|| UserSummary {
        id: id.clone(),
        full_name: String::new(),
        role: None,
        email: None,
    })
}

fn render_thread(user: &SessionUser, state: &ThreadState) -> String {
    if state.is_empty() {
        return "<p class='empty'>No messages found</p>".to_owned();
    }

    let mut out = String::new();
    for entry in state.entries() {
        let message = entry.message();
        let mine = message.is_from(&user.user_id);
        let author = if mine {
            "You"
        } else {
            message.sender.as_ref().map(UserSummary::display_name).unwrap_or("Unknown User")
        };
        let status = if entry.is_pending() { "sending…" } else { "" };

        out += &include_res!(str, "/pages/message.html")
            .replace("{side}", if mine { "mine" } else { "theirs" })
            .replace("{author}", &escape(author))
            .replace("{when}", &escape(&display_timestamp(message.timestamp.as_deref())))
            .replace("{status}", status)
            .replace("{content}", &res::markdown(&message.content));
    }
    out
}
