use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::warn;

use crate::{
    assembler::ConversationSummary,
    auth::{local_path, to_login},
    backend::Backend,
    include_res,
    models::{display_timestamp, UserId, UserSummary},
    res::{self, escape},
    role::Role,
    session,
    transport::load_inbox,
    AppResult, AppState,
};

use super::chat::send_to;

#[derive(Deserialize)]
pub(crate) struct NewMessageForm {
    receiver_id: String,
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn inbox(
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["messages"]).into_response());
    };
    let api = backend.authed(&user);

    let (summaries, users) = tokio::join!(load_inbox(&api, &user.user_id), api.all_users());
    let summaries = summaries?;
    let users = users.unwrap_or_else(|err| {
        warn!(user = %user.user_id, "could not list recipients: {err:#}");
        Vec::new()
    });

    let flash = res::flash(&session).await?;

    Ok(res::page(
        "Messages",
        &include_res!(str, "/pages/inbox.html")
            .replace("{flash}", &flash)
            .replace("{conversations}", &conversation_items(&summaries))
            .replace("{recipients}", &recipient_options(&user.user_id, &users)),
    ).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn start_conversation(
    State(backend): State<Backend>,
    session: Session,
    Form(NewMessageForm { receiver_id, content }): Form<NewMessageForm>,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["messages"]).into_response());
    };
    if receiver_id.trim().is_empty() {
        session::set_flash(&session, "Pick someone to write to.").await?;
        return Ok(Redirect::to("/messages").into_response());
    }

    let other = UserId::new(receiver_id.trim());
    send_to(&session, &backend.authed(&user), &user, &other, &content).await?;
    Ok(Redirect::to(&local_path(&["chat", other.as_str()])).into_response())
}

fn conversation_items(summaries: &[ConversationSummary]) -> String {
    if summaries.is_empty() {
        return "<li class='empty'>No conversations yet.</li>".to_owned();
    }
    summaries
        .iter()
        .map(|s| {
            include_res!(str, "/pages/inbox_item.html")
                .replace("{id}", &escape(s.counterpart.id.as_str()))
                .replace("{name}", &escape(s.counterpart.display_name()))
                .replace("{class}", Role::css_class(s.counterpart.role))
                .replace("{role}", s.counterpart.role.map(Role::label).unwrap_or(""))
                .replace("{preview}", &escape(s.preview()))
                .replace("{when}", &escape(&display_timestamp(s.last_timestamp.as_deref())))
        })
        .collect()
}

fn recipient_options(me: &UserId, users: &[UserSummary]) -> String {
    users
        .iter()
        .filter(|u| &u.id != me)
        .map(|u| {
            format!(
                "<option value='{}'>{}{}</option>",
                escape(u.id.as_str()),
                escape(u.display_name()),
                u.role.map(|r| format!(" ({})", r.label())).unwrap_or_default(),
            )
        })
        .collect()
}
