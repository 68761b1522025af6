mod chat;
mod inbox;

use axum::{routing::get, Router};

use crate::AppState;

pub(crate) use chat::send_to;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(inbox::inbox).post(inbox::start_conversation))
        .route("/chat/{id}", get(chat::chat).post(chat::send))
}
