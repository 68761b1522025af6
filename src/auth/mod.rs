mod login;
mod logout;

use axum::{response::{IntoResponse, Redirect, Response}, routing::get, Router};
use reqwest::Url;
use tower_sessions::Session;

use crate::{session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(logout::logout))
}

/// Only same-site paths are followed after login or logout.
pub(crate) fn local_return_url(return_url: Option<String>) -> Option<String> {
    return_url.filter(|url| url.starts_with('/') && !url.starts_with("//"))
}

/// Same-site path from raw segments, each percent-encoded, with an
/// optional query.
pub(crate) fn local_url(segments: &[&str], query: &[(&str, &str)]) -> Option<String> {
    let mut url = Url::parse("http://localhost/").ok()?;
    url.path_segments_mut().ok()?.clear().extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Some(match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    })
}

pub(crate) fn local_path(segments: &[&str]) -> String {
    local_url(segments, &[]).unwrap_or_else(|| "/".to_owned())
}

/// Sends a visitor without a session to the login page, coming back to
/// `segments` afterwards.
pub(crate) fn to_login(segments: &[&str]) -> Redirect {
    let back = local_path(segments);
    Redirect::to(&local_url(&["login"], &[("return_url", &back)]).unwrap_or_else(|| "/login".to_owned()))
}

/// For actions the user's role does not allow: flashes why and sends them
/// back to `back`.
pub(crate) async fn not_allowed(session: &Session, back: &str) -> AppResult<Response> {
    session::set_flash(session, "Your role can't do that.").await?;
    Ok(Redirect::to(back).into_response())
}
