use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{backend::Backend, include_res, res, session::{self, SessionUser}, AppResult};

use super::local_return_url;

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    email: String,
    password: String,
    return_url: Option<String>,
}

#[debug_handler]
pub(crate) async fn login_page(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    session: Session,
) -> AppResult<Response> {
    if session::current(&session).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let flash = res::flash(&session).await?;
    let return_url = local_return_url(return_url).unwrap_or_default();

    Ok(res::page(
        "Log in",
        &include_res!(str, "/pages/login.html")
            .replace("{flash}", &flash)
            .replace("{return_url}", &res::escape(&return_url)),
    ).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(backend): State<Backend>,
    session: Session,
    Form(LoginForm { email, password, return_url }): Form<LoginForm>,
) -> AppResult<Response> {
    let token = match backend.login(email.trim(), &password).await {
        Ok(token) => token,
        Err(err) => {
            warn!(%email, "login rejected: {err:#}");
            session::set_flash(&session, "Invalid email or password.").await?;
            return Ok(Redirect::to("/login").into_response());
        }
    };

    let me = backend.with_token(token.clone()).me().await?;
    let Some(role) = me.role else {
        warn!(user = %me.id, "account has no dashboard role");
        session::set_flash(&session, "This account has no dashboard.").await?;
        return Ok(Redirect::to("/login").into_response());
    };

    info!(user = %me.id, %role, "logged in");
    session::login(&session, SessionUser {
        token,
        user_id: me.id,
        full_name: me.full_name,
        role,
    }).await?;

    let target = local_return_url(return_url).unwrap_or_else(|| "/dashboard".to_owned());
    Ok(Redirect::to(&target).into_response())
}
