pub mod assembler;
pub mod attendance;
pub mod auth;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod messages;
pub mod models;
pub mod res;
pub mod role;
pub mod session;
pub mod subjects;
pub mod thread;
pub mod transport;

use anyhow::anyhow;
use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::{backend::Backend, config::Config};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub backend: Backend,
}

pub fn app(state: AppState, config: &Config) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_minutes)));

    Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(messages::router())
        .merge(subjects::router())
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| anyhow!("expected {field} in {self}"))?
            .as_str()
            .ok_or_else(|| anyhow!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
