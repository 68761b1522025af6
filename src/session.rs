use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    models::{UserId, UserSummary},
    role::Role,
    thread::ThreadState,
    AppResult,
};

pub const USER: &str = "user";
pub const FLASH: &str = "flash";

fn thread_key(counterpart: &UserId) -> String {
    format!("thread:{counterpart}")
}

/// Who is logged in and the bearer token the backend handed out for them.
/// Everything that talks to the backend on a user's behalf takes one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub token: String,
    pub user_id: UserId,
    pub full_name: String,
    pub role: Role,
}

impl SessionUser {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.user_id.clone(),
            full_name: self.full_name.clone(),
            role: Some(self.role),
            email: None,
        }
    }
}

pub async fn current(session: &Session) -> AppResult<Option<SessionUser>> {
    Ok(session.get::<SessionUser>(USER).await?)
}

pub async fn login(session: &Session, user: SessionUser) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER, user).await?;
    Ok(())
}

pub async fn thread(session: &Session, counterpart: &UserId) -> AppResult<Option<ThreadState>> {
    Ok(session.get::<ThreadState>(&thread_key(counterpart)).await?)
}

pub async fn store_thread(session: &Session, counterpart: &UserId, state: &ThreadState) -> AppResult<()> {
    session.insert(&thread_key(counterpart), state).await?;
    Ok(())
}

pub async fn take_flash(session: &Session) -> AppResult<Option<String>> {
    Ok(session.remove::<String>(FLASH).await?)
}

pub async fn set_flash(session: &Session, message: impl Into<String>) -> AppResult<()> {
    session.insert(FLASH, message.into()).await?;
    Ok(())
}
