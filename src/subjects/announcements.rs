use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    auth::{not_allowed, to_login},
    backend::Backend,
    include_res,
    models::{display_timestamp, Announcement, AnnouncementId, NewAnnouncement, SubjectId},
    res::{self, escape},
    role::Role,
    session,
    AppResult, AppState,
};

use super::subject_path;

#[derive(Deserialize)]
pub(crate) struct AnnouncementForm {
    title: String,
    #[serde(default)]
    description: String,
    scheduled_for: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
    Form(form): Form<AnnouncementForm>,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id]).into_response());
    };
    let id = SubjectId::new(id);
    let back = subject_path(&id);
    if user.role != Role::Teacher {
        return not_allowed(&session, &back).await;
    }

    let announcement = match NewAnnouncement::new(id.clone(), &form.title, &form.description, &form.scheduled_for) {
        Ok(announcement) => announcement,
        Err(err) => {
            session::set_flash(&session, format!("Announcement not posted: {err}.")).await?;
            return Ok(Redirect::to(&back).into_response());
        }
    };

    match backend.authed(&user).create_announcement(&announcement).await {
        Ok(created) => {
            info!(teacher = %user.user_id, subject = %id, announcement = %created.id, "posted announcement");
        }
        Err(err) => {
            warn!(teacher = %user.user_id, subject = %id, "announcement failed: {err:#}");
            session::set_flash(&session, "Announcement not posted.").await?;
        }
    }
    Ok(Redirect::to(&back).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete(
    Path((id, announcement)): Path<(String, String)>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id]).into_response());
    };
    let back = subject_path(&SubjectId::new(id));
    if user.role != Role::Teacher {
        return not_allowed(&session, &back).await;
    }

    let announcement = AnnouncementId::new(announcement);
    if let Err(err) = backend.authed(&user).delete_announcement(&announcement).await {
        warn!(teacher = %user.user_id, %announcement, "announcement delete failed: {err:#}");
        session::set_flash(&session, "Could not delete that announcement.").await?;
    }
    Ok(Redirect::to(&back).into_response())
}

pub(super) fn announcement_items(subject: &SubjectId, announcements: &[Announcement], editable: bool) -> String {
    if announcements.is_empty() {
        return "<p class='empty'>No announcements.</p>".to_owned();
    }

    let mut items = String::new();
    for announcement in announcements {
        let actions = if editable {
            include_res!(str, "/pages/delete_announcement.html")
                .replace("{subject}", &escape(subject.as_str()))
                .replace("{id}", &escape(announcement.id.as_str()))
        } else {
            String::new()
        };
        items += &include_res!(str, "/pages/announcement.html")
            .replace("{title}", &escape(&announcement.title))
            .replace("{when}", &escape(&display_timestamp(announcement.scheduled_for.as_deref())))
            .replace("{body}", &res::markdown(&announcement.description))
            .replace("{actions}", &actions);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exam() -> Announcement {
        serde_json::from_value(json!({
            "id": 12,
            "title": "Exam",
            "description": "Bring **pens**",
            "scheduledFor": "2024-05-01T09:30:00"
        }))
        .unwrap()
    }

    #[test]
    fn teachers_get_delete_buttons() {
        let subject = SubjectId::new("3");
        let html = announcement_items(&subject, &[exam()], true);
        assert!(html.contains("/subjects/3/announcements/12/delete"));
        assert!(html.contains("<strong>pens</strong>"));
        assert!(html.contains("2024-05-01 09:30"));

        assert!(!announcement_items(&subject, &[exam()], false).contains("delete"));
        assert!(announcement_items(&subject, &[], true).contains("No announcements"));
    }
}
