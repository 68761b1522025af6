use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    auth::{not_allowed, to_login},
    backend::Backend,
    dashboard::subject_details,
    include_res,
    models::{NewSubject, SubjectId, UserSummary},
    res::{self, escape},
    role::Role,
    session,
    AppResult, AppState,
};

use super::{announcements::announcement_items, subject_path};

#[derive(Deserialize)]
pub(crate) struct SubjectForm {
    name: String,
    year: String,
    #[serde(default)]
    grade: String,
    #[serde(default)]
    subject_class: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn subject(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id]).into_response());
    };
    let id = SubjectId::new(id);
    let api = backend.authed(&user);

    let (subject, announcements) = match tokio::try_join!(api.subject(&id), api.announcements(&id)) {
        Ok(found) => found,
        Err(err) => {
            warn!(subject = %id, "subject lookup failed: {err:#}");
            return res::sorry("subject");
        }
    };

    let (actions, students) = match user.role {
        Role::Teacher => {
            let (students, submitted) = tokio::join!(api.enrolled_students(&id), api.attendance_submitted(&id));
            (
                teacher_actions(&id, or_default(submitted, "attendance status", &id)),
                student_list(&or_default(students, "student list", &id)),
            )
        }
        Role::Principal => (
            String::new(),
            student_list(&or_default(api.enrolled_students(&id).await, "student list", &id)),
        ),
        Role::Student => {
            let enrolled = or_default(api.is_enrolled(&id, &user.user_id).await, "enrollment status", &id);
            (student_actions(&id, enrolled), String::new())
        }
    };
    let editable = user.role == Role::Teacher;
    let announcement_form = if editable {
        include_res!(str, "/pages/announcement_form.html").replace("{subject}", &escape(id.as_str()))
    } else {
        String::new()
    };
    let flash = res::flash(&session).await?;

    Ok(res::page(
        &subject.name,
        &include_res!(str, "/pages/subject.html")
            .replace("{name}", &escape(&subject.name))
            .replace("{details}", &escape(&subject_details(&subject)))
            .replace("{flash}", &flash)
            .replace("{actions}", &actions)
            .replace("{announcement_form}", &announcement_form)
            .replace("{announcements}", &announcement_items(&id, &announcements, editable))
            .replace("{students}", &students),
    ).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(backend): State<Backend>,
    session: Session,
    Form(form): Form<SubjectForm>,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["dashboard"]).into_response());
    };
    if user.role != Role::Teacher {
        return not_allowed(&session, "/dashboard").await;
    }

    let new_subject = match NewSubject::new(&form.name, &form.year, &form.grade, &form.subject_class) {
        Ok(new_subject) => new_subject,
        Err(err) => {
            session::set_flash(&session, format!("Could not create the subject: {err}.")).await?;
            return Ok(Redirect::to("/dashboard").into_response());
        }
    };

    match backend.authed(&user).create_subject(&new_subject).await {
        Ok(created) => {
            info!(teacher = %user.user_id, subject = %created.id, "created subject");
            Ok(Redirect::to(&subject_path(&created.id)).into_response())
        }
        Err(err) => {
            warn!(teacher = %user.user_id, name = %new_subject.name, "subject creation failed: {err:#}");
            session::set_flash(&session, "Could not create the subject.").await?;
            Ok(Redirect::to("/dashboard").into_response())
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn enroll(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id]).into_response());
    };
    let id = SubjectId::new(id);
    if user.role != Role::Student {
        return not_allowed(&session, &subject_path(&id)).await;
    }

    match backend.authed(&user).enroll(&id).await {
        Ok(()) => {
            info!(student = %user.user_id, subject = %id, "enrolled");
            session::set_flash(&session, "You are now enrolled.").await?;
        }
        Err(err) => {
            warn!(student = %user.user_id, subject = %id, "enrollment failed: {err:#}");
            session::set_flash(&session, "Enrollment failed.").await?;
        }
    }
    Ok(Redirect::to(&subject_path(&id)).into_response())
}

/// Secondary panels degrade to their empty form instead of failing the page.
fn or_default<T: Default>(result: anyhow::Result<T>, what: &str, subject: &SubjectId) -> T {
    result.unwrap_or_else(|err| {
        warn!(%subject, "{what} unavailable: {err:#}");
        T::default()
    })
}

fn teacher_actions(id: &SubjectId, submitted_today: bool) -> String {
    let id = escape(id.as_str());
    let mark = if submitted_today {
        "<span>Today's attendance is in.</span>".to_owned()
    } else {
        format!("<a href='/subjects/{id}/attendance'>Mark today's attendance</a>")
    };
    format!("<p>{mark} <a href='/subjects/{id}/attendance/review'>Review attendance</a></p>")
}

fn student_actions(id: &SubjectId, enrolled: bool) -> String {
    if enrolled {
        return "<p>You are enrolled in this subject.</p>".to_owned();
    }
    format!(
        "<form method='post' action='/subjects/{}/enroll'><button type='submit'>Enroll</button></form>",
        escape(id.as_str())
    )
}

fn student_list(students: &[UserSummary]) -> String {
    let items: String = if students.is_empty() {
        "<li class='empty'>No students enrolled.</li>".to_owned()
    } else {
        students
            .iter()
            .map(|s| {
                format!(
                    "<li><a href='/chat/{}'>{}</a> <small>{}</small></li>",
                    escape(s.id.as_str()),
                    escape(s.display_name()),
                    escape(s.email.as_deref().unwrap_or("")),
                )
            })
            .collect()
    };
    format!("<section><h2>Enrolled students</h2><ul>{items}</ul></section>")
}
