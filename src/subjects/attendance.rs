use std::collections::HashMap;

use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use futures_util::future::try_join_all;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    attendance::{marks_from_form, nudge_message, review, status_field, Standing, StudentAttendance},
    auth::{local_path, not_allowed, to_login},
    backend::{AuthedBackend, Backend},
    dashboard::subject_details,
    include_res,
    messages::send_to,
    models::{Subject, SubjectId, UserId},
    res::{self, escape},
    role::Role,
    session,
    AppResult, AppState,
};

use super::subject_path;

/// Everything the review table needs, with `rows` in enrollment order.
struct Review {
    subject: Subject,
    dates: Vec<String>,
    rows: Vec<StudentAttendance>,
}

async fn load_review(api: &AuthedBackend, id: &SubjectId) -> anyhow::Result<Review> {
    let (subject, students, dates) = tokio::try_join!(
        api.subject(id),
        api.enrolled_students(id),
        api.attendance_dates(id),
    )?;
    let days = try_join_all(dates.iter().map(|date| api.attendance_on(id, date))).await?;
    Ok(Review { rows: review(&students, &days), subject, dates })
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_page(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id, "attendance"]).into_response());
    };
    let id = SubjectId::new(id);
    if user.role != Role::Teacher {
        return not_allowed(&session, &subject_path(&id)).await;
    }
    let api = backend.authed(&user);

    let (subject, students) = match tokio::try_join!(api.subject(&id), api.enrolled_students(&id)) {
        Ok(found) => found,
        Err(err) => {
            warn!(subject = %id, "attendance sheet unavailable: {err:#}");
            return res::sorry("subject");
        }
    };

    let rows: String = students
        .iter()
        .map(|s| {
            include_res!(str, "/pages/attendance_mark_row.html")
                .replace("{name}", &escape(s.display_name()))
                .replace("{email}", &escape(s.email.as_deref().unwrap_or("")))
                .replace("{field}", &escape(&status_field(&s.id)))
        })
        .collect();

    Ok(res::page(
        &format!("Attendance for {}", subject.name),
        &include_res!(str, "/pages/attendance_mark.html")
            .replace("{subject}", &escape(id.as_str()))
            .replace("{name}", &escape(&subject.name))
            .replace("{rows}", &rows),
    ).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id, "attendance"]).into_response());
    };
    let id = SubjectId::new(id);
    let back = subject_path(&id);
    if user.role != Role::Teacher {
        return not_allowed(&session, &back).await;
    }
    let api = backend.authed(&user);

    let students = api.enrolled_students(&id).await?;
    if students.is_empty() {
        session::set_flash(&session, "Nobody is enrolled yet.").await?;
        return Ok(Redirect::to(&back).into_response());
    }

    let marks = marks_from_form(&id, &students, &form);
    match api.mark_attendance(&marks).await {
        Ok(()) => {
            info!(teacher = %user.user_id, subject = %id, students = marks.len(), "attendance submitted");
            session::set_flash(&session, "You successfully submitted today's attendance.").await?;
        }
        Err(err) => {
            warn!(teacher = %user.user_id, subject = %id, "attendance submit failed: {err:#}");
            session::set_flash(&session, "Attendance could not be submitted.").await?;
        }
    }
    Ok(Redirect::to(&back).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn review_page(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id, "attendance", "review"]).into_response());
    };
    let id = SubjectId::new(id);
    let can_nudge = match user.role {
        Role::Teacher => true,
        Role::Principal => false,
        Role::Student => return not_allowed(&session, &subject_path(&id)).await,
    };

    let review = match load_review(&backend.authed(&user), &id).await {
        Ok(review) => review,
        Err(err) => {
            warn!(subject = %id, "attendance review unavailable: {err:#}");
            return res::sorry("subject");
        }
    };
    let flash = res::flash(&session).await?;

    Ok(res::page(
        &format!("Attendance for {}", review.subject.name),
        &include_res!(str, "/pages/attendance_review.html")
            .replace("{subject}", &escape(id.as_str()))
            .replace("{name}", &escape(&review.subject.name))
            .replace("{details}", &escape(&subject_details(&review.subject)))
            .replace("{flash}", &flash)
            .replace("{dates}", &date_headers(&review.dates))
            .replace("{rows}", &review_rows(&id, &review.rows, can_nudge)),
    ).into_response())
}

/// Messages a student with poor attendance their current percentage.
#[debug_handler(state = AppState)]
pub(crate) async fn nudge(
    Path((id, student)): Path<(String, String)>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["subjects", &id, "attendance", "review"]).into_response());
    };
    let id = SubjectId::new(id);
    let back = local_path(&["subjects", id.as_str(), "attendance", "review"]);
    if user.role != Role::Teacher {
        return not_allowed(&session, &back).await;
    }
    let student = UserId::new(student);
    let api = backend.authed(&user);

    let review = load_review(&api, &id).await?;
    let Some(row) = review.rows.iter().find(|r| r.student.id == student) else {
        session::set_flash(&session, "That student is not enrolled here.").await?;
        return Ok(Redirect::to(&back).into_response());
    };
    if row.standing() != Standing::Poor {
        session::set_flash(&session, format!("{} is attending well enough.", row.student.display_name())).await?;
        return Ok(Redirect::to(&back).into_response());
    }

    let teacher = review
        .subject
        .teacher
        .as_ref()
        .map(|t| t.display_name().to_owned())
        .unwrap_or_else(|| user.full_name.clone());
    let content = nudge_message(&review.subject.name, &id, &teacher, &row.percent_label());
    send_to(&session, &api, &user, &student, &content).await?;
    Ok(Redirect::to(&local_path(&["chat", student.as_str()])).into_response())
}

fn date_headers(dates: &[String]) -> String {
    dates.iter().map(|d| format!("<th>{}</th>", escape(d))).collect()
}

fn review_rows(subject: &SubjectId, rows: &[StudentAttendance], can_nudge: bool) -> String {
    if rows.is_empty() {
        return "<tr><td class='empty' colspan='3'>No students enrolled.</td></tr>".to_owned();
    }
    rows.iter()
        .map(|row| {
            let days: String = row
                .days
                .iter()
                .map(|day| match day {
                    Some(status) => format!("<td>{}</td>", status.label()),
                    None => "<td>N/A</td>".to_owned(),
                })
                .collect();
            let actions = if can_nudge && row.standing() == Standing::Poor {
                include_res!(str, "/pages/nudge.html")
                    .replace("{subject}", &escape(subject.as_str()))
                    .replace("{student}", &escape(row.student.id.as_str()))
                    .replace("{name}", &escape(row.student.display_name()))
            } else {
                String::new()
            };
            include_res!(str, "/pages/attendance_review_row.html")
                .replace("{standing}", row.standing().css_class())
                .replace("{name}", &escape(row.student.display_name()))
                .replace("{email}", &escape(row.student.email.as_deref().unwrap_or("")))
                .replace("{days}", &days)
                .replace("{percent}", &row.percent_label())
                .replace("{actions}", &actions)
        })
        .collect()
}
