use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, routing::{get, post}, Form, Router};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    auth::{not_allowed, to_login},
    backend::Backend,
    include_res,
    models::{NewUser, Subject, UserId, UserSummary},
    res::{self, escape},
    role::Role,
    session,
    AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/dashboard", get(dashboard))
        .route("/people", post(register))
        .route("/people/{id}/delete", post(remove))
}

#[derive(Deserialize)]
struct RegisterForm {
    full_name: String,
    email: String,
    password: String,
}

#[debug_handler]
async fn index(session: Session) -> AppResult<Redirect> {
    Ok(match session::current(&session).await? {
        Some(_) => Redirect::to("/dashboard"),
        None => Redirect::to("/login"),
    })
}

#[debug_handler(state = AppState)]
async fn dashboard(
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["dashboard"]).into_response());
    };
    let api = backend.authed(&user);

    let sections = match user.role {
        Role::Principal => {
            let (users, subjects) = tokio::try_join!(api.all_users(), api.all_subjects())?;
            let teachers: Vec<_> = users.iter().filter(|u| u.role == Some(Role::Teacher)).collect();
            let students: Vec<_> = users.iter().filter(|u| u.role == Some(Role::Student)).collect();
            [
                section("Teachers", &user_items(&teachers, true)),
                section("Students", &user_items(&students, true)),
                section("Subjects", &subject_items(&subjects)),
                register_form(Role::Teacher),
            ]
            .concat()
        }
        Role::Teacher => [
            section("My subjects", &subject_items(&api.my_subjects().await?)),
            subject_form(),
            register_form(Role::Student),
        ]
        .concat(),
        Role::Student => section("Enrolled subjects", &subject_items(&api.enrolled_subjects().await?)),
    };
    let flash = res::flash(&session).await?;

    Ok(res::page(
        user.role.dashboard_title(),
        &include_res!(str, "/pages/dashboard.html")
            .replace("{name}", &escape(&user.full_name))
            .replace("{role}", user.role.label())
            .replace("{flash}", &flash)
            .replace("{sections}", &sections),
    ).into_response())
}

#[debug_handler(state = AppState)]
async fn register(
    State(backend): State<Backend>,
    session: Session,
    Form(RegisterForm { full_name, email, password }): Form<RegisterForm>,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["dashboard"]).into_response());
    };
    let Some(role) = user.role.registers() else {
        return not_allowed(&session, "/dashboard").await;
    };

    let new_user = match NewUser::new(role, &full_name, &email, &password) {
        Ok(new_user) => new_user,
        Err(err) => {
            session::set_flash(&session, format!("Could not register: {err}.")).await?;
            return Ok(Redirect::to("/dashboard").into_response());
        }
    };

    match backend.authed(&user).register(&new_user).await {
        Ok(()) => {
            info!(by = %user.user_id, email = %new_user.email, %role, "registered account");
            session::set_flash(&session, format!("Registered {} as a {}.", new_user.full_name, role.label())).await?;
        }
        Err(err) => {
            warn!(by = %user.user_id, email = %new_user.email, "registration failed: {err:#}");
            session::set_flash(&session, "Registration failed.").await?;
        }
    }
    Ok(Redirect::to("/dashboard").into_response())
}

#[debug_handler(state = AppState)]
async fn remove(
    Path(id): Path<String>,
    State(backend): State<Backend>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current(&session).await? else {
        return Ok(to_login(&["dashboard"]).into_response());
    };
    if user.role != Role::Principal {
        return not_allowed(&session, "/dashboard").await;
    }
    let id = UserId::new(id);
    if id == user.user_id {
        session::set_flash(&session, "You can't remove your own account.").await?;
        return Ok(Redirect::to("/dashboard").into_response());
    }

    match backend.authed(&user).delete_user(&id).await {
        Ok(()) => {
            info!(by = %user.user_id, user = %id, "removed account");
            session::set_flash(&session, "Account removed.").await?;
        }
        Err(err) => {
            warn!(by = %user.user_id, user = %id, "removal failed: {err:#}");
            session::set_flash(&session, "Could not remove that account.").await?;
        }
    }
    Ok(Redirect::to("/dashboard").into_response())
}

fn section(title: &str, items: &str) -> String {
    format!("<section><h2>{}</h2><ul>{items}</ul></section>", escape(title))
}

fn register_form(role: Role) -> String {
    include_res!(str, "/pages/register_form.html").replace("{role}", &role.label().to_lowercase())
}

fn subject_form() -> String {
    include_res!(str, "/pages/subject_form.html").replace("{year}", &OffsetDateTime::now_utc().year().to_string())
}

fn user_items(users: &[&UserSummary], removable: bool) -> String {
    if users.is_empty() {
        return "<li class='empty'>Nobody yet.</li>".to_owned();
    }
    users
        .iter()
        .map(|u| {
            let id = escape(u.id.as_str());
            let actions = if removable {
                include_res!(str, "/pages/delete_user.html").replace("{id}", &id)
            } else {
                String::new()
            };
            include_res!(str, "/pages/user_item.html")
                .replace("{id}", &id)
                .replace("{name}", &escape(u.display_name()))
                .replace("{class}", Role::css_class(u.role))
                .replace("{actions}", &actions)
        })
        .collect()
}

pub(crate) fn subject_items(subjects: &[Subject]) -> String {
    if subjects.is_empty() {
        return "<li class='empty'>No subjects.</li>".to_owned();
    }
    subjects
        .iter()
        .map(|s| {
            include_res!(str, "/pages/subject_item.html")
                .replace("{id}", &escape(s.id.as_str()))
                .replace("{name}", &escape(&s.name))
                .replace("{details}", &escape(&subject_details(s)))
        })
        .collect()
}

pub(crate) fn subject_details(subject: &Subject) -> String {
    let mut parts = Vec::new();
    if let Some(grade) = text(&subject.grade) {
        parts.push(format!("grade {grade}"));
    }
    if let Some(class) = text(&subject.subject_class) {
        parts.push(format!("class {class}"));
    }
    if let Some(year) = text(&subject.year) {
        parts.push(year);
    }
    if let Some(teacher) = &subject.teacher {
        parts.push(teacher.display_name().to_owned());
    }
    parts.join(" · ")
}

// grade, class and year come back as strings or numbers depending on the record
fn text(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subject_details_skip_missing_parts() {
        let subject: Subject = serde_json::from_value(json!({
            "id": 3,
            "name": "Physics",
            "grade": 10,
            "subjectClass": "",
            "year": 2024,
            "teacher": { "id": 9, "fullName": "Marie Curie", "role": "ROLE_TEACHER" }
        }))
        .unwrap();
        assert_eq!(subject_details(&subject), "grade 10 · 2024 · Marie Curie");
    }

    #[test]
    fn empty_lists_render_placeholders() {
        assert!(subject_items(&[]).contains("No subjects"));
        assert!(user_items(&[], false).contains("Nobody yet"));
    }

    #[test]
    fn only_principal_lists_get_remove_buttons() {
        let ada = UserSummary { id: UserId::new("4"), full_name: "Ada".into(), role: Some(Role::Teacher), email: None };
        assert!(user_items(&[&ada], true).contains("/people/4/delete"));
        assert!(!user_items(&[&ada], false).contains("delete"));
    }

    #[test]
    fn register_form_names_the_role() {
        assert!(register_form(Role::Student).contains("Register a student"));
    }
}
