mod announcements;
mod attendance;
mod page;

use axum::{routing::{get, post}, Router};

use crate::{auth::local_path, models::SubjectId, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subjects", post(page::create))
        .route("/subjects/{id}", get(page::subject))
        .route("/subjects/{id}/enroll", post(page::enroll))
        .route("/subjects/{id}/announcements", post(announcements::create))
        .route("/subjects/{id}/announcements/{announcement}/delete", post(announcements::delete))
        .route("/subjects/{id}/attendance", get(attendance::mark_page).post(attendance::mark))
        .route("/subjects/{id}/attendance/review", get(attendance::review_page))
        .route("/subjects/{id}/attendance/nudge/{student}", post(attendance::nudge))
}

pub(crate) fn subject_path(id: &SubjectId) -> String {
    local_path(&["subjects", id.as_str()])
}
