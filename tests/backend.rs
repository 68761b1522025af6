use std::collections::HashMap;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use schoolhouse::{
    attendance::{review, AttendanceMark, AttendanceStatus},
    backend::Backend,
    models::{AnnouncementId, MessageId, NewAnnouncement, NewSubject, NewUser, OutgoingMessage, SubjectId, UserId},
    role::Role,
    transport::{load_thread, MessageTransport},
};
use serde_json::{json, Value};

const TOKEN: &str = "secret-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == "ada@school.test" && body["password"] == "pw" {
        Json(json!({ "token": TOKEN })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn me(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": 1, "fullName": "Ada", "email": "ada@school.test", "role": "ROLE_TEACHER" })).into_response()
}

fn wire_message(id: i64, from: i64, to: i64, content: &str, ts: &str) -> Value {
    json!({
        "id": id,
        "sender": { "id": from, "fullName": format!("User {from}"), "role": "ROLE_STUDENT" },
        "receiver": { "id": to, "fullName": format!("User {to}"), "role": "ROLE_TEACHER" },
        "content": content,
        "timestamp": ts,
    })
}

async fn conversation(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let sender = params.get("senderId").map(String::as_str);
    let receiver = params.get("receiverId").map(String::as_str);
    let body = match (sender, receiver) {
        (Some("1"), Some("2")) => json!([wire_message(10, 1, 2, "hi", "2024-01-01T10:00:00")]),
        (Some("2"), Some("1")) => json!([
            wire_message(11, 2, 1, "hey", "2024-01-01T10:05:00"),
            wire_message(10, 1, 2, "hi", "2024-01-01T10:00:00"),
        ]),
        _ => json!([]),
    };
    Json(body).into_response()
}

async fn send(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(body, json!({ "senderId": "1", "receiverId": "2", "content": "see you" }));
    Json(json!({ "id": 77, "timestamp": "2024-01-01T11:00:00", "content": "see you" })).into_response()
}

async fn messages_for_user(headers: HeaderMap, Path(id): Path<String>) -> impl IntoResponse {
    if !authorized(&headers) || id != "1" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        wire_message(10, 1, 2, "hi", "2024-01-01T10:00:00"),
        { "id": 12, "sender": { "fullName": "ghost" }, "content": "lost" },
        { "id": 13, "sender": { "id": 2, "fullName": "User 2" }, "receiver": { "id": 1 }, "content": null },
    ]))
    .into_response()
}

async fn signup(Json(body): Json<Value>) -> impl IntoResponse {
    assert_eq!(body, json!({
        "fullName": "Tom Pupil", "email": "tom@school.test", "password": "pw", "role": "STUDENT"
    }));
    Json(json!({ "id": 8, "fullName": "Tom Pupil", "role": "ROLE_STUDENT" }))
}

async fn create_subject(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(body, json!({ "name": "Physics", "year": 2024, "grade": "Grade 7", "subjectClass": "A" }));
    Json(json!({ "id": 3, "name": "Physics", "year": 2024 })).into_response()
}

async fn students(headers: HeaderMap, Path(id): Path<String>) -> impl IntoResponse {
    if !authorized(&headers) || id != "3" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!([
        { "id": 8, "fullName": "Tom Pupil", "email": "tom@school.test", "role": "ROLE_STUDENT" },
        { "id": 9, "fullName": "Sue Pupil", "email": "sue@school.test", "role": "ROLE_STUDENT" },
    ]))
    .into_response()
}

async fn create_announcement(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(body["scheduledFor"], "2024-05-01T09:30:00");
    let mut created = body;
    created["id"] = json!(12);
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn delete_announcement(headers: HeaderMap, Path(id): Path<String>) -> impl IntoResponse {
    match (authorized(&headers), id.as_str()) {
        (true, "12") => Json(json!("Announcement deleted")).into_response(),
        (true, _) => StatusCode::NOT_FOUND.into_response(),
        (false, _) => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn mark_attendance(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(body, json!([
        { "subjectId": "3", "studentId": "8", "status": "PRESENT", "comment": null },
        { "subjectId": "3", "studentId": "9", "status": "ABSENT", "comment": null },
    ]));
    Json(json!([])).into_response()
}

async fn attendance_status(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "attendanceSubmitted": true })).into_response()
}

async fn attendance_dates(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!(["2024-05-01", "2024-05-02"])).into_response()
}

async fn attendance_on(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let record = |student: i64, status: &str| json!({
        "date": params["date"],
        "student": { "id": student, "fullName": format!("Pupil {student}") },
        "status": status,
    });
    let body = match params.get("date").map(String::as_str) {
        Some("2024-05-01") => json!([record(8, "PRESENT"), record(9, "ABSENT")]),
        Some("2024-05-02") => json!([record(8, "PRESENT")]),
        _ => json!([]),
    };
    Json(body).into_response()
}

async fn spawn_backend() -> Backend {
    let router = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/users/me", get(me))
        .route("/api/messages/user/{id}", get(messages_for_user))
        .route("/api/messages/conversation", get(conversation))
        .route("/api/messages/send", post(send))
        .route("/api/subjects/create", post(create_subject))
        .route("/api/subjects/{id}/students", get(students))
        .route("/api/announcements/create", post(create_announcement))
        .route("/api/announcements/delete/{id}", delete(delete_announcement))
        .route("/api/attendance/mark", post(mark_attendance))
        .route("/api/attendance/status/{id}", get(attendance_status))
        .route("/api/attendance/subject/{id}", get(attendance_on))
        .route("/api/attendance/subject/{id}/dates", get(attendance_dates));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Backend::new(format!("http://{addr}/")).unwrap()
}

#[tokio::test]
async fn login_then_me_with_bearer_token() {
    let backend = spawn_backend().await;

    let token = backend.login("ada@school.test", "pw").await.unwrap();
    assert_eq!(token, TOKEN);

    let me = backend.with_token(token).me().await.unwrap();
    assert_eq!(me.id, UserId::new("1"));
    assert_eq!(me.role, Some(Role::Teacher));
}

#[tokio::test]
async fn bad_credentials_and_tokens_are_errors() {
    let backend = spawn_backend().await;

    assert!(backend.login("ada@school.test", "nope").await.is_err());
    assert!(backend.with_token("stale".into()).me().await.is_err());
}

#[tokio::test]
async fn thread_merges_directional_queries() {
    let backend = spawn_backend().await;
    let api = backend.with_token(TOKEN.into());

    let thread = load_thread(&api, &UserId::new("1"), &UserId::new("2")).await.unwrap();
    let ids: Vec<_> = thread
        .messages()
        .map(|m| m.id.as_ref().map(MessageId::to_string))
        .collect();
    assert_eq!(ids, vec![Some("10".to_owned()), Some("11".to_owned())]);
}

#[tokio::test]
async fn send_returns_server_id_and_timestamp() {
    let backend = spawn_backend().await;
    let api = backend.with_token(TOKEN.into());

    let outgoing = OutgoingMessage::new(UserId::new("1"), UserId::new("2"), " see you ").unwrap();
    let sent = api.send_message(&outgoing).await.unwrap();
    assert_eq!(sent.id, Some(MessageId::new("77")));
    assert_eq!(sent.timestamp.as_deref(), Some("2024-01-01T11:00:00"));
}

#[tokio::test]
async fn one_malformed_message_does_not_fail_the_listing() {
    let backend = spawn_backend().await;
    let api = backend.with_token(TOKEN.into());

    let messages = api.messages_for_user(&UserId::new("1")).await.unwrap();
    let ids: Vec<_> = messages
        .iter()
        .map(|m| m.id.as_ref().map(MessageId::to_string))
        .collect();
    assert_eq!(ids, vec![Some("10".to_owned()), Some("13".to_owned())]);
    assert_eq!(messages[1].content, "");
}

#[tokio::test]
async fn teacher_registers_a_student_and_creates_a_subject() {
    let backend = spawn_backend().await;
    let api = backend.with_token(TOKEN.into());

    let student = NewUser::new(Role::Student, "Tom Pupil", "tom@school.test", "pw").unwrap();
    api.register(&student).await.unwrap();

    let subject = NewSubject::new("Physics", "2024", "Grade 7", "A").unwrap();
    let created = api.create_subject(&subject).await.unwrap();
    assert_eq!(created.id, SubjectId::new("3"));
}

#[tokio::test]
async fn announcements_are_created_and_deleted() {
    let backend = spawn_backend().await;
    let api = backend.with_token(TOKEN.into());

    let draft = NewAnnouncement::new(SubjectId::new("3"), "Exam", "Bring pens", "2024-05-01T09:30").unwrap();
    let created = api.create_announcement(&draft).await.unwrap();
    assert_eq!(created.id, AnnouncementId::new("12"));
    assert_eq!(created.title, "Exam");

    api.delete_announcement(&created.id).await.unwrap();
    assert!(api.delete_announcement(&AnnouncementId::new("99")).await.is_err());
}

#[tokio::test]
async fn attendance_is_marked_and_reviewed() {
    let backend = spawn_backend().await;
    let api = backend.with_token(TOKEN.into());
    let subject = SubjectId::new("3");

    let students = api.enrolled_students(&subject).await.unwrap();
    assert_eq!(students.len(), 2);
    assert!(api.enrolled_students(&SubjectId::new("4")).await.is_err());

    let marks: Vec<_> = students
        .iter()
        .zip([AttendanceStatus::Present, AttendanceStatus::Absent])
        .map(|(s, status)| AttendanceMark {
            subject_id: subject.clone(),
            student_id: s.id.clone(),
            status,
            comment: None,
        })
        .collect();
    api.mark_attendance(&marks).await.unwrap();
    assert!(api.attendance_submitted(&subject).await.unwrap());

    let dates = api.attendance_dates(&subject).await.unwrap();
    let mut days = Vec::new();
    for date in &dates {
        days.push(api.attendance_on(&subject, date).await.unwrap());
    }
    let rows = review(&students, &days);
    assert_eq!(rows[0].percent_label(), "100.00%");
    assert_eq!(rows[1].percent_label(), "0.00%");
    assert_eq!(rows[1].days, vec![Some(AttendanceStatus::Absent), None]);
}
