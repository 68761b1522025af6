use anyhow::Context;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    attendance::{AttendanceMark, AttendanceRecord},
    models::{
        decode_each, Announcement, AnnouncementId, Message, NewAnnouncement, NewSubject, NewUser, OutgoingMessage,
        SentMessage, Subject, SubjectId, UserId, UserSummary,
    },
    session::SessionUser,
    transport::MessageTransport,
    GetField,
};

/// Http client for the school REST backend.
#[derive(Clone)]
pub struct Backend {
    http: Client,
    base_url: String,
}

impl Backend {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("schoolhouse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Exchanges credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let body: Value = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get_str_field("token")
    }

    /// Calls made on behalf of the given user.
    pub fn authed(&self, user: &SessionUser) -> AuthedBackend {
        self.with_token(user.token.clone())
    }

    /// Used right after login, before a [`SessionUser`] exists.
    pub fn with_token(&self, token: String) -> AuthedBackend {
        AuthedBackend { backend: self.clone(), token }
    }
}

#[derive(Clone)]
pub struct AuthedBackend {
    backend: Backend,
    token: String,
}

impl AuthedBackend {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.backend
            .http
            .request(method, self.backend.url(path))
            .bearer_auth(&self.token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.fetch(self.request(reqwest::Method::GET, path), path).await
    }

    /// Listings are decoded record by record, see [`decode_each`].
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Vec<T>> {
        self.fetch_list(self.request(reqwest::Method::GET, path), path).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> anyhow::Result<T> {
        self.fetch(self.request(reqwest::Method::POST, path).json(body), path).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> anyhow::Result<T> {
        self.execute(request, path)
            .await?
            .json()
            .await
            .with_context(|| format!("unexpected body from {path}"))
    }

    async fn fetch_list<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> anyhow::Result<Vec<T>> {
        let values: Vec<Value> = self.fetch(request, path).await?;
        Ok(decode_each(values))
    }

    /// Sends `request` and checks the status; the body is left to the caller.
    async fn execute(&self, request: RequestBuilder, path: &str) -> anyhow::Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?
            .error_for_status()?;
        debug!(path, status = %response.status(), "backend responded");
        Ok(response)
    }

    pub async fn me(&self) -> anyhow::Result<UserSummary> {
        self.get("/users/me").await
    }

    pub async fn all_users(&self) -> anyhow::Result<Vec<UserSummary>> {
        self.get_list("/users/all").await
    }

    pub async fn register(&self, user: &NewUser) -> anyhow::Result<()> {
        let path = "/auth/signup";
        self.execute(self.request(reqwest::Method::POST, path).json(user), path).await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: &UserId) -> anyhow::Result<()> {
        let path = format!("/auth/delete/{id}");
        self.execute(self.request(reqwest::Method::DELETE, &path), &path).await?;
        Ok(())
    }

    pub async fn my_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        self.get_list("/api/subjects/my-subjects").await
    }

    pub async fn enrolled_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        self.get_list("/api/subjects/enrolled").await
    }

    pub async fn all_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        self.get_list("/api/subjects/all").await
    }

    pub async fn subject(&self, id: &SubjectId) -> anyhow::Result<Subject> {
        self.get(&format!("/api/subjects/{id}")).await
    }

    pub async fn create_subject(&self, subject: &NewSubject) -> anyhow::Result<Subject> {
        self.post("/api/subjects/create", subject).await
    }

    pub async fn enrolled_students(&self, subject: &SubjectId) -> anyhow::Result<Vec<UserSummary>> {
        self.get_list(&format!("/api/subjects/{subject}/students")).await
    }

    pub async fn is_enrolled(&self, subject: &SubjectId, student: &UserId) -> anyhow::Result<bool> {
        let path = format!("/api/subjects/{subject}/enrollment-status");
        let request = self
            .request(reqwest::Method::GET, &path)
            .query(&[("studentId", student.as_str())]);
        let body: Value = self.fetch(request, &path).await?;
        Ok(body.get("isEnrolled").and_then(Value::as_bool).unwrap_or(false))
    }

    pub async fn enroll(&self, subject: &SubjectId) -> anyhow::Result<()> {
        let path = format!("/api/subjects/{subject}/enroll");
        self.execute(self.request(reqwest::Method::POST, &path), &path).await?;
        Ok(())
    }

    pub async fn announcements(&self, subject: &SubjectId) -> anyhow::Result<Vec<Announcement>> {
        self.get_list(&format!("/api/announcements/subject/{subject}")).await
    }

    pub async fn create_announcement(&self, announcement: &NewAnnouncement) -> anyhow::Result<Announcement> {
        self.post("/api/announcements/create", announcement).await
    }

    pub async fn delete_announcement(&self, id: &AnnouncementId) -> anyhow::Result<()> {
        let path = format!("/api/announcements/delete/{id}");
        self.execute(self.request(reqwest::Method::DELETE, &path), &path).await?;
        Ok(())
    }

    pub async fn mark_attendance(&self, marks: &[AttendanceMark]) -> anyhow::Result<()> {
        let path = "/api/attendance/mark";
        self.execute(self.request(reqwest::Method::POST, path).json(marks), path).await?;
        Ok(())
    }

    /// Whether attendance for today was already submitted for `subject`.
    pub async fn attendance_submitted(&self, subject: &SubjectId) -> anyhow::Result<bool> {
        let body: Value = self.get(&format!("/api/attendance/status/{subject}")).await?;
        Ok(body.get("attendanceSubmitted").and_then(Value::as_bool).unwrap_or(false))
    }

    pub async fn attendance_dates(&self, subject: &SubjectId) -> anyhow::Result<Vec<String>> {
        self.get_list(&format!("/api/attendance/subject/{subject}/dates")).await
    }

    pub async fn attendance_on(&self, subject: &SubjectId, date: &str) -> anyhow::Result<Vec<AttendanceRecord>> {
        let path = format!("/api/attendance/subject/{subject}");
        let request = self.request(reqwest::Method::GET, &path).query(&[("date", date)]);
        self.fetch_list(request, &path).await
    }
}

impl MessageTransport for AuthedBackend {
    async fn messages_for_user(&self, user: &UserId) -> anyhow::Result<Vec<Message>> {
        self.get_list(&format!("/api/messages/user/{user}")).await
    }

    async fn conversation(&self, sender: &UserId, receiver: &UserId) -> anyhow::Result<Vec<Message>> {
        let path = "/api/messages/conversation";
        let request = self
            .request(reqwest::Method::GET, path)
            .query(&[("senderId", sender.as_str()), ("receiverId", receiver.as_str())]);
        self.fetch_list(request, path).await
    }

    async fn send_message(&self, outgoing: &OutgoingMessage) -> anyhow::Result<SentMessage> {
        self.post("/api/messages/send", outgoing).await
    }

    async fn find_user(&self, id: &UserId) -> anyhow::Result<Option<UserSummary>> {
        Ok(self.all_users().await?.into_iter().find(|u| &u.id == id))
    }
}
