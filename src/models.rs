use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::{format_description::well_known::{Iso8601, Rfc3339}, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use crate::role::Role;

/// Ids arrive as JSON numbers from the backend but travel as strings
/// through urls, forms and the session, so both shapes are accepted.
macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Int(i64),
                    Text(String),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Int(n) => Self(n.to_string()),
                    Raw::Text(s) => Self(s),
                })
            }
        }
    };
}

string_id!(UserId);
string_id!(MessageId);
string_id!(SubjectId);
string_id!(AnnouncementId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, deserialize_with = "Role::deserialize_lenient")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserSummary {
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            "Unknown User"
        } else {
            &self.full_name
        }
    }
}

/// A message as the backend returns it. Every field except `content` may be
/// missing on records that were built locally or came back malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: Option<MessageId>,
    #[serde(default)]
    pub sender: Option<UserSummary>,
    #[serde(default)]
    pub receiver: Option<UserSummary>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Message {
    /// Parsed `timestamp`, `None` when absent or unparseable.
    pub fn instant(&self) -> Option<OffsetDateTime> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    pub fn is_from(&self, user: &UserId) -> bool {
        self.sender.as_ref().is_some_and(|s| &s.id == user)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a backend listing one record at a time. Records that do not fit
/// `T` are dropped so one bad row cannot take the whole page down.
pub fn decode_each<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!("skipping malformed {} record: {err}", std::any::type_name::<T>());
                None
            }
        })
        .collect()
}

/// Accepts RFC 3339 and offset-less ISO 8601 date-times (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t);
    }
    PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Human form for pages, falls back to the raw string.
pub fn display_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    parse_timestamp(raw)
        .and_then(|t| t.format(&format).ok())
        .unwrap_or_else(|| raw.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

impl OutgoingMessage {
    pub fn new(sender_id: UserId, receiver_id: UserId, content: &str) -> anyhow::Result<Self> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("refusing to send an empty message");
        }
        Ok(Self { sender_id, receiver_id, content: content.to_owned() })
    }
}

/// The parts of the send response the client relies on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    #[serde(default)]
    pub id: Option<MessageId>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Account creation as sent to `/auth/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: &'static str,
}

impl NewUser {
    pub fn new(role: Role, full_name: &str, email: &str, password: &str) -> anyhow::Result<Self> {
        let (full_name, email) = (full_name.trim(), email.trim());
        if full_name.is_empty() || email.is_empty() || password.is_empty() {
            anyhow::bail!("name, email and password are all required");
        }
        Ok(Self {
            full_name: full_name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            role: role.as_wire().trim_start_matches("ROLE_"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub name: String,
    pub year: i32,
    pub grade: String,
    pub subject_class: String,
}

impl NewSubject {
    pub fn new(name: &str, year: &str, grade: &str, subject_class: &str) -> anyhow::Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("a subject needs a name");
        }
        let year = year.trim().parse().map_err(|_| anyhow::anyhow!("year {year:?} is not a number"))?;
        Ok(Self {
            name: name.to_owned(),
            year,
            grade: grade.trim().to_owned(),
            subject_class: subject_class.trim().to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnouncement {
    pub subject_id: SubjectId,
    pub title: String,
    pub description: String,
    pub scheduled_for: String,
}

impl NewAnnouncement {
    /// `scheduled_for` is what a `datetime-local` input submits, with or
    /// without seconds. It is sent on as `YYYY-MM-DDTHH:MM:SS`.
    pub fn new(subject_id: SubjectId, title: &str, description: &str, scheduled_for: &str) -> anyhow::Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            anyhow::bail!("an announcement needs a title");
        }
        let input = time::macros::format_description!(
            "[year]-[month]-[day]T[hour]:[minute][optional [:[second]]]"
        );
        let output = time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        let when = PrimitiveDateTime::parse(scheduled_for.trim(), &input)
            .map_err(|err| anyhow::anyhow!("bad schedule {scheduled_for:?}: {err}"))?;
        Ok(Self {
            subject_id,
            title: title.to_owned(),
            description: description.trim().to_owned(),
            scheduled_for: when.format(&output)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub grade: Option<serde_json::Value>,
    #[serde(default)]
    pub subject_class: Option<serde_json::Value>,
    #[serde(default)]
    pub year: Option<serde_json::Value>,
    #[serde(default)]
    pub teacher: Option<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: AnnouncementId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scheduled_for: Option<String>,
}
