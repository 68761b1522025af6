use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_PRINCIPAL")]
    Principal,
    #[serde(rename = "ROLE_TEACHER")]
    Teacher,
    #[serde(rename = "ROLE_STUDENT")]
    Student,
}

impl Role {
    pub fn as_wire(self) -> &'static str {
        match self {
            Role::Principal => "ROLE_PRINCIPAL",
            Role::Teacher => "ROLE_TEACHER",
            Role::Student => "ROLE_STUDENT",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Principal => "Principal",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
        }
    }

    pub fn dashboard_title(self) -> &'static str {
        match self {
            Role::Principal => "Principal dashboard",
            Role::Teacher => "Teacher dashboard",
            Role::Student => "Student dashboard",
        }
    }

    /// The kind of account this role may register: principals add teachers,
    /// teachers add students.
    pub fn registers(self) -> Option<Role> {
        match self {
            Role::Principal => Some(Role::Teacher),
            Role::Teacher => Some(Role::Student),
            Role::Student => None,
        }
    }

    /// Css class used for avatars and inbox rows.
    pub fn css_class(role: Option<Role>) -> &'static str {
        match role {
            Some(Role::Principal) => "role-principal",
            Some(Role::Teacher) => "role-teacher",
            Some(Role::Student) => "role-student",
            None => "role-unknown",
        }
    }

    /// For user records from the backend, where a missing or foreign role
    /// string should not fail the whole payload.
    pub fn deserialize_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Role>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|r| r.parse().ok()))
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().trim_start_matches("ROLE_") {
            "PRINCIPAL" => Ok(Role::Principal),
            "TEACHER" => Ok(Role::Teacher),
            "STUDENT" => Ok(Role::Student),
            _ => Err(anyhow::anyhow!("unrecognized role {s:?}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
