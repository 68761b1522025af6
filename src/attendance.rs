//! Attendance marks and the per-student review built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{SubjectId, UserId, UserSummary};

/// Below this a student gets flagged and can be messaged from the review.
pub const POOR_BELOW: f64 = 70.0;
pub const EXCELLENT_FROM: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Form values are `PRESENT`/`ABSENT`; anything else counts as absent.
    pub fn from_form(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("present") => AttendanceStatus::Present,
            _ => AttendanceStatus::Absent,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

/// One row of a `/api/attendance/mark` submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub subject_id: SubjectId,
    pub student_id: UserId,
    pub status: AttendanceStatus,
    pub comment: Option<String>,
}

/// Marks for every enrolled student, absent unless the form says otherwise.
pub fn marks_from_form(subject: &SubjectId, students: &[UserSummary], form: &HashMap<String, String>) -> Vec<AttendanceMark> {
    students
        .iter()
        .map(|student| AttendanceMark {
            subject_id: subject.clone(),
            student_id: student.id.clone(),
            status: AttendanceStatus::from_form(form.get(&status_field(&student.id)).map(String::as_str)),
            comment: None,
        })
        .collect()
}

pub fn status_field(student: &UserId) -> String {
    format!("status_{student}")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub date: Option<String>,
    pub student: UserSummary,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Excellent,
    Average,
    Poor,
}

impl Standing {
    pub fn of(percent: f64) -> Self {
        if percent >= EXCELLENT_FROM {
            Standing::Excellent
        } else if percent >= POOR_BELOW {
            Standing::Average
        } else {
            Standing::Poor
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Standing::Excellent => "standing-excellent",
            Standing::Average => "standing-average",
            Standing::Poor => "standing-poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentAttendance {
    pub student: UserSummary,
    /// One cell per conducted date, `None` when nothing was recorded.
    pub days: Vec<Option<AttendanceStatus>>,
    pub percent: f64,
}

impl StudentAttendance {
    pub fn standing(&self) -> Standing {
        Standing::of(self.percent)
    }

    pub fn percent_label(&self) -> String {
        format!("{:.2}%", self.percent)
    }
}

/// Crosses enrolled students with the records of each conducted date.
///
/// `days[i]` holds the records for the i-th conducted date. A student with
/// no record on a date counts as not present; no dates at all is 0%.
pub fn review(students: &[UserSummary], days: &[Vec<AttendanceRecord>]) -> Vec<StudentAttendance> {
    let by_day: Vec<HashMap<&UserId, AttendanceStatus>> = days
        .iter()
        .map(|records| records.iter().map(|r| (&r.student.id, r.status)).collect())
        .collect();

    students
        .iter()
        .map(|student| {
            let days: Vec<_> = by_day.iter().map(|day| day.get(&student.id).copied()).collect();
            let present = days.iter().filter(|d| **d == Some(AttendanceStatus::Present)).count();
            let percent = if days.is_empty() {
                0.0
            } else {
                present as f64 / days.len() as f64 * 100.0
            };
            StudentAttendance { student: student.clone(), days, percent }
        })
        .collect()
}

/// What a teacher sends a student whose attendance is poor.
pub fn nudge_message(subject: &str, subject_id: &SubjectId, teacher: &str, percent: &str) -> String {
    format!(
        "Your current attendance percentage for the subject \"{subject}\" (ID: {subject_id}) \
         conducted by {teacher} is {percent}. Please ensure to maintain good attendance."
    )
}
