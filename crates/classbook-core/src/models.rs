//! Data models for classbook
//!
//! Records stored in the document tree. Field names match the persisted
//! JSON, so every struct round-trips through `serde_json::Value` as-is.
//! Missing fields fall back to their defaults: older documents often carry
//! only a subset.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown semester '{0}' (expected 'winter' or 'summer')")]
    UnknownSemester(String),

    #[error("Unknown semester scope '{0}' (expected 'both', 'winter' or 'summer')")]
    UnknownScope(String),

    #[error("Invalid school year key '{0}' (expected YYYY_YYYY)")]
    InvalidYearKey(String),
}

/// One half of a school year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Semester {
    Winter,
    Summer,
}

impl Semester {
    pub const ALL: [Semester; 2] = [Semester::Winter, Semester::Summer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::Winter => "winter",
            Semester::Summer => "summer",
        }
    }
}

impl FromStr for Semester {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "winter" => Ok(Semester::Winter),
            "summer" => Ok(Semester::Summer),
            _ => Err(ModelError::UnknownSemester(s.to_string())),
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which semesters a subject is taught in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemesterScope {
    #[default]
    Both,
    Winter,
    Summer,
}

impl SemesterScope {
    /// Semesters covered by this scope, winter first
    pub fn semesters(&self) -> &'static [Semester] {
        match self {
            SemesterScope::Both => &Semester::ALL,
            SemesterScope::Winter => &[Semester::Winter],
            SemesterScope::Summer => &[Semester::Summer],
        }
    }

    pub fn contains(&self, semester: Semester) -> bool {
        self.semesters().contains(&semester)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemesterScope::Both => "both",
            SemesterScope::Winter => "winter",
            SemesterScope::Summer => "summer",
        }
    }
}

impl FromStr for SemesterScope {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "both" => Ok(SemesterScope::Both),
            "winter" => Ok(SemesterScope::Winter),
            "summer" => Ok(SemesterScope::Summer),
            _ => Err(ModelError::UnknownScope(s.to_string())),
        }
    }
}

impl fmt::Display for SemesterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated school year key such as `2025_2026`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearKey(String);

impl YearKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display name for the year, e.g. `2025/2026`
    pub fn display_name(&self) -> String {
        self.0.replace('_', "/")
    }
}

impl FromStr for YearKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if schema::is_year_key(s) {
            Ok(YearKey(s.to_string()))
        } else {
            Err(ModelError::InvalidYearKey(s.to_string()))
        }
    }
}

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for YearKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A subject taught in one school year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    pub name: String,
    #[serde(rename = "teacherId")]
    pub teacher_id: String,
    pub semester: SemesterScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timetable: Option<Vec<String>>,
}

impl Subject {
    pub fn new(name: impl Into<String>, scope: SemesterScope) -> Self {
        Self {
            name: name.into(),
            semester: scope,
            ..Self::default()
        }
    }

    pub fn with_teacher(mut self, teacher_id: impl Into<String>) -> Self {
        self.teacher_id = teacher_id.into();
        self
    }
}

/// Enrollment lists: year -> semester -> subject keys
pub type Enrollments = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// A student record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Student {
    pub name: String,
    pub email: String,
    pub subjects: Enrollments,
}

impl Student {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            subjects: Enrollments::new(),
        }
    }

    /// Subject keys the student takes in one (year, semester) bucket
    pub fn enrolled_in(&self, year: &str, semester: Semester) -> &[String] {
        self.subjects
            .get(year)
            .and_then(|semesters| semesters.get(semester.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A mark given in one subject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mark {
    pub grade: String,
    pub title: String,
    pub description: String,
    pub note: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Mark {
    /// Create a mark stamped with the current time
    pub fn new(grade: impl Into<String>) -> Self {
        Self {
            grade: grade.into(),
            timestamp: Utc::now().timestamp_millis(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// One attendance record for one lesson
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceEntry {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub note: String,
    pub absent: bool,
}

impl AttendanceEntry {
    pub fn new(date: NaiveDate, time: impl Into<String>, absent: bool) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            time: time.into(),
            note: String::new(),
            absent,
        }
    }
}

/// A day with no lessons
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayOff {
    pub date: String,
    pub reason: String,
}

impl DayOff {
    pub fn new(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            reason: reason.into(),
        }
    }
}

/// A student's booking of a teacher's consultation slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultationBooking {
    #[serde(rename = "teacherId")]
    pub teacher_id: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub date: String,
    pub time: String,
    pub note: String,
}

/// A teacher, stored in the tree as `"email, name"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub email: String,
    pub name: String,
}

impl Teacher {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// The persisted `"email, name"` form
    pub fn to_entry(&self) -> String {
        format!("{}, {}", self.email, self.name)
    }

    /// Split a persisted entry; an entry without a comma is all email
    pub fn from_entry(entry: &str) -> Self {
        match entry.split_once(',') {
            Some((email, name)) => Self::new(email.trim(), name.trim()),
            None => Self::new(entry.trim(), ""),
        }
    }
}
