//! Tree layout
//!
//! The store itself knows nothing about schools. This module holds the path
//! conventions the domain layer and the migrations agree on.
//!
//! ```text
//! students/{uid}                      name, email, subjects/{year}/{semester} -> [subjectKey]
//! grades/{year}/{semester}/{subject}/{uid}/{markId}
//! attendance/{year}/{semester}/{subject}/{uid}/{dateOrId}
//! school_years/{year}                 name, subjects/{subjectKey}
//! teachers/{uid}                      "email, name"
//! admins/{uid}                        true
//! subjects/{subjectKey}               legacy, hoisted into years by migration
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::tree_path;

/// Keys used in the document tree
pub mod keys {
    pub const STUDENTS: &str = "students";
    pub const GRADES: &str = "grades";
    pub const ATTENDANCE: &str = "attendance";
    pub const TEACHERS: &str = "teachers";
    pub const ADMINS: &str = "admins";
    pub const SCHOOL_YEARS: &str = "school_years";
    pub const SETTINGS: &str = "settings";
    pub const DAYS_OFF: &str = "days_off";
    pub const CONSULTATION_BOOKINGS: &str = "consultation_bookings";

    /// Flat subject table from before subjects were scoped per year
    pub const LEGACY_SUBJECTS: &str = "subjects";

    // Record fields
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const SUBJECTS: &str = "subjects";
    pub const SEMESTER: &str = "semester";
    pub const TEACHER_ID: &str = "teacherId";
    pub const TIMETABLE: &str = "timetable";
}

/// Top-level keys present in a freshly initialized tree
pub const DEFAULT_TOP_LEVEL: &[&str] = &[
    keys::STUDENTS,
    keys::GRADES,
    keys::ATTENDANCE,
    keys::TEACHERS,
    keys::ADMINS,
    keys::SCHOOL_YEARS,
    keys::SETTINGS,
    keys::DAYS_OFF,
    keys::CONSULTATION_BOOKINGS,
];

static YEAR_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}_\d{4}$").expect("valid year key regex"));

/// Whether `key` looks like a school year key (`YYYY_YYYY`)
pub fn is_year_key(key: &str) -> bool {
    YEAR_KEY_RE.is_match(key)
}

/// Build the tree a new installation starts with
pub fn default_tree() -> Value {
    let root: Map<String, Value> = DEFAULT_TOP_LEVEL
        .iter()
        .map(|key| (key.to_string(), Value::Object(Map::new())))
        .collect();
    Value::Object(root)
}

pub fn student(uid: &str) -> String {
    tree_path![keys::STUDENTS, uid]
}

/// Enrollment list for one student in one (year, semester) bucket
pub fn enrollment(uid: &str, year: &str, semester: &str) -> String {
    tree_path![keys::STUDENTS, uid, keys::SUBJECTS, year, semester]
}

pub fn school_year(year: &str) -> String {
    tree_path![keys::SCHOOL_YEARS, year]
}

pub fn year_subjects(year: &str) -> String {
    tree_path![keys::SCHOOL_YEARS, year, keys::SUBJECTS]
}

pub fn year_subject(year: &str, subject_key: &str) -> String {
    tree_path![keys::SCHOOL_YEARS, year, keys::SUBJECTS, subject_key]
}

/// Subtree holding every student's entries for one subject in one bucket.
///
/// `root` is either [`keys::GRADES`] or [`keys::ATTENDANCE`].
pub fn subject_bucket(root: &str, year: &str, semester: &str, subject_key: &str) -> String {
    tree_path![root, year, semester, subject_key]
}

pub fn student_bucket(
    root: &str,
    year: &str,
    semester: &str,
    subject_key: &str,
    uid: &str,
) -> String {
    tree_path![root, year, semester, subject_key, uid]
}

pub fn teacher(uid: &str) -> String {
    tree_path![keys::TEACHERS, uid]
}

pub fn admin(uid: &str) -> String {
    tree_path![keys::ADMINS, uid]
}
