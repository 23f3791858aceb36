//! Schema migrations
//!
//! Three routines restructure the tree between historical layouts:
//!
//! - [`hoist_subjects`]: copy the flat legacy `subjects` table into every
//!   school year that has none
//! - [`consolidate_students`]: fold per-year `students/{year}/{uid}` records
//!   into one global record per student
//! - [`reassign_semester`]: move enrollments, marks and attendance after a
//!   subject's semester scope changes
//!
//! Each routine works on any [`TreeAccess`] and is idempotent. Data is
//! copied before anything is deleted, so an interrupted run leaves the tree
//! at worst "not yet migrated". [`Migrator`] runs each routine inside a
//! store batch so a routine persists once.

pub mod semester;
pub mod students;
pub mod subjects;

pub use semester::{reassign_semester, ScopeChange, SemesterReport};
pub use students::{consolidate_students, StudentReport};
pub use subjects::{hoist_subjects, SubjectReport};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::document::Object;
use crate::models::ModelError;
use crate::storage::StoreError;
use crate::store::Store;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid migration argument: {0}")]
    Argument(#[from] ModelError),
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

/// What the startup migrations did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub subjects: SubjectReport,
    pub students: StudentReport,
}

impl MigrationReport {
    /// Whether either routine changed the tree
    pub fn changed_anything(&self) -> bool {
        self.subjects.legacy_removed || self.students.years_consolidated > 0
    }
}

/// Runs migrations against a store
pub struct Migrator<'a> {
    store: &'a Store,
}

impl<'a> Migrator<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Run the migrations every open performs: subjects first, then students.
    ///
    /// Each routine runs in its own batch. If the second fails, the first
    /// stays applied.
    pub fn run_startup(&self) -> MigrationResult<MigrationReport> {
        let subjects = self.store.batch(|tx| hoist_subjects(tx))?;
        if subjects.legacy_removed {
            info!(
                "Hoisted legacy subjects into {} school year(s), {} already had subjects",
                subjects.years_populated.len(),
                subjects.years_skipped
            );
        }

        let students = self.store.batch(|tx| consolidate_students(tx))?;
        if students.years_consolidated > 0 {
            info!(
                "Consolidated {} per-year student record(s) from {} year(s) into {} student(s)",
                students.records_merged, students.years_consolidated, students.students
            );
        }

        Ok(MigrationReport { subjects, students })
    }

    /// Move a subject's data after its semester scope changed
    pub fn reassign_semester(&self, change: &ScopeChange) -> MigrationResult<SemesterReport> {
        let report = self.store.batch(|tx| reassign_semester(tx, change))?;
        info!(
            "Reassigned '{}' from {} to {}: {} enrollment(s), {} mark(s) moved ({} kept at target), {} attendance entr(ies) moved ({} kept at target)",
            change.subject,
            change.from,
            change.to,
            report.enrollments_moved,
            report.marks_moved,
            report.marks_skipped,
            report.attendance_moved,
            report.attendance_skipped
        );
        Ok(report)
    }
}

/// Subject keys held in an enrollment list.
///
/// Lists written by older clients come back as arrays, as objects keyed by
/// index (sparse arrays), or as a single string. Non-string entries are
/// dropped and duplicates collapse, keeping first-seen order.
pub fn subject_keys(value: &Value) -> Vec<String> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        Value::String(_) => vec![value],
        _ => Vec::new(),
    };

    let mut keys: Vec<String> = Vec::new();
    for candidate in candidates {
        if let Value::String(key) = candidate {
            if !key.is_empty() && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

/// Enrollment list value for a set of subject keys
pub(crate) fn key_list(keys: Vec<String>) -> Value {
    Value::Array(keys.into_iter().map(Value::String).collect())
}

/// The object under `key`, replacing any non-object found there
pub(crate) fn object_entry<'a>(map: &'a mut Object, key: &str) -> Option<&'a mut Object> {
    if !map.get(key).is_some_and(Value::is_object) {
        map.insert(key.to_string(), Value::Object(Map::new()));
    }
    map.get_mut(key).and_then(Value::as_object_mut)
}
