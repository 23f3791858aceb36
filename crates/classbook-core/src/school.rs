//! School domain layer
//!
//! Typed helpers for the records the application keeps: school years,
//! subjects, students, enrollments, marks, attendance, teachers and admins.
//! Everything here is built from [`TreeAccess`] calls and the path
//! conventions in [`crate::schema`]; there is no storage logic of its own.
//!
//! `School` works over any accessor: a shared `&Store` for write-through
//! use, or a `&mut Batch` inside [`crate::Store::batch`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::access::TreeAccess;
use crate::migrations::{reassign_semester, ScopeChange, SemesterReport};
use crate::migrations::{key_list, subject_keys};
use crate::models::{
    AttendanceEntry, ConsultationBooking, DayOff, Mark, ModelError, Semester, SemesterScope,
    Student, Subject, Teacher, YearKey,
};
use crate::schema::{self, keys};
use crate::storage::StoreError;
use crate::tree_path;

#[derive(Error, Debug)]
pub enum SchoolError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Record at '{path}' is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type SchoolResult<T> = std::result::Result<T, SchoolError>;

/// Where one student's entries for one subject live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket<'a> {
    pub year: &'a str,
    pub semester: Semester,
    pub subject: &'a str,
    pub student: &'a str,
}

impl<'a> Bucket<'a> {
    pub fn new(year: &'a str, semester: Semester, subject: &'a str, student: &'a str) -> Self {
        Self {
            year,
            semester,
            subject,
            student,
        }
    }

    fn path(&self, root: &str) -> String {
        schema::student_bucket(
            root,
            self.year,
            self.semester.as_str(),
            self.subject,
            self.student,
        )
    }
}

/// Domain operations over a document tree
pub struct School<T> {
    tree: T,
}

impl<T: TreeAccess> School<T> {
    pub fn new(tree: T) -> Self {
        Self { tree }
    }

    pub fn into_inner(self) -> T {
        self.tree
    }

    // ==================== School years ====================

    pub fn add_school_year(&mut self, year: &str, name: &str) -> SchoolResult<YearKey> {
        let key: YearKey = year.parse()?;
        self.tree
            .put(&tree_path![schema::school_year(key.as_str()), keys::NAME], name.into())?;
        Ok(key)
    }

    /// Year keys in insertion order
    pub fn list_school_years(&self) -> Vec<String> {
        self.tree
            .children(keys::SCHOOL_YEARS)
            .into_iter()
            .filter(|key| schema::is_year_key(key))
            .collect()
    }

    // ==================== Subjects ====================

    pub fn add_subject(&mut self, year: &str, key: &str, subject: &Subject) -> SchoolResult<()> {
        let year: YearKey = year.parse()?;
        self.tree.put(
            &schema::year_subject(year.as_str(), key),
            serde_json::to_value(subject)?,
        )?;
        Ok(())
    }

    pub fn get_subject(&self, year: &str, key: &str) -> SchoolResult<Option<Subject>> {
        self.decode_at(&schema::year_subject(year, key))
    }

    pub fn list_subjects(&self, year: &str) -> SchoolResult<Vec<(String, Subject)>> {
        self.decode_children(&schema::year_subjects(year))
    }

    pub fn remove_subject(&mut self, year: &str, key: &str) -> SchoolResult<()> {
        self.tree.remove(&schema::year_subject(year, key))?;
        Ok(())
    }

    /// Change where a subject is taught and move its data to match.
    ///
    /// Data moves first and the stored scope is updated last, so a rerun
    /// after an interruption picks up where it left off.
    pub fn change_subject_scope(
        &mut self,
        year: &str,
        key: &str,
        scope: SemesterScope,
    ) -> SchoolResult<SemesterReport> {
        let subject = self
            .get_subject(year, key)?
            .ok_or_else(|| SchoolError::NotFound(schema::year_subject(year, key)))?;
        if subject.semester == scope {
            return Ok(SemesterReport::default());
        }

        let change = ScopeChange::new(key, subject.semester, scope).in_year(year);
        let report = reassign_semester(&mut self.tree, &change)?;
        self.tree.put(
            &tree_path![schema::year_subject(year, key), keys::SEMESTER],
            scope.as_str().into(),
        )?;
        Ok(report)
    }

    // ==================== Students ====================

    /// Create a student or update their name and email.
    ///
    /// Enrollments of an existing student are kept.
    pub fn add_student(&mut self, uid: &str, name: &str, email: &str) -> SchoolResult<()> {
        let record = schema::student(uid);
        self.tree.put(&tree_path![record, keys::NAME], name.into())?;
        self.tree.put(&tree_path![record, keys::EMAIL], email.into())?;
        Ok(())
    }

    pub fn get_student(&self, uid: &str) -> SchoolResult<Option<Student>> {
        self.decode_at(&schema::student(uid))
    }

    /// Student uids in insertion order
    pub fn list_students(&self) -> Vec<String> {
        self.tree
            .children(keys::STUDENTS)
            .into_iter()
            .filter(|key| !schema::is_year_key(key))
            .collect()
    }

    /// Add a subject to a student's enrollment list.
    ///
    /// Returns `false` if the student was already enrolled.
    pub fn enroll(
        &mut self,
        uid: &str,
        year: &str,
        semester: Semester,
        subject: &str,
    ) -> SchoolResult<bool> {
        let path = schema::enrollment(uid, year, semester.as_str());
        let mut enrolled = self.enrollment_list(&path);
        if enrolled.iter().any(|key| key == subject) {
            return Ok(false);
        }
        enrolled.push(subject.to_string());
        self.tree.put(&path, key_list(enrolled))?;
        Ok(true)
    }

    /// Drop a subject from a student's enrollment list.
    ///
    /// Returns `false` if the student was not enrolled.
    pub fn unenroll(
        &mut self,
        uid: &str,
        year: &str,
        semester: Semester,
        subject: &str,
    ) -> SchoolResult<bool> {
        let path = schema::enrollment(uid, year, semester.as_str());
        let mut enrolled = self.enrollment_list(&path);
        let before = enrolled.len();
        enrolled.retain(|key| key != subject);
        if enrolled.len() == before {
            return Ok(false);
        }
        if enrolled.is_empty() {
            self.tree.remove(&path)?;
        } else {
            self.tree.put(&path, key_list(enrolled))?;
        }
        Ok(true)
    }

    fn enrollment_list(&self, path: &str) -> Vec<String> {
        self.tree
            .read(path)
            .map(|list| subject_keys(&list))
            .unwrap_or_default()
    }

    // ==================== Marks & attendance ====================

    /// Record a mark and return its generated id
    pub fn add_mark(&mut self, at: &Bucket<'_>, mark: &Mark) -> SchoolResult<String> {
        self.push_record(&at.path(keys::GRADES), mark)
    }

    /// Marks in one bucket as `(id, mark)`, oldest first
    pub fn get_marks(&self, at: &Bucket<'_>) -> SchoolResult<Vec<(String, Mark)>> {
        self.decode_children(&at.path(keys::GRADES))
    }

    pub fn remove_mark(&mut self, at: &Bucket<'_>, id: &str) -> SchoolResult<()> {
        self.tree.remove(&tree_path![at.path(keys::GRADES), id])?;
        Ok(())
    }

    /// Record attendance and return the entry id
    pub fn add_attendance(
        &mut self,
        at: &Bucket<'_>,
        entry: &AttendanceEntry,
    ) -> SchoolResult<String> {
        self.push_record(&at.path(keys::ATTENDANCE), entry)
    }

    pub fn get_attendance(&self, at: &Bucket<'_>) -> SchoolResult<Vec<(String, AttendanceEntry)>> {
        self.decode_children(&at.path(keys::ATTENDANCE))
    }

    // ==================== Staff ====================

    pub fn add_teacher(&mut self, uid: &str, teacher: &Teacher) -> SchoolResult<()> {
        self.tree
            .put_scalar(&schema::teacher(uid), teacher.to_entry())?;
        Ok(())
    }

    pub fn get_teacher(&self, uid: &str) -> Option<Teacher> {
        self.tree
            .get_string(&schema::teacher(uid))
            .map(|entry| Teacher::from_entry(&entry))
    }

    /// Teachers as `(uid, teacher)`
    pub fn list_teachers(&self) -> Vec<(String, Teacher)> {
        self.tree
            .children(keys::TEACHERS)
            .into_iter()
            .filter_map(|uid| self.get_teacher(&uid).map(|teacher| (uid, teacher)))
            .collect()
    }

    pub fn set_admin(&mut self, uid: &str) -> SchoolResult<()> {
        self.tree.put_scalar(&schema::admin(uid), true)?;
        Ok(())
    }

    pub fn revoke_admin(&mut self, uid: &str) -> SchoolResult<()> {
        self.tree.remove(&schema::admin(uid))?;
        Ok(())
    }

    pub fn is_admin(&self, uid: &str) -> bool {
        self.tree
            .get_scalar(&schema::admin(uid))
            .and_then(|flag| flag.as_bool())
            .unwrap_or(false)
    }

    // ==================== Calendar ====================

    pub fn add_day_off(&mut self, day: &DayOff) -> SchoolResult<String> {
        self.push_record(keys::DAYS_OFF, day)
    }

    pub fn list_days_off(&self) -> SchoolResult<Vec<(String, DayOff)>> {
        self.decode_children(keys::DAYS_OFF)
    }

    pub fn book_consultation(&mut self, booking: &ConsultationBooking) -> SchoolResult<String> {
        self.push_record(keys::CONSULTATION_BOOKINGS, booking)
    }

    pub fn list_consultations(&self) -> SchoolResult<Vec<(String, ConsultationBooking)>> {
        self.decode_children(keys::CONSULTATION_BOOKINGS)
    }

    // ==================== Internals ====================

    fn push_record<R: Serialize>(&mut self, parent: &str, record: &R) -> SchoolResult<String> {
        let value = serde_json::to_value(record)?;
        let id = self.tree.push(parent)?;
        self.tree.put(&tree_path![parent, id], value)?;
        Ok(id)
    }

    fn decode_at<R: DeserializeOwned>(&self, path: &str) -> SchoolResult<Option<R>> {
        match self.tree.read(path) {
            Some(value) => decode(path, value).map(Some),
            None => Ok(None),
        }
    }

    fn decode_children<R: DeserializeOwned>(&self, path: &str) -> SchoolResult<Vec<(String, R)>> {
        let Some(parent) = self.tree.get(path) else {
            return Ok(Vec::new());
        };
        parent
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(id, value)| {
                let record = decode(&tree_path![path, id], value)?;
                Ok((id, record))
            })
            .collect()
    }
}

fn decode<R: DeserializeOwned>(path: &str, value: Value) -> SchoolResult<R> {
    serde_json::from_value(value).map_err(|source| SchoolError::Malformed {
        path: path.to_string(),
        source,
    })
}
