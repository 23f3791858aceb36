//! Reassign a subject's semester scope.
//!
//! When a subject stops being taught in a semester, everything filed under
//! that semester moves to the semester that replaced it: enrollment list
//! entries, marks and attendance. Entries are copied before the source is
//! deleted, and an id already present at the target is never overwritten.

use serde::Serialize;

use super::{key_list, subject_keys};
use crate::access::TreeAccess;
use crate::models::{Semester, SemesterScope};
use crate::schema::{self, keys};
use crate::storage::StoreResult;
use crate::tree_path;

/// A subject's scope change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChange {
    pub subject: String,
    pub from: SemesterScope,
    pub to: SemesterScope,
    /// Limit the move to one school year; all years when `None`
    pub year: Option<String>,
}

impl ScopeChange {
    pub fn new(subject: impl Into<String>, from: SemesterScope, to: SemesterScope) -> Self {
        Self {
            subject: subject.into(),
            from,
            to,
            year: None,
        }
    }

    pub fn in_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Semesters the subject no longer covers
    pub fn removed(&self) -> Vec<Semester> {
        self.from
            .semesters()
            .iter()
            .copied()
            .filter(|s| !self.to.contains(*s))
            .collect()
    }

    /// Where data from removed semesters goes.
    ///
    /// Prefers a semester the new scope adds; falls back to the first
    /// semester of the new scope.
    pub fn target(&self) -> Option<Semester> {
        let semesters = self.to.semesters();
        semesters
            .iter()
            .copied()
            .find(|s| !self.from.contains(*s))
            .or_else(|| semesters.first().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SemesterReport {
    pub target: Option<Semester>,
    pub years: usize,
    pub enrollments_moved: usize,
    pub marks_moved: usize,
    /// Marks left in place at the target because the id already existed
    pub marks_skipped: usize,
    pub attendance_moved: usize,
    pub attendance_skipped: usize,
}

/// Move a subject's enrollments, marks and attendance out of the semesters
/// its new scope drops.
pub fn reassign_semester<T: TreeAccess + ?Sized>(
    tree: &mut T,
    change: &ScopeChange,
) -> StoreResult<SemesterReport> {
    let mut report = SemesterReport::default();

    let removed = change.removed();
    if removed.is_empty() {
        return Ok(report);
    }
    let Some(target) = change.target() else {
        return Ok(report);
    };
    report.target = Some(target);

    let years = match &change.year {
        Some(year) => vec![year.clone()],
        None => known_years(tree),
    };
    report.years = years.len();

    for year in &years {
        for semester in &removed {
            report.enrollments_moved +=
                move_enrollments(tree, year, *semester, target, &change.subject)?;

            let (moved, skipped) =
                move_bucket(tree, keys::GRADES, year, *semester, target, &change.subject)?;
            report.marks_moved += moved;
            report.marks_skipped += skipped;

            let (moved, skipped) =
                move_bucket(tree, keys::ATTENDANCE, year, *semester, target, &change.subject)?;
            report.attendance_moved += moved;
            report.attendance_skipped += skipped;
        }
    }

    Ok(report)
}

/// Every year key mentioned anywhere a subject's data can live
fn known_years<T: TreeAccess + ?Sized>(tree: &T) -> Vec<String> {
    let mut years: Vec<String> = Vec::new();
    let mut add = |year: String| {
        if !years.contains(&year) {
            years.push(year);
        }
    };

    for root in [keys::SCHOOL_YEARS, keys::GRADES, keys::ATTENDANCE] {
        tree.children(root).into_iter().for_each(&mut add);
    }
    for uid in tree.children(keys::STUDENTS) {
        tree.children(&tree_path![keys::STUDENTS, uid, keys::SUBJECTS])
            .into_iter()
            .for_each(&mut add);
    }

    years
}

fn move_enrollments<T: TreeAccess + ?Sized>(
    tree: &mut T,
    year: &str,
    from: Semester,
    to: Semester,
    subject: &str,
) -> StoreResult<usize> {
    let mut moved = 0;

    for uid in tree.children(keys::STUDENTS) {
        let source_path = schema::enrollment(&uid, year, from.as_str());
        let Some(source) = tree.read(&source_path) else {
            continue;
        };
        let mut remaining = subject_keys(&source);
        if !remaining.iter().any(|key| key == subject) {
            continue;
        }

        let target_path = schema::enrollment(&uid, year, to.as_str());
        let mut enrolled = tree
            .read(&target_path)
            .map(|list| subject_keys(&list))
            .unwrap_or_default();
        if !enrolled.iter().any(|key| key == subject) {
            enrolled.push(subject.to_string());
        }
        tree.put(&target_path, key_list(enrolled))?;

        remaining.retain(|key| key != subject);
        if remaining.is_empty() {
            tree.remove(&source_path)?;
        } else {
            tree.put(&source_path, key_list(remaining))?;
        }
        moved += 1;
    }

    Ok(moved)
}

/// Copy each entry of one subject's bucket to the target semester unless
/// the id is taken there, then delete the source bucket.
fn move_bucket<T: TreeAccess + ?Sized>(
    tree: &mut T,
    root: &str,
    year: &str,
    from: Semester,
    to: Semester,
    subject: &str,
) -> StoreResult<(usize, usize)> {
    let source = schema::subject_bucket(root, year, from.as_str(), subject);
    if !tree.exists(&source) {
        return Ok((0, 0));
    }

    let (mut moved, mut skipped) = (0, 0);
    for uid in tree.children(&source) {
        let destination = schema::student_bucket(root, year, to.as_str(), subject, &uid);
        for id in tree.children(&tree_path![source, uid]) {
            let Some(entry) = tree.read(&tree_path![source, uid, id]) else {
                continue;
            };
            let target = tree_path![destination, id];
            if tree.exists(&target) {
                skipped += 1;
            } else {
                tree.put(&target, entry)?;
                moved += 1;
            }
        }
    }

    tree.remove(&source)?;
    Ok((moved, skipped))
}
