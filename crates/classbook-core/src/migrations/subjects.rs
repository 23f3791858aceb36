//! Hoist the legacy subject table into school years.
//!
//! Subjects used to live in one flat `subjects` table shared by every
//! year. Each year now owns `school_years/{year}/subjects`. Years that
//! already define subjects are left alone; there is no merge.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::access::TreeAccess;
use crate::schema::{self, keys};
use crate::storage::StoreResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectReport {
    /// Years that received a copy of the legacy table
    pub years_populated: Vec<String>,
    /// Years left alone because they already had subjects
    pub years_skipped: usize,
    /// Whether the legacy table was deleted
    pub legacy_removed: bool,
}

/// Copy the legacy `subjects` table into every year without subjects, then
/// delete the legacy table.
///
/// Without any school year record to hold a copy, the legacy table is the
/// only copy of the subjects, so it is kept.
pub fn hoist_subjects<T: TreeAccess + ?Sized>(tree: &mut T) -> StoreResult<SubjectReport> {
    let mut report = SubjectReport::default();

    let legacy = match tree.get(keys::LEGACY_SUBJECTS) {
        Some(table) if !table.is_empty() => table,
        _ => return Ok(report),
    };

    let years: Vec<String> = tree
        .children(keys::SCHOOL_YEARS)
        .into_iter()
        .filter(|year| {
            let record = tree.get(&schema::school_year(year)).is_some();
            if !record {
                debug!("Skipping '{}': not a school year record", year);
            }
            record
        })
        .collect();
    if years.is_empty() {
        warn!(
            "Found {} legacy subject(s) but no school year records, keeping the legacy table",
            legacy.len()
        );
        return Ok(report);
    }

    for year in years {
        let subjects_path = schema::year_subjects(&year);
        if !tree.children(&subjects_path).is_empty() {
            report.years_skipped += 1;
            continue;
        }
        tree.put(&subjects_path, Value::Object(legacy.clone()))?;
        report.years_populated.push(year);
    }

    // Only after every eligible year holds its copy
    tree.remove(keys::LEGACY_SUBJECTS)?;
    report.legacy_removed = true;

    Ok(report)
}
