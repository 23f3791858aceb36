//! Consolidate per-year student records.
//!
//! Older layouts kept one copy of every student per school year:
//!
//! ```text
//! students/{year}/{uid}   name, email, subjects/{semester} -> [subjectKey]
//! ```
//!
//! The current layout keeps one record per student:
//!
//! ```text
//! students/{uid}          name, email, subjects/{year}/{semester} -> [subjectKey]
//! ```
//!
//! The new table is computed off to the side and written with a single
//! replace of `students`, so the legacy records stay readable until then.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{key_list, object_entry, subject_keys};
use crate::access::TreeAccess;
use crate::document::Object;
use crate::schema::{self, keys};
use crate::storage::StoreResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentReport {
    /// Year keys folded into the global table
    pub years_consolidated: usize,
    /// Per-year records merged
    pub records_merged: usize,
    /// Per-year entries that were not records and were dropped
    pub records_skipped: usize,
    /// Per-year enrollment tables that were not keyed by semester and were dropped
    pub enrollments_skipped: usize,
    /// Students in the resulting table
    pub students: usize,
}

/// Fold `students/{year}/{uid}` records into `students/{uid}`.
///
/// Fields other than `subjects` keep the first non-empty value seen, with
/// records already in the global table seen first. Enrollment lists from
/// every source are unioned per (year, semester).
pub fn consolidate_students<T: TreeAccess + ?Sized>(tree: &mut T) -> StoreResult<StudentReport> {
    let mut report = StudentReport::default();

    let Some(students) = tree.get(keys::STUDENTS) else {
        return Ok(report);
    };

    let year_keys: Vec<&String> = students.keys().filter(|k| schema::is_year_key(k)).collect();
    if year_keys.is_empty() {
        return Ok(report);
    }

    let mut merged: Object = students
        .iter()
        .filter(|(key, _)| !schema::is_year_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for year in &year_keys {
        report.years_consolidated += 1;

        let Some(Value::Object(records)) = students.get(year.as_str()) else {
            warn!("Dropping students/{}: not an object", year);
            continue;
        };

        for (uid, record) in records {
            let Value::Object(record) = record else {
                warn!("Dropping students/{}/{}: not a student record", year, uid);
                report.records_skipped += 1;
                continue;
            };
            let Some(global) = object_entry(&mut merged, uid) else {
                continue;
            };
            if !merge_record(global, year, record) {
                warn!(
                    "Dropping students/{}/{}/subjects: not keyed by semester",
                    year, uid
                );
                report.enrollments_skipped += 1;
            }
            report.records_merged += 1;
        }
    }

    report.students = merged.len();
    tree.put(keys::STUDENTS, Value::Object(merged))?;

    Ok(report)
}

/// Returns `false` when the record's enrollments could not be read and
/// were left out.
fn merge_record(global: &mut Object, year: &str, record: &Object) -> bool {
    for (field, value) in record {
        if field == keys::SUBJECTS {
            continue;
        }
        let filled = global.get(field).is_some_and(|v| !is_blank(v));
        if !filled && (!is_blank(value) || !global.contains_key(field)) {
            global.insert(field.clone(), value.clone());
        }
    }

    let semesters = match record.get(keys::SUBJECTS) {
        None | Some(Value::Null) => return true,
        Some(Value::Object(semesters)) => semesters,
        Some(_) => return false,
    };
    let Some(by_year) = object_entry(global, keys::SUBJECTS) else {
        return false;
    };
    let Some(by_semester) = object_entry(by_year, year) else {
        return false;
    };

    for (semester, list) in semesters {
        let mut enrolled = by_semester.get(semester).map(subject_keys).unwrap_or_default();
        for key in subject_keys(list) {
            if !enrolled.contains(&key) {
                enrolled.push(key);
            }
        }
        by_semester.insert(semester.clone(), key_list(enrolled));
    }
    true
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::store::{Store, StoreOptions};
    use crate::migrations::Migrator;
    use serde_json::json;

    fn store_with(tree: Value) -> (Store, MemoryBackend) {
        let backend = MemoryBackend::with_contents(tree.to_string());
        let store = Store::with_backend(backend.clone(), StoreOptions::default()).unwrap();
        (store, backend)
    }

    #[test]
    fn test_consolidates_years_into_global_records() {
        let (store, _) = store_with(json!({
            "students": {
                "2024_2025": {
                    "u1": { "name": "Jane", "email": "", "subjects": { "winter": ["math"] } },
                    "u2": { "name": "John", "email": "john@example.com" }
                },
                "2025_2026": {
                    "u1": {
                        "name": "Jane Doe",
                        "email": "jane@example.com",
                        "subjects": { "winter": ["math", "art"], "summer": { "0": "bio" } }
                    }
                }
            }
        }));

        let report = consolidate_students(&mut &store).unwrap();

        assert_eq!(report.years_consolidated, 2);
        assert_eq!(report.records_merged, 3);
        assert_eq!(report.students, 2);
        assert_eq!(store.children("students"), vec!["u1", "u2"]);
        assert_eq!(
            store.read("students/u1").unwrap(),
            json!({
                "name": "Jane",
                "email": "jane@example.com",
                "subjects": {
                    "2024_2025": { "winter": ["math"] },
                    "2025_2026": { "winter": ["math", "art"], "summer": ["bio"] }
                }
            })
        );
    }

    #[test]
    fn test_existing_global_record_wins_and_lists_union() {
        let (store, _) = store_with(json!({
            "students": {
                "u1": {
                    "name": "Jane Global",
                    "subjects": { "2025_2026": { "winter": ["art"] } }
                },
                "2025_2026": {
                    "u1": { "name": "Jane Year", "subjects": { "winter": ["math", "art"] } }
                }
            }
        }));

        consolidate_students(&mut &store).unwrap();

        assert_eq!(store.read("students/u1/name"), Some(json!("Jane Global")));
        assert_eq!(
            store.read("students/u1/subjects/2025_2026/winter"),
            Some(json!(["art", "math"]))
        );
    }

    #[test]
    fn test_non_record_entries_are_skipped() {
        let (store, _) = store_with(json!({
            "students": { "2025_2026": { "u1": "garbage", "u2": { "name": "John" } } }
        }));

        let report = consolidate_students(&mut &store).unwrap();

        assert_eq!(report.records_skipped, 1);
        assert_eq!(store.children("students"), vec!["u2"]);
    }

    #[test]
    fn test_unkeyed_enrollments_are_counted() {
        let (store, _) = store_with(json!({
            "students": {
                "2025_2026": {
                    "u1": { "name": "Jane", "subjects": ["math"] },
                    "u2": { "name": "John", "subjects": { "winter": ["art"] } }
                }
            }
        }));

        let report = consolidate_students(&mut &store).unwrap();

        assert_eq!(report.records_merged, 2);
        assert_eq!(report.enrollments_skipped, 1);
        assert_eq!(report.records_skipped, 0);
        assert_eq!(store.read("students/u1"), Some(json!({ "name": "Jane" })));
        assert_eq!(
            store.read("students/u2/subjects/2025_2026/winter"),
            Some(json!(["art"]))
        );
    }

    #[test]
    fn test_without_year_keys_is_noop() {
        let (store, backend) = store_with(json!({ "students": { "u1": { "name": "Jane" } } }));
        let before = backend.save_count();

        let report = consolidate_students(&mut &store).unwrap();

        assert_eq!(report, StudentReport::default());
        assert_eq!(backend.save_count(), before);
    }

    #[test]
    fn test_single_swap_write() {
        let (store, backend) = store_with(json!({
            "students": {
                "2024_2025": { "u1": { "name": "Jane" } },
                "2025_2026": { "u1": { "name": "Jane" }, "u2": { "name": "John" } }
            }
        }));
        let before = backend.save_count();

        consolidate_students(&mut &store).unwrap();

        assert_eq!(backend.save_count(), before + 1);
    }

    #[test]
    fn test_legacy_records_readable_until_swap() {
        let legacy = json!({
            "students": { "2025_2026": { "u1": { "name": "Jane" } } }
        });
        let (store, backend) = store_with(legacy.clone());
        backend.set_fail_writes(true);

        assert!(Migrator::new(&store).run_startup().is_err());

        // Neither memory nor the persisted copy moved past the legacy layout
        assert_eq!(store.read("students/2025_2026/u1/name"), Some(json!("Jane")));
        let persisted: Value = serde_json::from_str(&backend.contents().unwrap()).unwrap();
        assert_eq!(persisted, legacy);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let (store, _) = store_with(json!({
            "students": { "2025_2026": { "u1": { "name": "Jane", "subjects": { "winter": ["math"] } } } }
        }));
        consolidate_students(&mut &store).unwrap();
        let once = store.export_json().unwrap();

        consolidate_students(&mut &store).unwrap();

        assert_eq!(store.export_json().unwrap(), once);
    }
}
