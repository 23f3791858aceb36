//! Migration command handlers

use anyhow::{Context, Result};

use classbook_core::{Migrator, School, ScopeChange, SemesterScope, Store};

use crate::output::Output;

/// Run the startup migrations explicitly
pub fn startup(store: &Store, output: &Output) -> Result<()> {
    let report = Migrator::new(store)
        .run_startup()
        .context("Startup migrations failed")?;

    output.print_report(&report, || {
        if !report.changed_anything() {
            println!("Nothing to migrate.");
            return;
        }
        let subjects = &report.subjects;
        if subjects.legacy_removed {
            println!(
                "Subjects: copied into {} year(s), {} year(s) already had subjects",
                subjects.years_populated.len(),
                subjects.years_skipped
            );
        }
        let students = &report.students;
        if students.years_consolidated > 0 {
            println!(
                "Students: {} record(s) from {} year(s) merged into {} student(s)",
                students.records_merged, students.years_consolidated, students.students
            );
            if students.records_skipped > 0 {
                println!("          {} malformed record(s) dropped", students.records_skipped);
            }
            if students.enrollments_skipped > 0 {
                println!(
                    "          {} unreadable enrollment table(s) dropped",
                    students.enrollments_skipped
                );
            }
        }
    })
}

/// Move a subject's data after its semester scope changed
pub fn semester(
    store: &Store,
    subject: String,
    from: SemesterScope,
    to: SemesterScope,
    year: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut change = ScopeChange::new(&subject, from, to);
    if let Some(year) = &year {
        change = change.in_year(year);
    }

    let report = Migrator::new(store)
        .reassign_semester(&change)
        .context("Semester migration failed")?;

    // With a single year the subject record itself can be updated too
    if let Some(year) = &year {
        let mut school = School::new(store);
        if let Some(mut record) = school.get_subject(year, &subject)? {
            record.semester = to;
            school.add_subject(year, &subject, &record)?;
        }
    }

    output.print_report(&report, || match report.target {
        None => println!("Scope {} -> {} drops no semester; nothing moved.", from, to),
        Some(target) => {
            println!("Moved '{}' data into {} across {} year(s):", subject, target, report.years);
            println!("  enrollments: {}", report.enrollments_moved);
            println!(
                "  marks:       {} moved, {} already present",
                report.marks_moved, report.marks_skipped
            );
            println!(
                "  attendance:  {} moved, {} already present",
                report.attendance_moved, report.attendance_skipped
            );
        }
    })
}
