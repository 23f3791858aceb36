use classbook_core::{
    Bucket, Config, LoadOutcome, Mark, Migrator, School, Semester, SemesterScope, Store, Subject,
    TreeAccess,
};
use serde_json::json;
use tempfile::TempDir;

const YEAR: &str = "2025_2026";

fn config_in(temp_dir: &TempDir) -> Config {
    Config {
        data_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    }
}

#[test]
fn test_add_subject_student_enrollment_and_mark() {
    let store = Store::in_memory().unwrap();
    let mut school = School::new(&store);

    school.add_school_year(YEAR, "2025/2026").unwrap();
    school
        .add_subject(YEAR, "math", &Subject::new("Math", SemesterScope::Both))
        .unwrap();
    school.add_student("u1", "Jane", "jane@example.com").unwrap();
    school.enroll("u1", YEAR, Semester::Winter, "math").unwrap();

    let at = Bucket::new(YEAR, Semester::Winter, "math", "u1");
    let mark = Mark {
        grade: "A".to_string(),
        ..Mark::default()
    };
    school.add_mark(&at, &mark).unwrap();

    let marks = school.get_marks(&at).unwrap();
    assert_eq!(marks.len(), 1);
    let (id, stored) = &marks[0];
    assert!(!id.is_empty());
    assert_eq!(stored.grade, "A");
}

#[test]
fn test_school_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);

    let mark_id = {
        let store = Store::open(&config).unwrap();
        let mut school = School::new(&store);
        school.add_student("u1", "Jane", "jane@example.com").unwrap();
        school
            .add_mark(&Bucket::new(YEAR, Semester::Summer, "bio", "u1"), &Mark::new("B"))
            .unwrap()
    };

    let store = Store::open(&config).unwrap();
    assert_eq!(*store.load_outcome(), LoadOutcome::Loaded);

    let school = School::new(&store);
    assert_eq!(school.get_student("u1").unwrap().unwrap().name, "Jane");
    let marks = school
        .get_marks(&Bucket::new(YEAR, Semester::Summer, "bio", "u1"))
        .unwrap();
    assert_eq!(marks[0].0, mark_id);
}

#[test]
fn test_legacy_file_is_migrated_on_open() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);
    let legacy = json!({
        "subjects": { "math": { "name": "Math", "teacherId": "t1", "semester": "winter" } },
        "school_years": { YEAR: { "name": "2025/2026" } },
        "students": {
            YEAR: { "u1": { "name": "Jane", "email": "jane@example.com", "subjects": { "winter": ["math"] } } }
        },
        "grades": { YEAR: { "winter": { "math": { "u1": { "M1": { "grade": "A" } } } } } }
    });
    std::fs::write(config.data_path(), serde_json::to_string_pretty(&legacy).unwrap()).unwrap();

    let store = Store::open(&config).unwrap();
    Migrator::new(&store).run_startup().unwrap();

    let mut school = School::new(&store);
    let math = school.get_subject(YEAR, "math").unwrap().unwrap();
    assert_eq!(math.teacher_id, "t1");
    let jane = school.get_student("u1").unwrap().unwrap();
    assert_eq!(jane.enrolled_in(YEAR, Semester::Winter), ["math"]);

    school
        .change_subject_scope(YEAR, "math", SemesterScope::Summer)
        .unwrap();

    let reopened = Store::open(&config).unwrap();
    assert!(!reopened.exists("subjects"));
    assert!(!reopened.exists("students/2025_2026"));
    assert!(reopened.exists("grades/2025_2026/summer/math/u1/M1"));
    assert!(!reopened.exists("grades/2025_2026/winter/math"));
    assert_eq!(
        reopened.read("students/u1/subjects/2025_2026/summer"),
        Some(json!(["math"]))
    );
}

#[test]
fn test_export_then_import_into_fresh_store() {
    let source = Store::in_memory().unwrap();
    School::new(&source).set_admin("u9").unwrap();
    let mut dump = Vec::new();
    source.export_to(&mut dump).unwrap();

    let temp_dir = TempDir::new().unwrap();
    let target = Store::open(&config_in(&temp_dir)).unwrap();
    target.import_from(dump.as_slice()).unwrap();

    assert!(School::new(&target).is_admin("u9"));
    assert_eq!(target.get_scalar("admins/u9").and_then(|s| s.as_bool()), Some(true));
}
