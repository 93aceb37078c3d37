// Library-level flows across repositories, queries, and reports.
use gradebook::api::{
    Config, Course, Entity, ErrorKind, FieldUpdate, Gradebook, Professor, Student,
};

fn open(dir: &std::path::Path) -> Gradebook {
    Gradebook::open(Config::new(dir)).expect("open")
}

#[test]
fn data200_end_to_end() {
    let temp = tempfile::tempdir().expect("tempdir");
    let gradebook = open(temp.path());
    gradebook
        .courses()
        .add(&Course::new("DATA200", "Data Science").with_description("Intro DS & Python"))
        .expect("course");
    for (email, marks) in [("a@x.edu", 60.0), ("b@x.edu", 75.0), ("c@x.edu", 95.0)] {
        gradebook
            .students()
            .add(&Student::new(email, "First", "Last", "DATA200", "B", marks))
            .expect("student");
    }

    let reports = gradebook.reports();
    let stats = reports
        .course_statistics("DATA200")
        .expect("stats")
        .expect("present");
    assert_eq!(stats.count, 3);
    assert!((stats.average - 230.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.median, 75.0);

    let students = reports.report_by_course("DATA200").expect("report");
    let emails: Vec<&str> = students.iter().map(|s| s.email.as_str()).collect();
    assert_eq!(emails, vec!["a@x.edu", "b@x.edu", "c@x.edu"]);
}

#[test]
fn bulk_students_search_sort_update_delete() {
    let temp = tempfile::tempdir().expect("tempdir");
    let gradebook = open(temp.path());
    let students = gradebook.students();
    for i in 0..200 {
        let marks = 50.0 + (i * 37 % 50) as f64 + 0.25;
        students
            .add(&Student::new(format!("s{i:03}@x.edu"), "First", "Last", "DATA200", "A", marks))
            .expect("add");
    }

    let found = students
        .search(|r| r.get("Email_address").contains("s150"))
        .expect("search");
    assert_eq!(found.value.len(), 1);

    let sorted = students.sort_by("Marks", true).expect("sort").into_inner();
    assert_eq!(sorted.len(), 200);
    let marks: Vec<f64> = sorted
        .iter()
        .map(|r| r.get("Marks").parse::<f64>().expect("marks"))
        .collect();
    assert!(marks.windows(2).all(|pair| pair[0] >= pair[1]));

    students
        .update("S000@x.edu", &[FieldUpdate::new("marks", 99.99)])
        .expect("update");
    let hit = students
        .search(|r| r.get("Email_address") == "s000@x.edu")
        .expect("search")
        .into_inner();
    assert_eq!(hit[0].get("Marks"), "99.99");

    students.delete("s001@x.edu").expect("delete");
    assert_eq!(students.count().expect("count"), 199);
    assert_eq!(
        students.delete("s001@x.edu").expect_err("gone").kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn deleting_course_does_not_cascade() {
    let temp = tempfile::tempdir().expect("tempdir");
    let gradebook = open(temp.path());
    gradebook
        .courses()
        .add(&Course::new("DATA201", "ML").with_credits(4))
        .expect("course");
    gradebook
        .professors()
        .add(&Professor::new("p@x.edu", "Prof X", "Senior", "DATA201"))
        .expect("professor");
    gradebook
        .students()
        .add(&Student::new("s@x.edu", "S", "T", "DATA201", "A", 90.0))
        .expect("student");

    gradebook.courses().delete("data201").expect("delete course");
    assert_eq!(gradebook.courses().count().expect("count"), 0);
    assert_eq!(gradebook.professors().count().expect("count"), 1);
    assert_eq!(
        gradebook.reports().report_by_professor("p@x.edu").expect("report").len(),
        1
    );
}

#[test]
fn tables_use_documented_headers() {
    let temp = tempfile::tempdir().expect("tempdir");
    let gradebook = open(temp.path());
    let expected = [
        ("students", Student::HEADER),
        ("courses", Course::HEADER),
        ("professors", Professor::HEADER),
    ];
    for (table, header) in expected {
        let text = std::fs::read_to_string(gradebook.data_dir().join(format!("{table}.csv")))
            .expect("read");
        assert_eq!(text.trim_end(), header.join(","));
    }
}
