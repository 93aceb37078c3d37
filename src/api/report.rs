//! Purpose: Read-only joins and marks statistics across students, courses and professors.
//! Exports: `ReportEngine`, `CourseStats`, `CourseOverview`, `marks_statistics`.
//! Role: Derived views for front-ends; never writes a table.
//! Invariants: Course and email matches ignore case; an empty result is not an error.
//! Invariants: Professor reports match resolved course ids exactly (case-sensitive).

use serde::Serialize;

use super::entity::keys_match;
use super::models::{Course, Professor, Student};
use super::repository::{ApiResult, Repository};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CourseStats {
    pub count: usize,
    pub average: f64,
    pub median: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CourseOverview {
    pub course: Course,
    pub stats: Option<CourseStats>,
}

/// Count, mean and median of `marks`; `None` when empty. Even counts take the
/// mean of the two middle values.
pub fn marks_statistics(marks: &[f64]) -> Option<CourseStats> {
    if marks.is_empty() {
        return None;
    }
    let count = marks.len();
    let average = marks.iter().sum::<f64>() / count as f64;

    let mut sorted = marks.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = count / 2;
    let median = if count % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    };

    Some(CourseStats {
        count,
        average,
        median,
    })
}

pub struct ReportEngine<'a> {
    students: &'a Repository<Student>,
    courses: &'a Repository<Course>,
    professors: &'a Repository<Professor>,
}

impl<'a> ReportEngine<'a> {
    pub fn new(
        students: &'a Repository<Student>,
        courses: &'a Repository<Course>,
        professors: &'a Repository<Professor>,
    ) -> Self {
        Self {
            students,
            courses,
            professors,
        }
    }

    pub fn course_statistics(&self, course_id: &str) -> ApiResult<Option<CourseStats>> {
        let marks: Vec<f64> = self
            .report_by_course(course_id)?
            .iter()
            .map(|student| student.marks)
            .collect();
        Ok(marks_statistics(&marks))
    }

    pub fn report_by_course(&self, course_id: &str) -> ApiResult<Vec<Student>> {
        self.students_where(|student| keys_match(&student.course_id, course_id))
    }

    /// Students enrolled in any course the professor teaches. The professor id
    /// match ignores case; the course id match does not.
    pub fn report_by_professor(&self, professor_id: &str) -> ApiResult<Vec<Student>> {
        let course_ids: Vec<String> = self
            .professors
            .list()?
            .into_iter()
            .filter(|professor| keys_match(&professor.professor_id, professor_id))
            .map(|professor| professor.course_id)
            .collect();
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.students_where(|student| course_ids.contains(&student.course_id))
    }

    pub fn report_by_student(&self, email: &str) -> ApiResult<Vec<Student>> {
        self.students_where(|student| keys_match(&student.email, email))
    }

    /// Every course in storage order with its statistics.
    pub fn course_overview(&self) -> ApiResult<Vec<CourseOverview>> {
        let students = self.students.list()?;
        let overview = self
            .courses
            .list()?
            .into_iter()
            .map(|course| {
                let marks: Vec<f64> = students
                    .iter()
                    .filter(|student| keys_match(&student.course_id, &course.course_id))
                    .map(|student| student.marks)
                    .collect();
                CourseOverview {
                    stats: marks_statistics(&marks),
                    course,
                }
            })
            .collect();
        Ok(overview)
    }

    fn students_where<P>(&self, predicate: P) -> ApiResult<Vec<Student>>
    where
        P: Fn(&Student) -> bool,
    {
        Ok(self
            .students
            .list()?
            .into_iter()
            .filter(|student| predicate(student))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportEngine, marks_statistics};
    use crate::api::models::{Course, Professor, Student};
    use crate::api::repository::Repository;
    use crate::core::table::TableStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        students: Repository<Student>,
        courses: Repository<Course>,
        professors: Repository<Professor>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let store = TableStore::new(dir.path());
            Self {
                students: Repository::open(store.clone()).expect("students"),
                courses: Repository::open(store.clone()).expect("courses"),
                professors: Repository::open(store).expect("professors"),
                _dir: dir,
            }
        }

        fn engine(&self) -> ReportEngine<'_> {
            ReportEngine::new(&self.students, &self.courses, &self.professors)
        }

        fn student(&self, email: &str, course: &str, marks: f64) {
            self.students
                .add(&Student::new(email, "First", "Last", course, "B", marks))
                .expect("add student");
        }
    }

    #[test]
    fn median_follows_odd_even_rule() {
        let odd = marks_statistics(&[90.0, 70.0, 80.0]).expect("stats");
        assert_eq!(odd.median, 80.0);
        let even = marks_statistics(&[70.0, 100.0, 80.0, 90.0]).expect("stats");
        assert_eq!(even.median, 85.0);
        assert_eq!(even.count, 4);
        assert_eq!(even.average, 85.0);
        assert!(marks_statistics(&[]).is_none());
    }

    #[test]
    fn course_statistics_and_report_end_to_end() {
        let fx = Fixture::new();
        fx.courses
            .add(&Course::new("DATA200", "Data Science"))
            .expect("course");
        fx.student("s1@x.edu", "DATA200", 60.0);
        fx.student("s2@x.edu", "data200", 75.0);
        fx.student("s3@x.edu", "DATA200", 95.0);
        fx.student("other@x.edu", "CS101", 10.0);

        let stats = fx
            .engine()
            .course_statistics("Data200")
            .expect("stats")
            .expect("present");
        assert_eq!(stats.count, 3);
        assert!((stats.average - 76.666_666).abs() < 1e-4);
        assert_eq!(stats.median, 75.0);

        let report = fx.engine().report_by_course("DATA200").expect("report");
        let emails: Vec<&str> = report.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["s1@x.edu", "s2@x.edu", "s3@x.edu"]);

        assert!(fx.engine().course_statistics("NOPE").expect("stats").is_none());
    }

    #[test]
    fn professor_report_matches_course_ids_exactly() {
        let fx = Fixture::new();
        fx.professors
            .add(&Professor::new("prof@x.edu", "Prof X", "Senior", "DATA200"))
            .expect("professor");
        fx.student("s1@x.edu", "DATA200", 80.0);
        fx.student("s2@x.edu", "data200", 70.0);

        let report = fx.engine().report_by_professor("PROF@x.edu").expect("report");
        let emails: Vec<&str> = report.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["s1@x.edu"]);

        assert!(fx.engine().report_by_professor("ghost").expect("report").is_empty());
    }

    #[test]
    fn student_report_ignores_email_case() {
        let fx = Fixture::new();
        fx.student("Ada@x.edu", "DATA200", 88.0);
        let report = fx.engine().report_by_student("ada@X.EDU").expect("report");
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].marks, 88.0);
    }

    #[test]
    fn overview_lists_courses_with_optional_stats() {
        let fx = Fixture::new();
        fx.courses.add(&Course::new("DATA200", "Data")).expect("course");
        fx.courses.add(&Course::new("CS101", "Intro")).expect("course");
        fx.student("s1@x.edu", "DATA200", 50.0);

        let overview = fx.engine().course_overview().expect("overview");
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].course.course_id, "DATA200");
        assert_eq!(overview[0].stats.as_ref().map(|s| s.count), Some(1));
        assert!(overview[1].stats.is_none());
    }
}
