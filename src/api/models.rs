//! Purpose: Typed academic records and their CSV table layouts.
//! Exports: `Student`, `Course`, `Professor`, `Grade`, `LoginCredential`.
//! Role: Each type owns its table name, column header, key and updatable fields.
//! Invariants: Column names and order are the on-disk contract; never reorder them.
//! Invariants: `LoginCredential::password_token` is stored verbatim and never decoded here.

use serde::{Deserialize, Serialize};

use super::entity::{
    Entity, Field, check_marks, format_marks, parse_persisted_integer, parse_persisted_marks,
};
use crate::core::error::Error;
use crate::core::table::Record;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub course_id: String,
    pub grade: String,
    pub marks: f64,
}

impl Student {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        course_id: impl Into<String>,
        grade: impl Into<String>,
        marks: f64,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            course_id: course_id.into(),
            grade: grade.into(),
            marks,
        }
    }
}

impl Entity for Student {
    const KIND: &'static str = "student";
    const TABLE: &'static str = "students";
    const HEADER: &'static [&'static str] = &[
        "Email_address",
        "First_name",
        "Last_name",
        "Course_id",
        "Grade",
        "Marks",
    ];
    const KEY_COLUMN: &'static str = "Email_address";
    const FIELDS: &'static [Field] = &[
        Field::text("first_name", "First_name"),
        Field::text("last_name", "Last_name"),
        Field::text("course_id", "Course_id"),
        Field::text("grade", "Grade"),
        Field::marks("marks", "Marks"),
    ];

    fn key(&self) -> &str {
        &self.email
    }

    fn validate(&self) -> Result<(), Error> {
        check_marks(self.marks).map(|_| ())
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("Email_address", &self.email)
            .with("First_name", &self.first_name)
            .with("Last_name", &self.last_name)
            .with("Course_id", &self.course_id)
            .with("Grade", &self.grade)
            .with("Marks", format_marks(self.marks))
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            email: record.get("Email_address").to_string(),
            first_name: record.get("First_name").to_string(),
            last_name: record.get("Last_name").to_string(),
            course_id: record.get("Course_id").to_string(),
            grade: record.get("Grade").to_string(),
            marks: parse_persisted_marks(record.get("Marks"))?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub description: String,
    pub credits: u32,
}

impl Course {
    pub const DEFAULT_CREDITS: u32 = 3;

    pub fn new(course_id: impl Into<String>, course_name: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            course_name: course_name.into(),
            description: String::new(),
            credits: Self::DEFAULT_CREDITS,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }
}

impl Entity for Course {
    const KIND: &'static str = "course";
    const TABLE: &'static str = "courses";
    const HEADER: &'static [&'static str] = &["Course_id", "Course_name", "Description", "Credits"];
    const KEY_COLUMN: &'static str = "Course_id";
    const FIELDS: &'static [Field] = &[
        Field::text("course_name", "Course_name"),
        Field::text("description", "Description"),
        Field::integer("credits", "Credits"),
    ];

    fn key(&self) -> &str {
        &self.course_id
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("Course_id", &self.course_id)
            .with("Course_name", &self.course_name)
            .with("Description", &self.description)
            .with("Credits", self.credits.to_string())
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            course_id: record.get("Course_id").to_string(),
            course_name: record.get("Course_name").to_string(),
            description: record.get("Description").to_string(),
            credits: parse_persisted_integer(record.get("Credits"), "Credits")?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Professor {
    pub professor_id: String,
    pub name: String,
    pub rank: String,
    /// Refers to a course id; not checked against the course table.
    pub course_id: String,
}

impl Professor {
    pub fn new(
        professor_id: impl Into<String>,
        name: impl Into<String>,
        rank: impl Into<String>,
        course_id: impl Into<String>,
    ) -> Self {
        Self {
            professor_id: professor_id.into(),
            name: name.into(),
            rank: rank.into(),
            course_id: course_id.into(),
        }
    }
}

impl Entity for Professor {
    const KIND: &'static str = "professor";
    const TABLE: &'static str = "professors";
    const HEADER: &'static [&'static str] = &["Professor_id", "Professor_Name", "Rank", "Course_id"];
    const KEY_COLUMN: &'static str = "Professor_id";
    const FIELDS: &'static [Field] = &[
        Field::text("name", "Professor_Name"),
        Field::text("rank", "Rank"),
        Field::text("course_id", "Course_id"),
    ];

    fn key(&self) -> &str {
        &self.professor_id
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("Professor_id", &self.professor_id)
            .with("Professor_Name", &self.name)
            .with("Rank", &self.rank)
            .with("Course_id", &self.course_id)
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            professor_id: record.get("Professor_id").to_string(),
            name: record.get("Professor_Name").to_string(),
            rank: record.get("Rank").to_string(),
            course_id: record.get("Course_id").to_string(),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub grade_id: String,
    pub grade: String,
    pub marks_range: String,
}

impl Grade {
    pub fn new(
        grade_id: impl Into<String>,
        grade: impl Into<String>,
        marks_range: impl Into<String>,
    ) -> Self {
        Self {
            grade_id: grade_id.into(),
            grade: grade.into(),
            marks_range: marks_range.into(),
        }
    }

    /// The scale installed by `Gradebook::seed_grade_scale`.
    pub fn default_scale() -> Vec<Grade> {
        vec![
            Grade::new("A", "A", "90-100"),
            Grade::new("B", "B", "80-89"),
            Grade::new("C", "C", "70-79"),
            Grade::new("D", "D", "60-69"),
            Grade::new("F", "F", "<60"),
        ]
    }
}

impl Entity for Grade {
    const KIND: &'static str = "grade";
    const TABLE: &'static str = "grades";
    const HEADER: &'static [&'static str] = &["Grade_id", "Grade", "Marks_range"];
    const KEY_COLUMN: &'static str = "Grade_id";
    const FIELDS: &'static [Field] = &[
        Field::text("grade", "Grade"),
        Field::text("marks_range", "Marks_range"),
    ];

    fn key(&self) -> &str {
        &self.grade_id
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("Grade_id", &self.grade_id)
            .with("Grade", &self.grade)
            .with("Marks_range", &self.marks_range)
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            grade_id: record.get("Grade_id").to_string(),
            grade: record.get("Grade").to_string(),
            marks_range: record.get("Marks_range").to_string(),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LoginCredential {
    pub user_id: String,
    pub password_token: String,
    pub role: String,
}

impl LoginCredential {
    pub fn new(
        user_id: impl Into<String>,
        password_token: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            password_token: password_token.into(),
            role: role.into(),
        }
    }
}

impl Entity for LoginCredential {
    const KIND: &'static str = "login";
    const TABLE: &'static str = "login";
    const HEADER: &'static [&'static str] = &["User_id", "Password", "Role"];
    const KEY_COLUMN: &'static str = "User_id";
    const FIELDS: &'static [Field] = &[
        Field::text("password", "Password"),
        Field::text("role", "Role"),
    ];

    fn key(&self) -> &str {
        &self.user_id
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("User_id", &self.user_id)
            .with("Password", &self.password_token)
            .with("Role", &self.role)
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            user_id: record.get("User_id").to_string(),
            password_token: record.get("Password").to_string(),
            role: record.get("Role").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Course, Student};
    use crate::api::entity::{Entity, FieldType};
    use crate::core::error::ErrorKind;
    use crate::core::table::Record;

    #[test]
    fn student_record_uses_canonical_marks() {
        let student = Student::new("ada@example.com", "Ada", "Lovelace", "DATA200", "A", 91.5);
        let record = student.to_record();
        assert_eq!(record.get("Marks"), "91.50");
        let back = Student::from_record(&record).expect("parse");
        assert_eq!(back.marks, 91.5);
        assert_eq!(back, student);
    }

    #[test]
    fn non_numeric_marks_is_malformed() {
        let record = Student::new("a@b.c", "A", "B", "C1", "A", 50.0)
            .to_record()
            .with("Marks", "ninety");
        let err = Student::from_record(&record).expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }

    #[test]
    fn course_credits_parse_as_integer() {
        let record = Record::new()
            .with("Course_id", "DATA200")
            .with("Course_name", "Data Science")
            .with("Description", "")
            .with("Credits", "4");
        let course = Course::from_record(&record).expect("parse");
        assert_eq!(course, Course::new("DATA200", "Data Science").with_credits(4));

        let bad = record.with("Credits", "four");
        assert_eq!(
            Course::from_record(&bad).expect_err("bad").kind(),
            ErrorKind::MalformedRecord
        );
    }

    #[test]
    fn column_lookup_accepts_field_or_column_names() {
        assert_eq!(Student::column("marks"), Some(("Marks", FieldType::Marks)));
        assert_eq!(Student::column("Marks"), Some(("Marks", FieldType::Marks)));
        assert_eq!(
            Student::column("Email_address"),
            Some(("Email_address", FieldType::Text))
        );
        assert_eq!(Student::column("email"), None);
    }

    #[test]
    fn headers_cover_every_record_column() {
        let student = Student::new("a@b.c", "A", "B", "C1", "A", 50.0).to_record();
        assert_eq!(student.len(), Student::HEADER.len());
        for column in Student::HEADER {
            assert!(student.contains(column));
        }
    }
}
