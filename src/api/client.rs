//! Purpose: Open a gradebook data directory and hand out its repositories.
//! Exports: `Config`, `Gradebook`.
//! Role: Session object for front-ends; replaces fixed process-wide table paths.
//! Invariants: `open` guarantees all five tables exist before returning.
//! Invariants: Login helpers go through a caller-supplied `CredentialCodec`.

use std::path::{Path, PathBuf};

use super::credential::CredentialCodec;
use super::entity::{Entity, FieldUpdate};
use super::models::{Course, Grade, LoginCredential, Professor, Student};
use super::report::ReportEngine;
use super::repository::{ApiResult, Repository};
use crate::core::error::ErrorKind;
use crate::core::paths::default_data_dir;
use crate::core::table::TableStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub strict_fields: bool,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            strict_fields: false,
        }
    }

    pub fn with_strict_fields(mut self, strict_fields: bool) -> Self {
        self.strict_fields = strict_fields;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

pub struct Gradebook {
    store: TableStore,
    students: Repository<Student>,
    courses: Repository<Course>,
    professors: Repository<Professor>,
    grades: Repository<Grade>,
    logins: Repository<LoginCredential>,
}

impl Gradebook {
    pub fn open(config: Config) -> ApiResult<Self> {
        let store = TableStore::new(config.data_dir);
        let strict = config.strict_fields;
        let gradebook = Self {
            students: Repository::open(store.clone())?.with_strict_fields(strict),
            courses: Repository::open(store.clone())?.with_strict_fields(strict),
            professors: Repository::open(store.clone())?.with_strict_fields(strict),
            grades: Repository::open(store.clone())?.with_strict_fields(strict),
            logins: Repository::open(store.clone())?.with_strict_fields(strict),
            store,
        };
        tracing::debug!(dir = %gradebook.data_dir().display(), strict, "opened gradebook");
        Ok(gradebook)
    }

    /// Ends the session. Nothing is buffered, so this only releases handles.
    pub fn close(self) {
        tracing::debug!(dir = %self.data_dir().display(), "closed gradebook");
    }

    pub fn data_dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn students(&self) -> &Repository<Student> {
        &self.students
    }

    pub fn courses(&self) -> &Repository<Course> {
        &self.courses
    }

    pub fn professors(&self) -> &Repository<Professor> {
        &self.professors
    }

    pub fn grades(&self) -> &Repository<Grade> {
        &self.grades
    }

    pub fn logins(&self) -> &Repository<LoginCredential> {
        &self.logins
    }

    pub fn reports(&self) -> ReportEngine<'_> {
        ReportEngine::new(&self.students, &self.courses, &self.professors)
    }

    /// Adds the default A–F scale, skipping grade ids already present.
    /// Returns how many grades were added.
    pub fn seed_grade_scale(&self) -> ApiResult<usize> {
        let mut added = 0;
        for grade in Grade::default_scale() {
            match self.grades.add(&grade) {
                Ok(()) => added += 1,
                Err(err) if err.kind() == ErrorKind::DuplicateKey => {}
                Err(err) => return Err(err),
            }
        }
        tracing::info!(added, "seeded grade scale");
        Ok(added)
    }

    pub fn register_user(
        &self,
        user_id: &str,
        password: &str,
        role: &str,
        codec: &dyn CredentialCodec,
    ) -> ApiResult<()> {
        let token = codec.encode(password)?;
        self.logins
            .add(&LoginCredential::new(user_id, token, role))
    }

    /// False when the user is unknown or the password does not match.
    pub fn verify_login(
        &self,
        user_id: &str,
        password: &str,
        codec: &dyn CredentialCodec,
    ) -> ApiResult<bool> {
        Ok(self
            .logins
            .get(user_id)?
            .is_some_and(|login| codec.verify(password, &login.password_token)))
    }

    pub fn change_password(
        &self,
        user_id: &str,
        new_password: &str,
        codec: &dyn CredentialCodec,
    ) -> ApiResult<()> {
        let token = codec.encode(new_password)?;
        self.logins
            .update(user_id, &[FieldUpdate::new("password", token)])
    }

    pub fn table_names() -> [&'static str; 5] {
        [
            Student::TABLE,
            Course::TABLE,
            Professor::TABLE,
            Grade::TABLE,
            LoginCredential::TABLE,
        ]
    }
}
