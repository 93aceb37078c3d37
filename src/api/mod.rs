//! Purpose: Define the public Rust API boundary for the gradebook.
//! Exports: Entity models, repositories, queries, reports, credentials and errors.
//! Role: Public surface for the CLI and tests; storage internals stay in `core`.
//! Invariants: Identifiers are matched case-insensitively by repositories, never by callers.
//! Invariants: Results are full sequences; truncation is left to front-ends.

mod client;
mod credential;
mod entity;
mod models;
mod query;
mod report;
mod repository;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::paths::default_data_dir;
pub use crate::core::table::{Record, TableLock, TableStore};
pub use client::{Config, Gradebook};
pub use credential::{CredentialCodec, SaltedSha256};
pub use entity::{Entity, Field, FieldType, FieldUpdate, FieldValue, check_marks, format_marks};
pub use models::{Course, Grade, LoginCredential, Professor, Student};
pub use query::Timed;
pub use report::{CourseOverview, CourseStats, ReportEngine, marks_statistics};
pub use repository::{ApiResult, Repository};
