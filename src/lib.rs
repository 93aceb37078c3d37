//! Purpose: Shared library crate used by the `gradebook` CLI and tests.
//! Exports: `api` (repositories, queries, reports, credentials) and `core` (tables, errors).
//! Role: Record engine for students, courses, professors, grades and logins in CSV tables.
//! Invariants: Every mutation is a locked full read followed by an atomic full rewrite.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
