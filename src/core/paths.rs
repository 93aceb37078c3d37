//! Purpose: Shared data-directory and table-name path resolution helpers.
//! Exports: `default_data_dir`, `resolve_table_path`, `resolve_lock_path`.
//! Role: Keep CLI and library path semantics aligned from one source.
//! Invariants: Default data directory remains `~/.gradebook/data`.
//! Invariants: Table names must be non-empty and must not contain path separators.

use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TableNameResolveError {
    Empty,
    ContainsPathSeparator,
}

pub fn default_data_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".gradebook").join("data")
}

pub(crate) fn resolve_table_path(
    name: &str,
    data_dir: &Path,
) -> Result<PathBuf, TableNameResolveError> {
    validate_name(name)?;
    Ok(data_dir.join(format!("{name}.csv")))
}

pub(crate) fn resolve_lock_path(
    name: &str,
    data_dir: &Path,
) -> Result<PathBuf, TableNameResolveError> {
    validate_name(name)?;
    Ok(data_dir.join(format!(".{name}.lock")))
}

fn validate_name(name: &str) -> Result<(), TableNameResolveError> {
    if name.is_empty() {
        return Err(TableNameResolveError::Empty);
    }
    if name.contains('/') || name.contains('\\') {
        return Err(TableNameResolveError::ContainsPathSeparator);
    }
    Ok(())
}
