// Schema-agnostic CSV table files: create-on-first-use, full read, atomic full replace.
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use fs2::FileExt;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tempfile::NamedTempFile;

use crate::core::error::{Error, ErrorKind, io_error_kind};
use crate::core::paths::{TableNameResolveError, resolve_lock_path, resolve_table_path};

/// One row: column name to string value, in column order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing columns read as the empty string.
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    /// Overwrites an existing column in place; new columns go last.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

/// Directory of CSV tables. Cheap to clone; clones share the header registry.
#[derive(Clone, Debug)]
pub struct TableStore {
    dir: PathBuf,
    headers: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl TableStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            headers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, name: &str) -> Result<PathBuf, Error> {
        resolve_table_path(name, &self.dir).map_err(|err| name_error(err, name))
    }

    /// Creates `<dir>/<name>.csv` holding only `header` if it does not exist yet.
    pub fn ensure_table(&self, name: &str, header: &[&str]) -> Result<(), Error> {
        let path = self.table_path(name)?;
        fs::create_dir_all(&self.dir).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("failed to create data directory")
                .with_path(&self.dir)
                .with_source(err)
        })?;

        let header: Vec<String> = header.iter().map(|column| column.to_string()).collect();
        {
            let mut headers = self
                .headers
                .write()
                .map_err(|_| {
                Error::new(ErrorKind::Internal).with_message("header registry poisoned")
            })?;
            headers.insert(name.to_string(), header.clone());
        }

        let _lock = self.lock(name)?;
        if path.exists() {
            return Ok(());
        }
        write_table(&self.dir, &path, &header, &[])?;
        tracing::info!(table = name, path = %path.display(), "created table");
        Ok(())
    }

    /// Every record in storage order.
    pub fn read_all(&self, name: &str) -> Result<Vec<Record>, Error> {
        let path = self.table_path(name)?;
        let file = File::open(&path).map_err(|err| {
            Error::new(ErrorKind::StorageUnavailable)
                .with_message(format!("failed to open table `{name}`"))
                .with_path(&path)
                .with_source(err)
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let header = reader
            .headers()
            .map_err(|err| csv_error(err, name, &path))?
            .clone();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| csv_error(err, name, &path))?;
            records.push(header.iter().zip(row.iter()).collect::<Record>());
        }
        tracing::debug!(table = name, rows = records.len(), "read table");
        Ok(records)
    }

    /// Swaps in a complete new copy of the table. The old file stays intact
    /// until the rename, so an interrupted write never truncates it.
    pub fn replace_all(&self, name: &str, records: &[Record]) -> Result<(), Error> {
        let path = self.table_path(name)?;
        let header = self.header(name, &path)?;
        write_table(&self.dir, &path, &header, records)?;
        tracing::debug!(table = name, rows = records.len(), "replaced table");
        Ok(())
    }

    /// Exclusive lock for one table. Each call opens its own handle on the
    /// lock file, so the lock excludes other threads as well as other processes.
    pub fn lock(&self, name: &str) -> Result<TableLock, Error> {
        let path = resolve_lock_path(name, &self.dir).map_err(|err| name_error(err, name))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| {
                Error::new(io_error_kind(&err))
                    .with_message(format!("failed to open lock for table `{name}`"))
                    .with_path(&path)
                    .with_source(err)
            })?;
        file.lock_exclusive().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message(format!("failed to lock table `{name}`"))
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(TableLock { file })
    }

    /// The registered header, or the one already on disk for tables this
    /// store has not seen through `ensure_table`.
    fn header(&self, name: &str, path: &Path) -> Result<Vec<String>, Error> {
        {
            let headers = self.headers.read().map_err(|_| {
                Error::new(ErrorKind::Internal).with_message("header registry poisoned")
            })?;
            if let Some(header) = headers.get(name) {
                return Ok(header.clone());
            }
        }
        let file = File::open(path).map_err(|err| {
            Error::new(ErrorKind::StorageUnavailable)
                .with_message(format!("failed to open table `{name}`"))
                .with_path(path)
                .with_hint("Call ensure_table before replacing a table.")
                .with_source(err)
        })?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let header = reader
            .headers()
            .map_err(|err| csv_error(err, name, path))?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(header)
    }
}

pub struct TableLock {
    file: File,
}

impl Drop for TableLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn write_table(dir: &Path, path: &Path, header: &[String], records: &[Record]) -> Result<(), Error> {
    let io_err = |err: std::io::Error| {
        Error::new(ErrorKind::StorageUnavailable)
            .with_message("failed to write table")
            .with_path(path)
            .with_source(err)
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer
            .write_record(header)
            .map_err(|err| csv_error(err, "", path))?;
        for record in records {
            writer
                .write_record(header.iter().map(|column| record.get(column)))
                .map_err(|err| csv_error(err, "", path))?;
        }
        writer.flush().map_err(io_err)?;
    }
    tmp.as_file_mut().flush().map_err(io_err)?;
    match fs::metadata(path) {
        Ok(existing) => tmp
            .as_file()
            .set_permissions(existing.permissions())
            .map_err(io_err)?,
        Err(_) => set_new_table_permissions(tmp.as_file()).map_err(io_err)?,
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

// Temp files start out owner-only; a fresh table gets the usual 0644.
#[cfg(unix)]
fn set_new_table_permissions(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_new_table_permissions(_file: &File) -> std::io::Result<()> {
    Ok(())
}

fn csv_error(err: csv::Error, name: &str, path: &Path) -> Error {
    let message = if name.is_empty() {
        "failed to encode table".to_string()
    } else {
        format!("failed to parse table `{name}`")
    };
    Error::new(ErrorKind::StorageUnavailable)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

fn name_error(err: TableNameResolveError, name: &str) -> Error {
    let message = match err {
        TableNameResolveError::Empty => "table name must not be empty".to_string(),
        TableNameResolveError::ContainsPathSeparator => {
            format!("table name `{name}` must not contain path separators")
        }
    };
    Error::new(ErrorKind::Usage).with_message(message)
}

#[cfg(test)]
mod tests {
    use super::{Record, TableStore};
    use crate::core::error::ErrorKind;

    const HEADER: &[&str] = &["Id", "Name"];

    fn row(id: &str, name: &str) -> Record {
        Record::new().with("Id", id).with("Name", name)
    }

    #[test]
    fn ensure_table_writes_header_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path().join("data"));
        store.ensure_table("people", HEADER).expect("ensure");
        let path = store.table_path("people").expect("path");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "Id,Name\n");

        store.replace_all("people", &[row("1", "Ada")]).expect("replace");
        store.ensure_table("people", HEADER).expect("ensure again");
        assert_eq!(store.read_all("people").expect("read"), vec![row("1", "Ada")]);
    }

    #[test]
    fn replace_preserves_order_and_quotes_commas() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        store.ensure_table("people", HEADER).expect("ensure");
        let rows = vec![row("2", "Lovelace, Ada"), row("1", "Turing")];
        store.replace_all("people", &rows).expect("replace");
        assert_eq!(store.read_all("people").expect("read"), rows);
    }

    #[test]
    fn read_ignores_unexpected_columns_and_missing_reads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        store.ensure_table("people", HEADER).expect("ensure");
        let path = store.table_path("people").expect("path");
        std::fs::write(&path, "Id,Extra\n7,zzz\n").expect("write");

        let records = store.read_all("people").expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Id"), "7");
        assert_eq!(records[0].get("Name"), "");

        // A rewrite goes back to the registered schema.
        store.replace_all("people", &records).expect("replace");
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text, "Id,Name\n7,\n");
    }

    #[test]
    fn missing_table_is_storage_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        let err = store.read_all("ghost").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn replace_missing_table_is_storage_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        let err = store.replace_all("ghost", &[]).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn second_store_reuses_header_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        TableStore::new(dir.path())
            .ensure_table("people", HEADER)
            .expect("ensure");
        let other = TableStore::new(dir.path());
        other.replace_all("people", &[row("9", "Hopper")]).expect("replace");
        assert_eq!(other.read_all("people").expect("read"), vec![row("9", "Hopper")]);
    }

    #[test]
    fn bad_table_name_is_usage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        let err = store.ensure_table("../evil", HEADER).expect_err("bad name");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[cfg(unix)]
    #[test]
    fn rewrites_keep_table_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        store.ensure_table("people", HEADER).expect("ensure");
        let path = store.table_path("people").expect("path");
        let mode = |path: &std::path::Path| {
            std::fs::metadata(path).expect("metadata").permissions().mode() & 0o777
        };
        assert_eq!(mode(&path), 0o644);

        store.replace_all("people", &[row("1", "Ada")]).expect("replace");
        assert_eq!(mode(&path), 0o644);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).expect("chmod");
        store.replace_all("people", &[row("2", "Grace")]).expect("replace");
        assert_eq!(mode(&path), 0o640);
    }

    #[test]
    fn records_serialize_in_column_order() {
        let record = Record::new()
            .with("Email_address", "a@x.edu")
            .with("First_name", "Ada")
            .with("Marks", "91.50");
        let json = serde_json::to_string(&record).expect("json");
        assert_eq!(
            json,
            r#"{"Email_address":"a@x.edu","First_name":"Ada","Marks":"91.50"}"#
        );

        let updated = record.with("Email_address", "b@x.edu");
        let columns: Vec<&str> = updated.iter().map(|(column, _)| column).collect();
        assert_eq!(columns, vec!["Email_address", "First_name", "Marks"]);
    }

    #[test]
    fn read_all_keeps_header_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        store.ensure_table("people", &["Zeta", "Alpha"]).expect("ensure");
        let rows = vec![Record::new().with("Zeta", "z").with("Alpha", "a")];
        store.replace_all("people", &rows).expect("replace");
        let read = store.read_all("people").expect("read");
        let columns: Vec<&str> = read[0].iter().map(|(column, _)| column).collect();
        assert_eq!(columns, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TableStore::new(dir.path());
        store.ensure_table("people", HEADER).expect("ensure");
        store.replace_all("people", &[row("1", "Ada")]).expect("replace");
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![".people.lock".to_string(), "people.csv".to_string()]);
    }
}
