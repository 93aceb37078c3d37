//! Purpose: Typed CRUD over one entity table with case-insensitive unique keys.
//! Exports: `Repository`.
//! Role: Wraps `TableStore` with the entity's key, field map and record codec.
//! Invariants: Every call holds the table lock for its whole read-modify-replace.
//! Invariants: Failed calls leave the table byte-for-byte unchanged.
//! Invariants: Unknown update fields are skipped unless strict field checking is on.

use std::marker::PhantomData;

use super::entity::{Entity, FieldUpdate, keys_match};
use crate::core::error::{Error, ErrorKind};
use crate::core::table::{Record, TableStore};

pub type ApiResult<T> = Result<T, Error>;

pub struct Repository<E> {
    store: TableStore,
    strict_fields: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            strict_fields: self.strict_fields,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    /// Ensures the backing table exists and returns a repository over it.
    pub fn open(store: TableStore) -> ApiResult<Self> {
        store.ensure_table(E::TABLE, E::HEADER)?;
        Ok(Self {
            store,
            strict_fields: false,
            _entity: PhantomData,
        })
    }

    pub fn with_strict_fields(mut self, strict_fields: bool) -> Self {
        self.strict_fields = strict_fields;
        self
    }

    pub fn strict_fields(&self) -> bool {
        self.strict_fields
    }

    pub fn add(&self, entity: &E) -> ApiResult<()> {
        entity.validate().map_err(|err| self.tag(err, entity.key()))?;
        let _lock = self.store.lock(E::TABLE)?;
        let mut records = self.store.read_all(E::TABLE)?;
        if records
            .iter()
            .any(|record| keys_match(record.get(E::KEY_COLUMN), entity.key()))
        {
            return Err(Error::new(ErrorKind::DuplicateKey)
                .with_message(format!("{} already exists", E::KIND))
                .with_entity(E::KIND)
                .with_key(entity.key())
                .with_hint(format!("{} must be unique (case-insensitive).", E::KEY_COLUMN)));
        }
        records.push(entity.to_record());
        self.store.replace_all(E::TABLE, &records)?;
        tracing::debug!(table = E::TABLE, key = entity.key(), "added record");
        Ok(())
    }

    pub fn delete(&self, key: &str) -> ApiResult<()> {
        let _lock = self.store.lock(E::TABLE)?;
        let records = self.store.read_all(E::TABLE)?;
        let before = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|record| !keys_match(record.get(E::KEY_COLUMN), key))
            .collect();
        if kept.len() == before {
            return Err(self.not_found(key));
        }
        self.store.replace_all(E::TABLE, &kept)?;
        tracing::debug!(table = E::TABLE, key, removed = before - kept.len(), "deleted record");
        Ok(())
    }

    /// Applies `updates` to the record keyed by `key`. Values are converted
    /// and checked up front, so a bad value aborts before anything is written.
    pub fn update(&self, key: &str, updates: &[FieldUpdate]) -> ApiResult<()> {
        let mut assignments = Vec::with_capacity(updates.len());
        for update in updates {
            match E::field(&update.field) {
                Some(field) => {
                    let value = update
                        .value
                        .to_persisted(field.ty)
                        .map_err(|err| self.tag(err, key))?;
                    assignments.push((field.column, value));
                }
                None if self.strict_fields => {
                    let known = E::FIELDS
                        .iter()
                        .map(|field| field.name)
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("unknown {} field `{}`", E::KIND, update.field))
                        .with_entity(E::KIND)
                        .with_key(key)
                        .with_hint(format!("Updatable fields: {known}.")));
                }
                None => {
                    tracing::warn!(table = E::TABLE, field = %update.field, "ignoring unknown update field");
                }
            }
        }

        let _lock = self.store.lock(E::TABLE)?;
        let mut records = self.store.read_all(E::TABLE)?;
        let mut found = false;
        for record in records
            .iter_mut()
            .filter(|record| keys_match(record.get(E::KEY_COLUMN), key))
        {
            found = true;
            for (column, value) in &assignments {
                record.set(*column, value.clone());
            }
        }
        if !found {
            return Err(self.not_found(key));
        }
        self.store.replace_all(E::TABLE, &records)?;
        tracing::debug!(table = E::TABLE, key, fields = assignments.len(), "updated record");
        Ok(())
    }

    /// First record whose key matches; `None` on a miss.
    pub fn get(&self, key: &str) -> ApiResult<Option<E>> {
        let records = self.records()?;
        records
            .iter()
            .find(|record| keys_match(record.get(E::KEY_COLUMN), key))
            .map(|record| self.parse(record))
            .transpose()
    }

    pub fn list(&self) -> ApiResult<Vec<E>> {
        self.records()?
            .iter()
            .map(|record| self.parse(record))
            .collect()
    }

    /// Raw rows in storage order.
    pub fn records(&self) -> ApiResult<Vec<Record>> {
        let _lock = self.store.lock(E::TABLE)?;
        self.store.read_all(E::TABLE)
    }

    pub fn count(&self) -> ApiResult<usize> {
        Ok(self.records()?.len())
    }

    pub(crate) fn parse(&self, record: &Record) -> ApiResult<E> {
        E::from_record(record).map_err(|err| self.tag(err, record.get(E::KEY_COLUMN)))
    }

    fn tag(&self, err: Error, key: &str) -> Error {
        err.with_entity(E::KIND).with_key(key)
    }

    fn not_found(&self, key: &str) -> Error {
        Error::new(ErrorKind::NotFound)
            .with_message(format!("{} not found", E::KIND))
            .with_entity(E::KIND)
            .with_key(key)
    }
}
