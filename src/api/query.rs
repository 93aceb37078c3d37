//! Purpose: Predicate search and single-field sort over a repository's rows.
//! Exports: `Timed`, `Repository::search`, `Repository::sort_by`.
//! Role: Read-only scans that report their own compute time to the caller.
//! Invariants: Results keep storage order (search) or stable order on ties (sort).
//! Invariants: Elapsed time covers only the filter/sort pass, not the table read.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use super::entity::{Entity, FieldType, parse_persisted_marks};
use super::repository::{ApiResult, Repository};
use crate::core::error::Error;
use crate::core::table::Record;

#[derive(Clone, Debug, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<E: Entity> Repository<E> {
    pub fn search<P>(&self, predicate: P) -> ApiResult<Timed<Vec<Record>>>
    where
        P: Fn(&Record) -> bool,
    {
        let records = self.records()?;
        let start = Instant::now();
        let value: Vec<Record> = records.into_iter().filter(|record| predicate(record)).collect();
        Ok(Timed {
            value,
            elapsed: start.elapsed(),
        })
    }

    /// Orders every row by `field`, a column name or update-field alias.
    /// Marks compare numerically; every other column, numeric or not, compares
    /// case-insensitively as text and never fails.
    pub fn sort_by(&self, field: &str, descending: bool) -> ApiResult<Timed<Vec<Record>>> {
        let (column, ty) = E::column(field).unwrap_or((field, FieldType::Text));
        let records = self.records()?;
        let start = Instant::now();

        let value = match ty {
            FieldType::Marks => {
                let mut keyed = records
                    .into_iter()
                    .map(|record| -> Result<(f64, Record), Error> {
                        let marks = parse_persisted_marks(record.get(column)).map_err(|err| {
                            err.with_entity(E::KIND)
                                .with_key(record.get(E::KEY_COLUMN))
                        })?;
                        Ok((marks, record))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                keyed.sort_by(|(a, _), (b, _)| directed(a.total_cmp(b), descending));
                keyed.into_iter().map(|(_, record)| record).collect()
            }
            FieldType::Text | FieldType::Integer => {
                let mut keyed: Vec<(String, Record)> = records
                    .into_iter()
                    .map(|record| (record.get(column).to_lowercase(), record))
                    .collect();
                keyed.sort_by(|(a, _), (b, _)| directed(a.cmp(b), descending));
                keyed.into_iter().map(|(_, record)| record).collect()
            }
        };

        Ok(Timed {
            value,
            elapsed: start.elapsed(),
        })
    }
}

// Reversing the comparison (not the output) keeps ties in storage order.
fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}
