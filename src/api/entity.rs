//! Purpose: Describe how a typed entity maps onto a CSV table.
//! Exports: `Entity`, `Field`, `FieldType`, `FieldValue`, `FieldUpdate`, marks helpers.
//! Role: The seam between schema-agnostic tables and typed repositories.
//! Invariants: Marks persist with exactly two fraction digits and lie in 0..=100.
//! Invariants: Only fields listed in `Entity::FIELDS` are updatable; the key never is.

use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, ErrorKind};
use crate::core::table::Record;

pub const MARKS_MIN: f64 = 0.0;
pub const MARKS_MAX: f64 = 100.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    Text,
    Marks,
    Integer,
}

/// An updatable field: the caller-facing name and the column it writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
    pub ty: FieldType,
}

impl Field {
    pub const fn text(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            ty: FieldType::Text,
        }
    }

    pub const fn marks(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            ty: FieldType::Marks,
        }
    }

    pub const fn integer(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            ty: FieldType::Integer,
        }
    }
}

pub trait Entity: Sized {
    /// Singular name used in error messages, e.g. `student`.
    const KIND: &'static str;
    const TABLE: &'static str;
    const HEADER: &'static [&'static str];
    const KEY_COLUMN: &'static str;
    const FIELDS: &'static [Field];

    fn key(&self) -> &str;
    fn to_record(&self) -> Record;
    fn from_record(record: &Record) -> Result<Self, Error>;

    /// Rejects values that cannot be stored, before anything is written.
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Update-field lookup by caller-facing name.
    fn field(name: &str) -> Option<&'static Field> {
        Self::FIELDS.iter().find(|field| field.name == name)
    }

    /// Resolves either an update-field name (`marks`) or a column name (`Marks`)
    /// to the column it denotes, with its type.
    fn column(name: &str) -> Option<(&'static str, FieldType)> {
        if let Some(field) = Self::field(name) {
            return Some((field.column, field.ty));
        }
        Self::HEADER.iter().find(|column| **column == name).map(|column| {
            let ty = Self::FIELDS
                .iter()
                .find(|field| field.column == *column)
                .map(|field| field.ty)
                .unwrap_or(FieldType::Text);
            (*column, ty)
        })
    }
}

pub(crate) fn keys_match(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

/// Two fraction digits; `-0.0` renders as `0.00`.
pub fn format_marks(marks: f64) -> String {
    let marks = if marks == 0.0 { 0.0 } else { marks };
    format!("{marks:.2}")
}

pub fn check_marks(marks: f64) -> Result<f64, Error> {
    if !marks.is_finite() || !(MARKS_MIN..=MARKS_MAX).contains(&marks) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("marks must be between 0 and 100, got {marks}")));
    }
    Ok(marks + 0.0)
}

pub(crate) fn parse_persisted_marks(value: &str) -> Result<f64, Error> {
    value.trim().parse::<f64>().map_err(|err| {
        Error::new(ErrorKind::MalformedRecord)
            .with_message(format!("marks `{value}` is not a number"))
            .with_source(err)
    })
}

pub(crate) fn parse_persisted_integer(value: &str, column: &str) -> Result<u32, Error> {
    value.trim().parse::<u32>().map_err(|err| {
        Error::new(ErrorKind::MalformedRecord)
            .with_message(format!("{column} `{value}` is not a whole number"))
            .with_source(err)
    })
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Float(f64),
    Integer(i64),
}

impl FieldValue {
    /// Converts to the string form stored in the table for a field of type `ty`.
    pub fn to_persisted(&self, ty: FieldType) -> Result<String, Error> {
        match ty {
            FieldType::Text => Ok(self.to_string()),
            FieldType::Marks => {
                let marks = match self {
                    FieldValue::Float(value) => *value,
                    FieldValue::Integer(value) => *value as f64,
                    FieldValue::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                        Error::new(ErrorKind::Usage)
                            .with_message(format!("marks `{text}` is not a number"))
                    })?,
                };
                Ok(format_marks(check_marks(marks)?))
            }
            FieldType::Integer => {
                let value = match self {
                    FieldValue::Integer(value) => u32::try_from(*value).ok(),
                    FieldValue::Float(value) if value.fract() == 0.0 && *value >= 0.0 => {
                        u32::try_from(*value as i64).ok()
                    }
                    FieldValue::Float(_) => None,
                    FieldValue::Text(text) => text.trim().parse::<u32>().ok(),
                };
                value.map(|value| value.to_string()).ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("`{self}` is not a whole number"))
                })
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Parses `field=value`; the value stays text and is converted per field type later.
impl FromStr for FieldUpdate {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (field, value) = input.split_once('=').ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("expected field=value, got `{input}`"))
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("field name must not be empty"));
        }
        Ok(Self::new(field, value))
    }
}
