//! Typed value parsing for condition values.
//!
//! A raw value is either a scalar (`42`, `Puma concolor`) or a parenthesized,
//! comma-separated list (`('a','b')`, `(3,4)`). One layer of parentheses is
//! stripped, the text is split on `,`, and each element is parsed for the
//! attribute's [`ValueKind`]. Only string elements lose one layer of single
//! quotes.

use chrono::{DateTime, Local, TimeZone};

use super::attrs::{Attribute, ValueKind};
use crate::errors::QueryError;

/// A parsed, non-empty value list of one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedList {
    Strings(Vec<String>),
    Longs(Vec<i64>),
    Doubles(Vec<f64>),
    Integers(Vec<i32>),
    Dates(Vec<DateTime<Local>>),
}

impl TypedList {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Strings(v) => v.len(),
            Self::Longs(v) => v.len(),
            Self::Doubles(v) => v.len(),
            Self::Integers(v) => v.len(),
            Self::Dates(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A type that can be read from one list element.
pub trait ValueToken: Sized {
    const KIND: ValueKind;

    /// # Errors
    /// Returns a human-readable reason when `token` is not a valid value.
    fn parse_token(token: &str) -> Result<Self, String>;
}

impl ValueToken for String {
    const KIND: ValueKind = ValueKind::String;

    fn parse_token(token: &str) -> Result<Self, String> {
        let t = token.trim();
        let unquoted = t
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(t);
        Ok(unquoted.to_string())
    }
}

impl ValueToken for i64 {
    const KIND: ValueKind = ValueKind::Long;

    fn parse_token(token: &str) -> Result<Self, String> {
        token.trim().parse::<i64>().map_err(|e| e.to_string())
    }
}

impl ValueToken for i32 {
    const KIND: ValueKind = ValueKind::Integer;

    fn parse_token(token: &str) -> Result<Self, String> {
        token.trim().parse::<i32>().map_err(|e| e.to_string())
    }
}

impl ValueToken for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn parse_token(token: &str) -> Result<Self, String> {
        let v = token.trim().parse::<f64>().map_err(|e| e.to_string())?;
        if v.is_nan() {
            return Err("NaN is not comparable".into());
        }
        Ok(v)
    }
}

/// Epoch milliseconds, read into the local time zone.
impl ValueToken for DateTime<Local> {
    const KIND: ValueKind = ValueKind::Date;

    fn parse_token(token: &str) -> Result<Self, String> {
        let millis = token.trim().parse::<i64>().map_err(|e| e.to_string())?;
        Local
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| format!("{millis} ms is out of range"))
    }
}

/// Splits `raw` into its list elements without interpreting them.
#[must_use]
pub fn split_list(raw: &str) -> Vec<&str> {
    let t = raw.trim();
    let inner = t.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(t);
    inner.split(',').collect()
}

/// Parses every element of `raw` as a `T`.
///
/// # Errors
/// The first malformed element fails the whole list.
pub fn parse_list<T: ValueToken>(attribute: &str, raw: &str) -> Result<Vec<T>, QueryError> {
    split_list(raw)
        .into_iter()
        .map(|tok| {
            T::parse_token(tok).map_err(|reason| QueryError::MalformedValue {
                attribute: attribute.to_string(),
                value: raw.to_string(),
                reason: format!("{} element '{}': {reason}", T::KIND, tok.trim()),
            })
        })
        .collect()
}

/// Parses `raw` for the value kind of `attribute`.
///
/// # Errors
/// Fails when any element is malformed for the attribute's kind.
pub fn parse_typed(attribute: Attribute, raw: &str) -> Result<TypedList, QueryError> {
    let name = attribute.name();
    Ok(match attribute.kind() {
        ValueKind::String => TypedList::Strings(parse_list(name, raw)?),
        ValueKind::Long => TypedList::Longs(parse_list(name, raw)?),
        ValueKind::Double => TypedList::Doubles(parse_list(name, raw)?),
        ValueKind::Integer => TypedList::Integers(parse_list(name, raw)?),
        ValueKind::Date => TypedList::Dates(parse_list(name, raw)?),
    })
}
