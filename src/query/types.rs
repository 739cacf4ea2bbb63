use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::QueryError;

/// Which half of a condition an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryPart {
    /// The entry's value is a logical attribute name.
    Attribute,
    /// The entry's operator and value are the comparison to apply.
    Value,
}

/// Comparison operators. The `Numeric*` variants behave exactly like their
/// plain counterparts; both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    NumericEqual,
    NumericLessThan,
    NumericLessThanOrEqualTo,
    NumericGreaterThan,
    NumericGreaterThanOrEqualTo,
    In,
    NotIn,
    Between,
    NotBetween,
    /// Accepted for compatibility; never filters.
    Table,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Self::NotEqual,
        Self::LessThanOrEqualTo,
        Self::GreaterThanOrEqualTo,
        Self::Table,
        Self::NumericLessThan,
        Self::NumericLessThanOrEqualTo,
        Self::NumericGreaterThanOrEqualTo,
        Self::NumericGreaterThan,
        Self::NumericEqual,
        Self::Equal,
        Self::LessThan,
        Self::GreaterThan,
        Self::In,
        Self::NotIn,
        Self::Between,
        Self::NotBetween,
    ];

    /// Symbolic spelling, e.g. `n>=` or `not between`.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
            Self::NumericEqual => "n=",
            Self::NumericLessThan => "n<",
            Self::NumericLessThanOrEqualTo => "n<=",
            Self::NumericGreaterThan => "n>",
            Self::NumericGreaterThanOrEqualTo => "n>=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Between => "between",
            Self::NotBetween => "not between",
            Self::Table => "table",
        }
    }

    /// Enum-style spelling, e.g. `NUMERIC_GREATER_THAN_OR_EQUAL_TO`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            Self::NumericEqual => "NUMERIC_EQUAL",
            Self::NumericLessThan => "NUMERIC_LESS_THAN",
            Self::NumericLessThanOrEqualTo => "NUMERIC_LESS_THAN_OR_EQUAL_TO",
            Self::NumericGreaterThan => "NUMERIC_GREATER_THAN",
            Self::NumericGreaterThanOrEqualTo => "NUMERIC_GREATER_THAN_OR_EQUAL_TO",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT_BETWEEN",
            Self::Table => "TABLE",
        }
    }

    /// Operators whose value is a list rather than a scalar.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between | Self::NotBetween)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    /// Accepts the symbolic or the enum-style spelling, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() {
            return Err(QueryError::InvalidOperator("empty operator".into()));
        }
        Self::ALL
            .into_iter()
            .find(|op| op.symbol().eq_ignore_ascii_case(t) || op.name().eq_ignore_ascii_case(t))
            .ok_or_else(|| QueryError::InvalidOperator(t.to_string()))
    }
}

/// One entry of a query's condition list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub part: QueryPart,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    pub fn new(part: QueryPart, operator: Operator, value: impl Into<String>) -> Self {
        Self { part, operator, value: value.into() }
    }
}

/// A finished query: an immutable condition list plus result flags.
///
/// Cloning is cheap; the conditions are shared.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) conditions: Arc<[Condition]>,
    pub(crate) distinct: bool,
    pub(crate) case_insensitive: bool,
}

impl Query {
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}
