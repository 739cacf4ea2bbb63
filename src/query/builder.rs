use chrono::NaiveDateTime;
use std::sync::Arc;

use super::attrs::Attribute;
use super::types::{Condition, Operator, Query, QueryPart};
use crate::utils::time::local_from_naive;

/// Fluent construction of a [`Query`].
///
/// Every append pushes an ATTRIBUTE entry followed by a VALUE entry. Values
/// are not type-checked here; that happens when the query is compiled for
/// execution.
///
/// ```
/// use camtrap_query::query::QueryBuilder;
///
/// let q = QueryBuilder::new(true, false)
///     .species(["Puma concolor", "Lynx rufus"])
///     .year_range(2019, 2021)
///     .build();
/// assert_eq!(q.conditions().len(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    conditions: Vec<Condition>,
    distinct: bool,
    case_insensitive: bool,
}

impl QueryBuilder {
    #[must_use]
    pub fn new(distinct: bool, case_insensitive: bool) -> Self {
        Self { conditions: Vec::new(), distinct, case_insensitive }
    }

    /// Appends `attribute op value` as a condition pair.
    #[must_use]
    pub fn condition(mut self, attribute: Attribute, op: Operator, value: impl Into<String>) -> Self {
        self.push_pair(attribute, op, value.into());
        self
    }

    /// Appends one entry exactly as given. The pair structure is checked
    /// when the query is compiled.
    #[must_use]
    pub fn raw_condition(mut self, part: QueryPart, op: Operator, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::new(part, op, value));
        self
    }

    /// Scientific name IN the given list.
    #[must_use]
    pub fn species<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.quoted_in(Attribute::ScientificName, names)
    }

    /// Location id IN the given list.
    #[must_use]
    pub fn locations<I, S>(self, location_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.quoted_in(Attribute::LocationId, location_ids)
    }

    /// Collection id IN the given list.
    #[must_use]
    pub fn collections<I, S>(self, collection_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.quoted_in(Attribute::CollectionId, collection_ids)
    }

    #[must_use]
    pub fn months(self, months: impl IntoIterator<Item = u32>) -> Self {
        self.numeric_in(Attribute::Month, months)
    }

    #[must_use]
    pub fn hours(self, hours: impl IntoIterator<Item = u32>) -> Self {
        self.numeric_in(Attribute::Hour, hours)
    }

    /// Monday is 1, Sunday is 7.
    #[must_use]
    pub fn days_of_week(self, days: impl IntoIterator<Item = u32>) -> Self {
        self.numeric_in(Attribute::DayOfWeek, days)
    }

    /// Inclusive year range.
    #[must_use]
    pub fn year_range(mut self, start: i32, end: i32) -> Self {
        self.push_pair(Attribute::Year, Operator::GreaterThanOrEqualTo, start.to_string());
        self.push_pair(Attribute::Year, Operator::LessThanOrEqualTo, end.to_string());
        self
    }

    /// Taken strictly after `start`, read in the local zone.
    #[must_use]
    pub fn start_date(mut self, start: NaiveDateTime) -> Self {
        self.push_pair(Attribute::DateTimeTaken, Operator::NumericGreaterThan, local_millis(start).to_string());
        self
    }

    /// Taken strictly before `end`, read in the local zone.
    #[must_use]
    pub fn end_date(mut self, end: NaiveDateTime) -> Self {
        self.push_pair(Attribute::DateTimeTaken, Operator::NumericLessThan, local_millis(end).to_string());
        self
    }

    #[must_use]
    pub fn elevation(mut self, value: f64, op: Operator) -> Self {
        self.push_pair(Attribute::Elevation, op, value.to_string());
        self
    }

    #[must_use]
    pub fn build(self) -> Query {
        Query {
            conditions: Arc::from(self.conditions),
            distinct: self.distinct,
            case_insensitive: self.case_insensitive,
        }
    }

    fn push_pair(&mut self, attribute: Attribute, op: Operator, value: String) {
        self.conditions.push(Condition::new(QueryPart::Attribute, Operator::Equal, attribute.name()));
        self.conditions.push(Condition::new(QueryPart::Value, op, value));
    }

    fn quoted_in<I, S>(mut self, attribute: Attribute, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = items.into_iter().map(|s| format!("'{}'", s.as_ref())).collect();
        if !parts.is_empty() {
            self.push_pair(attribute, Operator::In, format!("({})", parts.join(",")));
        }
        self
    }

    fn numeric_in(mut self, attribute: Attribute, items: impl IntoIterator<Item = u32>) -> Self {
        let parts: Vec<String> = items.into_iter().map(|n| n.to_string()).collect();
        if !parts.is_empty() {
            self.push_pair(attribute, Operator::In, format!("({})", parts.join(",")));
        }
        self
    }
}

fn local_millis(t: NaiveDateTime) -> i64 {
    local_from_naive(t).timestamp_millis()
}
