use chrono::{DateTime, Local};
use std::cmp::Ordering;

use super::attrs::{Attribute, FieldValue};
use super::types::Operator;
use super::values::TypedList;
use crate::errors::QueryError;
use crate::records::Media;

/// Comparison knobs shared by every condition of a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOptions {
    pub case_insensitive: bool,
    /// Doubles closer than this compare equal.
    pub epsilon: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { case_insensitive: false, epsilon: 1e-5 }
    }
}

/// A value kind the evaluator can filter on.
pub trait FilterValue: Sized {
    /// Orders a stored value against a query value.
    fn compare(&self, other: &Self, opts: &CompareOptions) -> Ordering;

    /// Narrows a resolved field to this kind.
    fn from_field(field: FieldValue) -> Option<Self>;
}

impl FilterValue for String {
    fn compare(&self, other: &Self, opts: &CompareOptions) -> Ordering {
        if opts.case_insensitive {
            self.chars()
                .flat_map(char::to_lowercase)
                .cmp(other.chars().flat_map(char::to_lowercase))
        } else {
            self.as_str().cmp(other.as_str())
        }
    }

    fn from_field(field: FieldValue) -> Option<Self> {
        match field {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl FilterValue for i64 {
    fn compare(&self, other: &Self, _: &CompareOptions) -> Ordering {
        self.cmp(other)
    }

    fn from_field(field: FieldValue) -> Option<Self> {
        match field {
            FieldValue::Long(v) => Some(v),
            _ => None,
        }
    }
}

impl FilterValue for i32 {
    fn compare(&self, other: &Self, _: &CompareOptions) -> Ordering {
        self.cmp(other)
    }

    fn from_field(field: FieldValue) -> Option<Self> {
        match field {
            FieldValue::Integer(v) => Some(v),
            _ => None,
        }
    }
}

// Within epsilon counts as equal, so strict `<` and `>` never hold for
// near-equal values while the OR_EQUAL_TO forms always do.
impl FilterValue for f64 {
    fn compare(&self, other: &Self, opts: &CompareOptions) -> Ordering {
        if (self - other).abs() <= opts.epsilon {
            Ordering::Equal
        } else {
            self.total_cmp(other)
        }
    }

    fn from_field(field: FieldValue) -> Option<Self> {
        match field {
            FieldValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl FilterValue for DateTime<Local> {
    fn compare(&self, other: &Self, _: &CompareOptions) -> Ordering {
        self.cmp(other)
    }

    fn from_field(field: FieldValue) -> Option<Self> {
        match field {
            FieldValue::Date(v) => Some(v),
            _ => None,
        }
    }
}

/// Whether a present stored value satisfies `op` against `values`.
pub fn satisfies<T: FilterValue>(op: Operator, stored: &T, values: &[T], opts: &CompareOptions) -> bool {
    let cmp = |q: &T| stored.compare(q, opts);
    let first = values.first().map(cmp);
    match op {
        Operator::Equal | Operator::NumericEqual => first == Some(Ordering::Equal),
        Operator::NotEqual => first.is_some_and(|o| o != Ordering::Equal),
        Operator::LessThan | Operator::NumericLessThan => first == Some(Ordering::Less),
        Operator::LessThanOrEqualTo | Operator::NumericLessThanOrEqualTo => {
            first.is_some_and(|o| o != Ordering::Greater)
        }
        Operator::GreaterThan | Operator::NumericGreaterThan => first == Some(Ordering::Greater),
        Operator::GreaterThanOrEqualTo | Operator::NumericGreaterThanOrEqualTo => {
            first.is_some_and(|o| o != Ordering::Less)
        }
        Operator::In => values.iter().any(|q| cmp(q) == Ordering::Equal),
        Operator::NotIn => !values.iter().any(|q| cmp(q) == Ordering::Equal),
        Operator::Between => match values {
            [lo, hi, ..] => cmp(lo) != Ordering::Less && cmp(hi) != Ordering::Greater,
            _ => false,
        },
        Operator::NotBetween => match values {
            [lo, hi, ..] => cmp(lo) == Ordering::Less || cmp(hi) == Ordering::Greater,
            _ => false,
        },
        Operator::Table => true,
    }
}

/// Narrows `candidates` to the rows whose looked-up value satisfies `op`.
///
/// Rows that resolve to `None` are dropped under every operator. `TABLE`
/// returns the candidates untouched without looking anything up, and a
/// range operator with fewer than two bounds matches nothing.
///
/// # Errors
/// The first lookup error aborts the filter.
pub fn filter_candidates<'a, T, F>(
    op: Operator,
    values: &[T],
    candidates: &[&'a Media],
    opts: &CompareOptions,
    mut lookup: F,
) -> Result<Vec<&'a Media>, QueryError>
where
    T: FilterValue,
    F: FnMut(&Media) -> Result<Option<T>, QueryError>,
{
    if op == Operator::Table {
        return Ok(candidates.to_vec());
    }
    if matches!(op, Operator::Between | Operator::NotBetween) && values.len() < 2 {
        return Ok(Vec::new());
    }
    let mut kept = Vec::with_capacity(candidates.len());
    for &media in candidates {
        let Some(stored) = lookup(media)? else { continue };
        if satisfies(op, &stored, values, opts) {
            kept.push(media);
        }
    }
    Ok(kept)
}

/// Dispatches on the typed list's kind and filters with resolved field values.
///
/// # Errors
/// `TypeMismatch` when `resolve` yields a field of another kind than the
/// list; otherwise whatever `resolve` returns.
pub fn filter_typed<'a, F>(
    attribute: Attribute,
    op: Operator,
    values: &TypedList,
    candidates: &[&'a Media],
    opts: &CompareOptions,
    resolve: F,
) -> Result<Vec<&'a Media>, QueryError>
where
    F: FnMut(&Media) -> Result<Option<FieldValue>, QueryError>,
{
    match values {
        TypedList::Strings(v) => filter_candidates(op, v, candidates, opts, narrowed(attribute, resolve)),
        TypedList::Longs(v) => filter_candidates(op, v, candidates, opts, narrowed(attribute, resolve)),
        TypedList::Doubles(v) => filter_candidates(op, v, candidates, opts, narrowed(attribute, resolve)),
        TypedList::Integers(v) => filter_candidates(op, v, candidates, opts, narrowed(attribute, resolve)),
        TypedList::Dates(v) => filter_candidates(op, v, candidates, opts, narrowed(attribute, resolve)),
    }
}

fn narrowed<T, F>(attribute: Attribute, mut resolve: F) -> impl FnMut(&Media) -> Result<Option<T>, QueryError>
where
    T: FilterValue,
    F: FnMut(&Media) -> Result<Option<FieldValue>, QueryError>,
{
    move |media| match resolve(media)? {
        None => Ok(None),
        Some(field) => T::from_field(field).map(Some).ok_or_else(|| QueryError::TypeMismatch {
            attribute: attribute.name().to_string(),
            expected: attribute.kind().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Media> {
        (0..n).map(|i| Media { media_id: format!("m{i}"), ..Default::default() }).collect()
    }

    fn run<T: FilterValue + Clone>(op: Operator, query: &[T], stored: &[Option<T>], opts: CompareOptions) -> Vec<String> {
        let media = rows(stored.len());
        let cands: Vec<&Media> = media.iter().collect();
        let out = filter_candidates(op, query, &cands, &opts, |m| {
            let i: usize = m.media_id[1..].parse().unwrap();
            Ok(stored[i].clone())
        })
        .unwrap();
        out.into_iter().map(|m| m.media_id.clone()).collect()
    }

    #[test]
    fn double_equality_uses_epsilon() {
        let o = CompareOptions::default();
        assert_eq!(run(Operator::Equal, &[10.0], &[Some(10.000_005)], o), vec!["m0"]);
        assert!(run(Operator::Equal, &[10.0], &[Some(10.0001)], o).is_empty());
        assert_eq!(run(Operator::NotEqual, &[10.0], &[Some(10.0001)], o), vec!["m0"]);
        assert!(run(Operator::NotEqual, &[10.0], &[Some(10.000_005)], o).is_empty());
    }

    #[test]
    fn near_equal_doubles_never_satisfy_strict_ordering() {
        let o = CompareOptions::default();
        let stored = [Some(5.000_001)];
        assert!(run(Operator::GreaterThan, &[5.0], &stored, o).is_empty());
        assert!(run(Operator::NumericLessThan, &[5.0], &stored, o).is_empty());
        assert_eq!(run(Operator::GreaterThanOrEqualTo, &[5.0], &stored, o), vec!["m0"]);
        assert_eq!(run(Operator::NumericLessThanOrEqualTo, &[5.0], &stored, o), vec!["m0"]);
    }

    #[test]
    fn between_is_inclusive_at_both_ends() {
        let o = CompareOptions::default();
        assert_eq!(run(Operator::Between, &[30.0, 32.0], &[Some(32.0)], o), vec!["m0"]);
        assert_eq!(run(Operator::Between, &[32.0, 34.0], &[Some(32.0)], o), vec!["m0"]);
        assert!(run(Operator::NotBetween, &[30.0, 32.0], &[Some(32.0)], o).is_empty());
        assert_eq!(run(Operator::NotBetween, &[30.0, 32.0], &[Some(29.0)], o), vec!["m0"]);
    }

    #[test]
    fn range_needs_two_bounds() {
        let o = CompareOptions::default();
        assert!(run(Operator::Between, &[3_i64], &[Some(3)], o).is_empty());
        assert!(run(Operator::NotBetween, &[3_i64], &[Some(9)], o).is_empty());
    }

    #[test]
    fn absent_rows_never_match() {
        let o = CompareOptions::default();
        let stored: [Option<i64>; 2] = [None, Some(4)];
        assert_eq!(run(Operator::NotEqual, &[3], &stored, o), vec!["m1"]);
        assert_eq!(run(Operator::NotIn, &[3, 5], &stored, o), vec!["m1"]);
        assert_eq!(run(Operator::NotBetween, &[5, 9], &stored, o), vec!["m1"]);
    }

    #[test]
    fn string_case_mode() {
        let stored = [Some("Vulpes Vulpes".to_string())];
        let q = ["vulpes vulpes".to_string()];
        let ci = CompareOptions { case_insensitive: true, ..CompareOptions::default() };
        assert_eq!(run(Operator::Equal, &q, &stored, ci), vec!["m0"]);
        assert!(run(Operator::Equal, &q, &stored, CompareOptions::default()).is_empty());
        assert_eq!(run(Operator::In, &["x".to_string(), "VULPES VULPES".to_string()], &stored, ci), vec!["m0"]);
    }

    #[test]
    fn table_is_a_pass_through() {
        let media = rows(3);
        let cands: Vec<&Media> = media.iter().collect();
        let mut calls = 0;
        let out = filter_candidates::<i64, _>(Operator::Table, &[1], &cands, &CompareOptions::default(), |_| {
            calls += 1;
            Ok(None)
        })
        .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(calls, 0);
    }

    #[test]
    fn wrong_field_kind_is_a_type_mismatch() {
        let media = rows(1);
        let cands: Vec<&Media> = media.iter().collect();
        let err = filter_typed(
            Attribute::Year,
            Operator::Equal,
            &TypedList::Longs(vec![2021]),
            &cands,
            &CompareOptions::default(),
            |_| Ok(Some(FieldValue::Str("2021".into()))),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { ref attribute, .. } if attribute == "year"));
    }

    #[test]
    fn filtering_leaves_input_untouched() {
        let media = rows(4);
        let cands: Vec<&Media> = media.iter().collect();
        let out = filter_candidates(Operator::In, &[1_i32, 3], &cands, &CompareOptions::default(), |m| {
            Ok(Some(m.media_id[1..].parse::<i32>().unwrap()))
        })
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(cands.len(), 4);
    }
}
