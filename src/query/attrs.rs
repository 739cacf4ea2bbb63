use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::errors::QueryError;
use crate::records::{CollectionRecords, Media};
use crate::utils::time::local_from_naive;

/// Logical attributes a condition can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    DateTimeTaken,
    Year,
    Month,
    Hour,
    DayOfYear,
    DayOfWeek,
    LocationName,
    LocationId,
    Latitude,
    Longitude,
    Elevation,
    ScientificName,
    CommonName,
    Count,
    CollectionId,
}

/// How an attribute's values are typed and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Long,
    Double,
    Integer,
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Long => "long",
            Self::Double => "double",
            Self::Integer => "integer",
            Self::Date => "date",
        })
    }
}

/// A value read off a media row through its joins.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Long(i64),
    Double(f64),
    Integer(i32),
    Date(DateTime<Local>),
}

/// Reads one attribute of one media row. `None` means a join step missed.
pub type Lookup = fn(&Media, &CollectionRecords) -> Option<FieldValue>;

impl Attribute {
    pub const ALL: [Attribute; 15] = [
        Self::DateTimeTaken,
        Self::Year,
        Self::Month,
        Self::Hour,
        Self::DayOfYear,
        Self::DayOfWeek,
        Self::LocationName,
        Self::LocationId,
        Self::Latitude,
        Self::Longitude,
        Self::Elevation,
        Self::ScientificName,
        Self::CommonName,
        Self::Count,
        Self::CollectionId,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DateTimeTaken => "dateTimeTaken",
            Self::Year => "year",
            Self::Month => "month",
            Self::Hour => "hour",
            Self::DayOfYear => "dayOfYear",
            Self::DayOfWeek => "dayOfWeek",
            Self::LocationName => "locationName",
            Self::LocationId => "locationID",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Elevation => "elevation",
            Self::ScientificName => "scientificName",
            Self::CommonName => "commonName",
            Self::Count => "count",
            Self::CollectionId => "collectionID",
        }
    }

    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::DateTimeTaken => ValueKind::Date,
            Self::Year | Self::Month | Self::Hour | Self::DayOfYear | Self::DayOfWeek => {
                ValueKind::Long
            }
            Self::Latitude | Self::Longitude | Self::Elevation => ValueKind::Double,
            Self::Count => ValueKind::Integer,
            Self::LocationName
            | Self::LocationId
            | Self::ScientificName
            | Self::CommonName
            | Self::CollectionId => ValueKind::String,
        }
    }

    /// The join-and-extract function for this attribute.
    #[must_use]
    pub fn lookup(self) -> Lookup {
        match self {
            Self::DateTimeTaken => date_time_taken,
            Self::Year => year_taken,
            Self::Month => month_taken,
            Self::Hour => hour_taken,
            Self::DayOfYear => day_of_year_taken,
            Self::DayOfWeek => day_of_week_taken,
            Self::LocationName => location_name,
            Self::LocationId => location_id,
            Self::Latitude => latitude,
            Self::Longitude => longitude,
            Self::Elevation => elevation,
            Self::ScientificName => scientific_name,
            Self::CommonName => common_name,
            Self::Count => species_count,
            Self::CollectionId => collection_id,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(t))
            .ok_or_else(|| QueryError::UnknownAttribute(t.to_string()))
    }
}

/// Resolves attribute values for media rows during execution.
///
/// The executor only talks to this trait, so callers can wrap or replace the
/// standard joins, e.g. to count lookups or to read from another source.
pub trait Resolver: Send + Sync {
    /// # Errors
    /// An error fails the whole collection the row belongs to.
    fn resolve(
        &self,
        attribute: Attribute,
        media: &Media,
        records: &CollectionRecords,
    ) -> Result<Option<FieldValue>, QueryError>;
}

/// The built-in joins over [`CollectionRecords`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardResolver;

impl Resolver for StandardResolver {
    fn resolve(
        &self,
        attribute: Attribute,
        media: &Media,
        records: &CollectionRecords,
    ) -> Result<Option<FieldValue>, QueryError> {
        Ok((attribute.lookup())(media, records))
    }
}

fn taken_at(media: &Media, records: &CollectionRecords) -> Option<NaiveDateTime> {
    records.first_observation(media)?.timestamp
}

fn date_time_taken(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    let naive = taken_at(media, records)?;
    Some(FieldValue::Date(local_from_naive(naive)))
}

fn year_taken(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    taken_at(media, records).map(|t| FieldValue::Long(i64::from(t.year())))
}

fn month_taken(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    taken_at(media, records).map(|t| FieldValue::Long(i64::from(t.month())))
}

fn hour_taken(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    taken_at(media, records).map(|t| FieldValue::Long(i64::from(t.hour())))
}

fn day_of_year_taken(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    taken_at(media, records).map(|t| FieldValue::Long(i64::from(t.ordinal())))
}

// Monday = 1 .. Sunday = 7
fn day_of_week_taken(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    taken_at(media, records).map(|t| FieldValue::Long(i64::from(t.weekday().number_from_monday())))
}

fn location_name(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.deployment_for(media).map(|d| FieldValue::Str(d.location_name.clone()))
}

fn location_id(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.deployment_for(media).map(|d| FieldValue::Str(d.location_id.clone()))
}

fn latitude(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.deployment_for(media)?.latitude.map(FieldValue::Double)
}

fn longitude(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.deployment_for(media)?.longitude.map(FieldValue::Double)
}

fn elevation(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.deployment_for(media)?.camera_height.map(FieldValue::Double)
}

fn scientific_name(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.first_observation(media).map(|o| FieldValue::Str(o.scientific_name.clone()))
}

fn common_name(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    let name = records.first_observation(media)?.common_name()?;
    Some(FieldValue::Str(name.to_string()))
}

fn species_count(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    records.first_observation(media)?.count.map(FieldValue::Integer)
}

// Deployment ids are written as "<collection>:<rest>".
fn collection_id(media: &Media, records: &CollectionRecords) -> Option<FieldValue> {
    let dep = records.first_observation(media)?.deployment_id.as_deref()?;
    let id = dep.split(':').next().unwrap_or(dep);
    Some(FieldValue::Str(id.to_string()))
}
