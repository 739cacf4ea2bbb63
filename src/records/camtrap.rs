use chrono::{DateTime, NaiveDateTime};
use csv::StringRecord;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::options::{CsvOptions, LoadReport};
use super::store::CollectionRecords;
use super::types::{Deployment, Media, Observation};
use crate::errors::QueryError;

pub const DEPLOYMENTS_FILE: &str = "deployments.csv";
pub const MEDIA_FILE: &str = "media.csv";
pub const OBSERVATIONS_FILE: &str = "observations.csv";

const DEPLOYMENT_COLUMNS: usize = 23;
const MEDIA_COLUMNS: usize = 11;
const OBSERVATION_COLUMNS: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Loads the three Camtrap files of one collection directory.
///
/// # Errors
/// Fails if a file is missing or unreadable, or a row cannot be parsed and
/// `opts.skip_errors` is not set.
pub fn load_collection_dir(
    bucket: &str,
    dir: &Path,
    opts: &CsvOptions,
) -> Result<(CollectionRecords, LoadReport), QueryError> {
    let mut report = LoadReport::default();
    let deployments = read_deployments(open(dir, DEPLOYMENTS_FILE)?, opts, &mut report)?;
    let media = read_media(open(dir, MEDIA_FILE)?, opts, &mut report)?;
    let observations = read_observations(open(dir, OBSERVATIONS_FILE)?, opts, &mut report)?;
    log::info!(
        "loaded collection {bucket} from {}: {} deployments, {} media, {} observations ({} skipped)",
        dir.display(),
        report.deployments,
        report.media,
        report.observations,
        report.skipped
    );
    Ok((CollectionRecords::new(bucket, deployments, media, observations), report))
}

/// Writes the three Camtrap files of `records` into `dir`, creating it if needed.
///
/// # Errors
/// Fails on any I/O or CSV encoding error.
pub fn save_collection_dir(records: &CollectionRecords, dir: &Path) -> Result<(), QueryError> {
    std::fs::create_dir_all(dir)?;
    write_deployments(File::create(dir.join(DEPLOYMENTS_FILE))?, records.deployments())?;
    write_media(File::create(dir.join(MEDIA_FILE))?, records.media())?;
    write_observations(File::create(dir.join(OBSERVATIONS_FILE))?, records.observations())?;
    Ok(())
}

fn open(dir: &Path, name: &str) -> Result<File, QueryError> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(QueryError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("missing {name} in collection folder '{}'", dir.display()),
        )));
    }
    Ok(File::open(path)?)
}

/// # Errors
/// See [`load_collection_dir`].
pub fn read_deployments<R: Read>(
    reader: R,
    opts: &CsvOptions,
    report: &mut LoadReport,
) -> Result<Vec<Deployment>, QueryError> {
    let rows = read_rows(reader, opts, DEPLOYMENTS_FILE, DEPLOYMENT_COLUMNS, &mut report.skipped, |r| {
        Ok(Deployment {
            deployment_id: r.opt_text(0),
            location_id: r.text(1),
            location_name: r.text(2),
            longitude: r.f64(3)?,
            latitude: r.f64(4)?,
            coordinate_uncertainty: r.i32(5)?,
            start: r.timestamp(6)?,
            end: r.timestamp(7)?,
            setup_by: r.text(8),
            camera_id: r.text(9),
            camera_model: r.text(10),
            camera_interval: r.i32(11)?,
            camera_height: r.f64(12)?,
            camera_tilt: r.f64(13)?,
            camera_heading: r.i32(14)?,
            timestamp_issues: r.flag(15),
            bait_use: r.text(16),
            session: r.text(17),
            array: r.text(18),
            feature_type: r.text(19),
            habitat: r.text(20),
            tags: r.text(21),
            notes: r.text(22),
        })
    })?;
    report.deployments += rows.len() as u64;
    Ok(rows)
}

/// # Errors
/// See [`load_collection_dir`].
pub fn read_media<R: Read>(
    reader: R,
    opts: &CsvOptions,
    report: &mut LoadReport,
) -> Result<Vec<Media>, QueryError> {
    let rows = read_rows(reader, opts, MEDIA_FILE, MEDIA_COLUMNS, &mut report.skipped, |r| {
        Ok(Media {
            media_id: r.text(0),
            deployment_id: r.opt_text(1),
            sequence_id: r.text(2),
            capture_method: r.text(3),
            timestamp: r.timestamp(4)?,
            file_path: r.text(5),
            file_name: r.text(6),
            file_media_type: r.text(7),
            exif_data: r.text(8),
            favorite: r.flag(9),
            comments: r.text(10),
        })
    })?;
    report.media += rows.len() as u64;
    Ok(rows)
}

/// # Errors
/// See [`load_collection_dir`].
pub fn read_observations<R: Read>(
    reader: R,
    opts: &CsvOptions,
    report: &mut LoadReport,
) -> Result<Vec<Observation>, QueryError> {
    let rows = read_rows(reader, opts, OBSERVATIONS_FILE, OBSERVATION_COLUMNS, &mut report.skipped, |r| {
        Ok(Observation {
            observation_id: r.opt_text(0),
            deployment_id: r.opt_text(1),
            sequence_id: r.text(2),
            media_id: r.text(3),
            timestamp: r.timestamp(4)?,
            observation_type: r.text(5),
            camera_setup: r.flag(6),
            taxon_id: r.text(7),
            scientific_name: r.text(8),
            count: r.i32(9)?,
            count_new: r.i32(10)?,
            life_stage: r.text(11),
            sex: r.text(12),
            behaviour: r.text(13),
            individual_id: r.text(14),
            classification_method: r.text(15),
            classified_by: r.text(16),
            classification_timestamp: r.timestamp(17)?,
            classification_confidence: r.f64(18)?,
            comments: r.text(19),
        })
    })?;
    report.observations += rows.len() as u64;
    Ok(rows)
}

fn read_rows<R, T, F>(
    reader: R,
    opts: &CsvOptions,
    file: &str,
    columns: usize,
    skipped: &mut u64,
    parse: F,
) -> Result<Vec<T>, QueryError>
where
    R: Read,
    F: Fn(&Row<'_>) -> Result<T, String>,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(opts.has_headers)
        .delimiter(opts.delimiter)
        .flexible(true)
        .from_reader(reader);
    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let row_no = i + 1;
        let parsed = match rec {
            Ok(rec) if rec.len() < columns => {
                Err(format!("expected {columns} columns, found {}", rec.len()))
            }
            Ok(rec) => parse(&Row(&rec)),
            Err(e) => Err(e.to_string()),
        };
        match parsed {
            Ok(v) => out.push(v),
            Err(reason) if opts.skip_errors => {
                log::warn!("skipping {file} row {row_no}: {reason}");
                *skipped += 1;
            }
            Err(reason) => {
                return Err(QueryError::InvalidRecord { file: file.to_string(), row: row_no, reason });
            }
        }
    }
    Ok(out)
}

struct Row<'r>(&'r StringRecord);

impl Row<'_> {
    fn raw(&self, i: usize) -> &str {
        self.0.get(i).unwrap_or("")
    }

    fn text(&self, i: usize) -> String {
        self.raw(i).to_string()
    }

    fn opt_text(&self, i: usize) -> Option<String> {
        let s = self.raw(i);
        (!s.is_empty()).then(|| s.to_string())
    }

    fn flag(&self, i: usize) -> bool {
        let s = self.raw(i).trim();
        s.eq_ignore_ascii_case("true") || s == "1"
    }

    fn f64(&self, i: usize) -> Result<Option<f64>, String> {
        match parse_opt::<f64>(self.raw(i), i)? {
            Some(v) if !v.is_finite() => Err(format!("column {i}: '{}' is not a finite number", self.raw(i).trim())),
            v => Ok(v),
        }
    }

    fn i32(&self, i: usize) -> Result<Option<i32>, String> {
        parse_opt(self.raw(i), i)
    }

    fn timestamp(&self, i: usize) -> Result<Option<NaiveDateTime>, String> {
        let s = self.raw(i).trim();
        if s.is_empty() {
            return Ok(None);
        }
        parse_timestamp(s).map(Some).ok_or_else(|| format!("column {i}: bad timestamp '{s}'"))
    }
}

fn parse_opt<T: std::str::FromStr>(raw: &str, col: usize) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<T>().map(Some).map_err(|e| format!("column {col}: '{s}': {e}"))
}

/// ISO-8601 local date-time, with optional seconds, fraction, or offset.
/// An offset is dropped and the wall-clock time kept.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_local()))
}

fn fmt_timestamp(t: Option<NaiveDateTime>) -> String {
    t.map(|t| t.format(TIMESTAMP_FORMAT).to_string()).unwrap_or_default()
}

fn fmt_opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_flag(b: bool) -> String {
    if b { "true".into() } else { "false".into() }
}

/// # Errors
/// Fails on any I/O or CSV encoding error.
pub fn write_deployments<W: Write>(writer: W, rows: &[Deployment]) -> Result<(), QueryError> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for d in rows {
        w.write_record([
            d.deployment_id.clone().unwrap_or_default(),
            d.location_id.clone(),
            d.location_name.clone(),
            fmt_opt(d.longitude),
            fmt_opt(d.latitude),
            fmt_opt(d.coordinate_uncertainty),
            fmt_timestamp(d.start),
            fmt_timestamp(d.end),
            d.setup_by.clone(),
            d.camera_id.clone(),
            d.camera_model.clone(),
            fmt_opt(d.camera_interval),
            fmt_opt(d.camera_height),
            fmt_opt(d.camera_tilt),
            fmt_opt(d.camera_heading),
            fmt_flag(d.timestamp_issues),
            d.bait_use.clone(),
            d.session.clone(),
            d.array.clone(),
            d.feature_type.clone(),
            d.habitat.clone(),
            d.tags.clone(),
            d.notes.clone(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// # Errors
/// Fails on any I/O or CSV encoding error.
pub fn write_media<W: Write>(writer: W, rows: &[Media]) -> Result<(), QueryError> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for m in rows {
        w.write_record([
            m.media_id.clone(),
            m.deployment_id.clone().unwrap_or_default(),
            m.sequence_id.clone(),
            m.capture_method.clone(),
            fmt_timestamp(m.timestamp),
            m.file_path.clone(),
            m.file_name.clone(),
            m.file_media_type.clone(),
            m.exif_data.clone(),
            fmt_flag(m.favorite),
            m.comments.clone(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// # Errors
/// Fails on any I/O or CSV encoding error.
pub fn write_observations<W: Write>(writer: W, rows: &[Observation]) -> Result<(), QueryError> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for o in rows {
        w.write_record([
            o.observation_id.clone().unwrap_or_default(),
            o.deployment_id.clone().unwrap_or_default(),
            o.sequence_id.clone(),
            o.media_id.clone(),
            fmt_timestamp(o.timestamp),
            o.observation_type.clone(),
            fmt_flag(o.camera_setup),
            o.taxon_id.clone(),
            o.scientific_name.clone(),
            fmt_opt(o.count),
            fmt_opt(o.count_new),
            o.life_stage.clone(),
            o.sex.clone(),
            o.behaviour.clone(),
            o.individual_id.clone(),
            o.classification_method.clone(),
            o.classified_by.clone(),
            fmt_timestamp(o.classification_timestamp),
            fmt_opt(o.classification_confidence),
            o.comments.clone(),
        ])?;
    }
    w.flush()?;
    Ok(())
}
