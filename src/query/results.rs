use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::records::Media;

/// One matched file: a bucket-scoped directory plus the file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultRow {
    pub path: String,
    pub name: String,
}

impl ResultRow {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self { path: path.into(), name: name.into() }
    }

    /// Splits `media.file_path` into directory and name under `bucket`.
    ///
    /// `a/b/c.jpg` in bucket `cam` becomes (`cam/a/b/`, `c.jpg`). A media
    /// row with an empty path falls back to its `file_name`.
    #[must_use]
    pub fn from_media(bucket: &str, media: &Media) -> Self {
        let file_path = media.file_path.replace('\\', "/");
        let file_path = file_path.trim_start_matches('/');
        let (dir, name) = match file_path.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", file_path),
        };
        let name = if name.is_empty() { media.file_name.as_str() } else { name };
        let path = match (bucket.is_empty(), dir.is_empty()) {
            (true, true) => String::new(),
            (true, false) => format!("{dir}/"),
            (false, true) => format!("{bucket}/"),
            (false, false) => format!("{bucket}/{dir}/"),
        };
        Self::new(path, name)
    }

    /// `path` and `name` joined.
    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{}{}", self.path, self.name)
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.name)
    }
}

/// Ordered query output. In distinct mode a repeated `(path, name)` pair is
/// dropped and the first occurrence keeps its position.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
    seen: Option<HashSet<ResultRow>>,
}

impl ResultSet {
    #[must_use]
    pub fn new(distinct: bool) -> Self {
        Self { rows: Vec::new(), seen: distinct.then(HashSet::new) }
    }

    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.seen.is_some()
    }

    /// Returns whether the row was added.
    pub fn add_row(&mut self, row: ResultRow) -> bool {
        if let Some(seen) = self.seen.as_mut()
            && !seen.insert(row.clone())
        {
            return false;
        }
        self.rows.push(row);
        true
    }

    #[must_use]
    pub fn contains(&self, row: &ResultRow) -> bool {
        match &self.seen {
            Some(seen) => seen.contains(row),
            None => self.rows.contains(row),
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}

impl Extend<ResultRow> for ResultSet {
    fn extend<I: IntoIterator<Item = ResultRow>>(&mut self, iter: I) {
        for row in iter {
            self.add_row(row);
        }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} result(s)", self.rows.len())?;
        for row in self.rows.iter().take(5) {
            writeln!(f, "  {row}")?;
        }
        if self.rows.len() > 5 {
            writeln!(f, "  ... {} more", self.rows.len() - 5)?;
        }
        Ok(())
    }
}
