//! Analysis window
//!
//! A window bound is either an explicit calendar date or the "use the file's
//! own dates" sentinel. A window with both bounds on the sentinel analyzes the
//! whole project.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ConfigError;

/// Sentinel spellings accepted for "use the dates in the file"
const FROM_FILE_SENTINELS: &[&str] = &["file", "from-file", "from_file", "da file project"];

/// One side of an analysis window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateBound {
    /// Unbounded on this side: the file's own span applies
    #[default]
    FromFile,
    /// Explicit calendar date (inclusive)
    On(NaiveDate),
}

impl DateBound {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateBound::FromFile => None,
            DateBound::On(d) => Some(*d),
        }
    }
}

impl FromStr for DateBound {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty()
            || FROM_FILE_SENTINELS
                .iter()
                .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
        {
            return Ok(DateBound::FromFile);
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
            .map(DateBound::On)
            .map_err(|_| ConfigError::InvalidDate(trimmed.to_string()))
    }
}

impl TryFrom<String> for DateBound {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateBound> for String {
    fn from(bound: DateBound) -> Self {
        bound.to_string()
    }
}

impl std::fmt::Display for DateBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateBound::FromFile => f.write_str("file"),
            DateBound::On(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Date window used to narrow a schedule to "activities active in this period"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default)]
    pub start: DateBound,
    #[serde(default)]
    pub end: DateBound,
}

impl Period {
    /// Build a window, rejecting `start > end`
    pub fn new(start: DateBound, end: DateBound) -> Result<Self, ConfigError> {
        if let (Some(s), Some(e)) = (start.date(), end.date()) {
            if s > e {
                return Err(ConfigError::InvertedPeriod { start: s, end: e });
            }
        }
        Ok(Self { start, end })
    }

    /// Window between two explicit dates
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        Self::new(DateBound::On(start), DateBound::On(end))
    }

    /// The whole project span
    pub fn full() -> Self {
        Self::default()
    }

    /// True when neither side is bounded
    pub fn is_full(&self) -> bool {
        self.start == DateBound::FromFile && self.end == DateBound::FromFile
    }

    /// Overlap test: `finish >= window.start AND start <= window.end`
    pub fn overlaps(&self, start: NaiveDate, finish: NaiveDate) -> bool {
        let after_start = self.start.date().map_or(true, |ws| finish >= ws);
        let before_end = self.end.date().map_or(true, |we| start <= we);
        after_start && before_end
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}
