//! Time windows measured from the first frame of a
//! sequence.
use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Context, Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::*;

/// Whole seconds since the first valid timestamp, written
/// as `HH:MM:SS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct TimeOffset(u64);

impl TimeOffset {
    pub fn from_seconds(seconds: u64) -> Self {
        TimeOffset(seconds)
    }

    pub fn seconds(self) -> u64 {
        self.0
    }

    fn hms(self) -> (u64, u64, u64) {
        (self.0 / 3600, (self.0 % 3600) / 60, self.0 % 60)
    }

    /// `HH-MM-SS`, safe to use in file names.
    pub fn file_label(self) -> String {
        let (h, m, s) = self.hms();
        format!("{:02}-{:02}-{:02}", h, m, s)
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = self.hms();
        write!(f, "{:02}:{:02}:{:02}", h, m, s)
    }
}

impl From<TimeOffset> for String {
    fn from(offset: TimeOffset) -> String {
        offset.to_string()
    }
}

impl FromStr for TimeOffset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^(\d{1,6}):([0-5]\d):([0-5]\d)$").unwrap();
        }

        let caps = RE
            .captures(s.trim())
            .ok_or_else(|| anyhow!("expected HH:MM:SS, found {:?}", s))?;
        let field = |idx: usize| -> Result<u64> {
            caps[idx]
                .parse()
                .with_context(|| format!("time field out of range in {:?}", s))
        };
        Ok(TimeOffset(field(1)? * 3600 + field(2)? * 60 + field(3)?))
    }
}

/// Inclusive range of elapsed times. Either bound may be
/// open; an open end extends to the last frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: Option<TimeOffset>,
    end: Option<TimeOffset>,
}

impl TimeWindow {
    /// Window selecting every frame.
    pub fn all() -> Self {
        TimeWindow::default()
    }

    /// Fails on contradictory bounds: an end without a
    /// start, or an end before the start.
    pub fn new(start: Option<TimeOffset>, end: Option<TimeOffset>) -> Result<Self> {
        match (start, end) {
            (None, Some(end)) => bail!("end time {} given without a start time", end),
            (Some(start), Some(end)) if end < start => {
                bail!("end time {} precedes start time {}", end, start)
            }
            _ => Ok(TimeWindow { start, end }),
        }
    }

    /// Build from the raw `HH:MM:SS` strings of the command
    /// line.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .map(|s| s.parse::<TimeOffset>().context("invalid start time"))
            .transpose()?;
        let end = end
            .map(|s| s.parse::<TimeOffset>().context("invalid end time"))
            .transpose()?;
        TimeWindow::new(start, end)
    }

    pub fn contains(&self, elapsed_seconds: u64) -> bool {
        self.start.map_or(true, |s| s.seconds() <= elapsed_seconds)
            && self.end.map_or(true, |e| elapsed_seconds <= e.seconds())
    }

    /// Suffix naming the output produced from this window.
    pub fn suffix(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) => format!("{}_to_{}", start.file_label(), end.file_label()),
            (Some(start), None) => format!("{}_to_end", start.file_label()),
            _ => "all".into(),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => write!(f, "{} to {}", start, end),
            (Some(start), None) => write!(f, "{} onwards", start),
            _ => write!(f, "all frames"),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn offset(s: &str) -> TimeOffset {
        s.parse().unwrap()
    }

    #[test]
    fn parses_offsets() -> Result<()> {
        assert_eq!("00:00:00".parse::<TimeOffset>()?.seconds(), 0);
        assert_eq!("01:02:03".parse::<TimeOffset>()?.seconds(), 3723);
        assert_eq!("125:00:10".parse::<TimeOffset>()?.seconds(), 450_010);
        assert_eq!(offset("1:05:00").to_string(), "01:05:00");
        assert_eq!(offset("00:10:05").file_label(), "00-10-05");

        for bad in ["", "10:00", "00:60:00", "00:00:61", "aa:bb:cc", "-1:00:00"].iter() {
            assert!(bad.parse::<TimeOffset>().is_err(), "{:?} should not parse", bad);
        }
        Ok(())
    }

    #[test]
    fn end_without_start_fails() {
        let err = TimeWindow::parse(None, Some("00:01:00")).unwrap_err();
        assert!(err.to_string().contains("without a start"));
    }

    #[test]
    fn end_before_start_fails() {
        assert!(TimeWindow::parse(Some("00:02:00"), Some("00:01:00")).is_err());
    }

    #[test]
    fn invalid_strings_are_reported() {
        let err = TimeWindow::parse(Some("noon"), None).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid start time"));
    }

    #[test]
    fn bounds_are_inclusive() -> Result<()> {
        let window = TimeWindow::parse(Some("00:00:10"), Some("00:00:20"))?;
        assert!(!window.contains(9));
        assert!(window.contains(10));
        assert!(window.contains(15));
        assert!(window.contains(20));
        assert!(!window.contains(21));

        let open = TimeWindow::parse(Some("00:00:10"), None)?;
        assert!(!open.contains(9));
        assert!(open.contains(u64::MAX));

        let all = TimeWindow::parse(None, None)?;
        assert_eq!(all, TimeWindow::all());
        assert!(all.contains(0));
        Ok(())
    }

    #[test]
    fn names_outputs() -> Result<()> {
        assert_eq!(TimeWindow::all().suffix(), "all");
        assert_eq!(
            TimeWindow::parse(Some("00:00:10"), None)?.suffix(),
            "00-00-10_to_end"
        );
        assert_eq!(
            TimeWindow::parse(Some("00:00:10"), Some("01:00:00"))?.suffix(),
            "00-00-10_to_01-00-00"
        );
        Ok(())
    }
}
