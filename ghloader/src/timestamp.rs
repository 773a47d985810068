//! Timestamp conventions found in archive records and archive file names.

use crate::error::{LoaderError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// e.g. `2012/03/11 00:00:00 -0800`
const LEGACY_FORMAT: &str = "%Y/%m/%d %H:%M:%S %z";

/// Parses a record's `created_at`.
///
/// The ISO offset form (`2014-05-31T00:13:30-07:00`, also `...Z`) is tried
/// first, then the legacy space-separated form.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    DateTime::parse_from_str(text, LEGACY_FORMAT)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| LoaderError::MalformedTimestamp(text.to_string()))
}

/// Milliseconds since the epoch, the unit stored on edges.
pub fn parse_timestamp_millis(text: &str) -> Result<i64> {
    parse_timestamp(text).map(|t| t.timestamp_millis())
}

/// One hour of archived events, written `YYYY-MM-DD-H` (hour not zero-padded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveHour(DateTime<Utc>);

impl ArchiveHour {
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let date = time.date_naive();
        let start = date
            .and_hms_opt(time.hour(), 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(time);
        Self(start)
    }

    /// Reads the token from a file name such as `2014-05-31-9.json.gz`: everything before the first `.`.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let stem = name.split('.').next().unwrap_or(name);
        stem.parse()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LoaderError::MalformedTimestamp(path.display().to_string()))?;
        Self::from_file_name(name)
    }

    pub fn next_hour(&self) -> Self {
        Self(self.0 + Duration::hours(1))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl FromStr for ArchiveHour {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || LoaderError::MalformedTimestamp(s.to_string());
        let (date, hour) = s.trim().rsplit_once('-').ok_or_else(malformed)?;
        let mut parts = date.split('-');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        let day: u32 = day.parse().map_err(|_| malformed())?;
        let hour: u32 = hour.parse().map_err(|_| malformed())?;
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .ok_or_else(malformed)?;
        Ok(Self(Utc.from_utc_datetime(&naive)))
    }
}

impl fmt::Display for ArchiveHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02}-{}",
            self.0.year(),
            self.0.month(),
            self.0.day(),
            self.0.hour()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_offset_format() {
        let t = parse_timestamp("2014-05-31T00:13:30-07:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2014, 5, 31, 7, 13, 30).unwrap());
        assert!(parse_timestamp("2015-01-01T15:00:00Z").is_ok());
    }

    #[test]
    fn falls_back_to_legacy_format() {
        let t = parse_timestamp("2012/03/11 00:00:00 -0800").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2012, 3, 11, 8, 0, 0).unwrap());
        assert_eq!(
            parse_timestamp_millis("2012/03/11 00:00:00 -0800").unwrap(),
            t.timestamp_millis()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timestamp("not-a-date"),
            Err(LoaderError::MalformedTimestamp(_))
        ));
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn archive_hour_formats_without_hour_padding() {
        let hour: ArchiveHour = "2014-05-31-9".parse().unwrap();
        assert_eq!(hour.to_string(), "2014-05-31-9");
        let padded: ArchiveHour = "2014-05-31-09".parse().unwrap();
        assert_eq!(padded, hour);
        assert_eq!(hour.next_hour().to_string(), "2014-05-31-10");
    }

    #[test]
    fn next_hour_rolls_over_day_and_year() {
        let hour: ArchiveHour = "2013-12-31-23".parse().unwrap();
        assert_eq!(hour.next_hour().to_string(), "2014-01-01-0");
    }

    #[test]
    fn archive_hours_order_chronologically_not_lexically() {
        let nine = ArchiveHour::from_file_name("2014-05-31-9.json.gz").unwrap();
        let ten = ArchiveHour::from_file_name("2014-05-31-10.json").unwrap();
        assert!(nine < ten);
        assert!("2014-05-31-9" > "2014-05-31-10");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["2014-05-31", "2014-13-01-0", "2014-05-31-24", "hello", "2014-05-31-x"] {
            assert!(bad.parse::<ArchiveHour>().is_err(), "{bad}");
        }
        assert!(ArchiveHour::from_file_name("README.md").is_err());
    }

    #[test]
    fn truncates_to_whole_hours() {
        let t = Utc.with_ymd_and_hms(2014, 5, 31, 10, 42, 7).unwrap();
        assert_eq!(ArchiveHour::from_datetime(t).to_string(), "2014-05-31-10");
    }
}
