use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// One end of an observation time range.
///
/// The catalogue accepts both zone-less timestamps (interpreted server-side)
/// and UTC timestamps; the two are kept apart so the serialized form matches
/// what the caller supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl TimeBound {
    /// Parse a time-like string.
    ///
    /// Accepts RFC 3339 (`2023-03-28T00:00:00Z`, `...+09:00`), `YYYY-MM-DDTHH:MM:SS`,
    /// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` and `YYYYMMDD`. Dates without a time
    /// component start at midnight.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(TimeBound::Utc(dt.with_timezone(&Utc)));
        }

        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Ok(TimeBound::Naive(dt));
            }
        }

        for fmt in ["%Y-%m-%d", "%Y%m%d"] {
            if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Ok(TimeBound::Naive(start_of_day(d)?));
            }
        }

        Err(Error::InvalidQuery(format!("unsupported time format: {trimmed}")))
    }

    /// The instant used for ordering checks. Naive values are read as UTC.
    pub fn as_utc(&self) -> DateTime<Utc> {
        match self {
            TimeBound::Naive(dt) => dt.and_utc(),
            TimeBound::Utc(dt) => *dt,
        }
    }

    /// Fixed ISO-8601 form sent to the catalogue.
    pub fn to_param_string(&self) -> String {
        match self {
            TimeBound::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            TimeBound::Utc(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

impl fmt::Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param_string())
    }
}

impl From<NaiveDateTime> for TimeBound {
    fn from(value: NaiveDateTime) -> Self {
        TimeBound::Naive(value)
    }
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(value: DateTime<Utc>) -> Self {
        TimeBound::Utc(value)
    }
}

fn start_of_day(d: NaiveDate) -> Result<NaiveDateTime> {
    d.and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidQuery(format!("invalid date: {d}")))
}

/// Parse the `beginPosition`/`endPosition` style timestamps found in records.
pub fn parse_record_time(s: &str) -> Option<DateTime<Utc>> {
    match TimeBound::parse(s).ok()? {
        TimeBound::Utc(dt) => Some(dt),
        TimeBound::Naive(dt) => Some(dt.and_utc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_naive_forms() {
        let expected = NaiveDate::from_ymd_opt(2023, 3, 28)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(
            TimeBound::parse("2023-03-28T12:30:00").unwrap(),
            TimeBound::Naive(expected)
        );
        assert_eq!(
            TimeBound::parse("2023-03-28 12:30:00").unwrap(),
            TimeBound::Naive(expected)
        );
    }

    #[test]
    fn parses_dates_as_midnight() {
        let midnight = TimeBound::parse("20230328").unwrap();
        assert_eq!(midnight, TimeBound::parse("2023-03-28").unwrap());
        assert_eq!(midnight.to_param_string(), "2023-03-28T00:00:00");
    }

    #[test]
    fn parses_rfc3339_into_utc() {
        let t = TimeBound::parse("2023-03-28T09:00:00+09:00").unwrap();
        assert_eq!(
            t,
            TimeBound::Utc(Utc.with_ymd_and_hms(2023, 3, 28, 0, 0, 0).unwrap())
        );
        assert_eq!(t.to_param_string(), "2023-03-28T00:00:00Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            TimeBound::parse("yesterday"),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn record_times_parse_to_utc() {
        let dt = parse_record_time("2023-03-25T00:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-03-25T00:00:00+00:00");
        assert!(parse_record_time("").is_none());
    }
}
