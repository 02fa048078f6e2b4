//! Business-local calendar.
//!
//! Which hours row applies depends on the weekday *where the business is*.
//! A plain `YYYY-MM-DD` is always read as a local calendar date and never
//! shifted through UTC; instants are converted with the business time zone.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::model::TimeOfDay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    tz: Tz,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl BusinessCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build from an IANA zone name such as `Europe/Berlin`.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| EngineError::Config(format!("unknown time zone: {name}")))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// The business-local date an instant falls on.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// The business-local wall-clock time of an instant, to the minute.
    pub fn local_time(&self, instant: DateTime<Utc>) -> TimeOfDay {
        let local = instant.with_timezone(&self.tz);
        TimeOfDay::saturating(local.hour() * 60 + local.minute())
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// Accepts `YYYY-MM-DD`, or `today` for the business-local current date.
    pub fn parse_date(&self, input: &str) -> Result<NaiveDate, EngineError> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("today") {
            return Ok(self.today());
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map_err(|_| EngineError::InvalidDate(input.to_string()))
    }

    /// 0 = Sunday .. 6 = Saturday.
    pub fn weekday_index(date: NaiveDate) -> u8 {
        date.weekday().num_days_from_sunday() as u8
    }
}
