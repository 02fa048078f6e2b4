use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::MINUTES_PER_DAY;

/// Minutes since local midnight.
pub type Minutes = u32;

pub type BusinessId = Ulid;
pub type ServiceId = Ulid;
/// Id shared by legacy orders and explicit bookings.
pub type CommitmentId = Ulid;

/// Half-open interval `[start, end)` in minutes since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end <= 24:00`.
    pub fn checked(start: Minutes, end: Minutes) -> Option<Self> {
        (start < end && end <= MINUTES_PER_DAY).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    /// Positive-length intersection; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Wall-clock time in the business's local day, `00:00..=24:00`.
///
/// Parses `HH:MM` and `HH:MM:SS` (seconds are truncated, as stored `time`
/// columns carry them) and always renders as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(Minutes);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: Minutes) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    /// Clamps to `24:00`.
    pub fn saturating(minutes: Minutes) -> Self {
        Self(minutes.min(MINUTES_PER_DAY))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour.checked_mul(60)?.checked_add(minute)?)
    }

    pub fn minutes(self) -> Minutes {
        self.0
    }
}

fn parse_field(field: Option<&str>, max: u32, input: &str) -> Result<u32, EngineError> {
    let invalid = || EngineError::InvalidTime(input.to_string());
    let field = field.ok_or_else(invalid)?;
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u32 = field.parse().map_err(|_| invalid())?;
    if value > max {
        return Err(invalid());
    }
    Ok(value)
}

impl FromStr for TimeOfDay {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(':');
        let hour = parse_field(parts.next(), 24, s)?;
        let minute = parse_field(parts.next(), 59, s)?;
        let second = match parts.next() {
            Some(sec) => parse_field(Some(sec), 59, s)?,
            None => 0,
        };
        if parts.next().is_some() || (hour == 24 && second > 0) {
            return Err(EngineError::InvalidTime(s.to_string()));
        }
        Self::from_hm(hour, minute).ok_or_else(|| EngineError::InvalidTime(s.to_string()))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// One weekday's opening hours. `weekday` is 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub weekday: u8,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl BusinessHours {
    /// The bookable window, or `None` when the day is closed or misconfigured.
    pub fn open_window(&self) -> Option<Span> {
        if !self.active {
            return None;
        }
        Span::checked(self.start_time.minutes(), self.end_time.minutes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: ServiceId,
    #[serde(default)]
    pub name: Option<String>,
    pub duration_minutes: Minutes,
    #[serde(default)]
    pub price_cents: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
    #[default]
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl CommitmentStatus {
    /// Everything except a cancellation occupies the calendar.
    pub fn blocks(self) -> bool {
        !matches!(self, CommitmentStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommitmentStatus::Pending => "pending",
            CommitmentStatus::Confirmed => "confirmed",
            CommitmentStatus::InProgress => "in_progress",
            CommitmentStatus::Completed => "completed",
            CommitmentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for CommitmentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(CommitmentStatus::Pending),
            "confirmed" => Ok(CommitmentStatus::Confirmed),
            "in_progress" | "in-progress" => Ok(CommitmentStatus::InProgress),
            "completed" => Ok(CommitmentStatus::Completed),
            "cancelled" | "canceled" => Ok(CommitmentStatus::Cancelled),
            _ => Err(EngineError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-style appointment: a start time plus the service it books. Its end
/// is implied by that service's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAppointment {
    pub id: CommitmentId,
    pub start_time: TimeOfDay,
    pub service_id: ServiceId,
    #[serde(default)]
    pub status: CommitmentStatus,
}

/// Booking-style appointment with both ends stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitBooking {
    pub id: CommitmentId,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default)]
    pub status: CommitmentStatus,
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    #[serde(default)]
    pub label: Option<String>,
}

/// A normalized existing appointment, whichever source it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    pub id: CommitmentId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSlot {
    pub start_time: TimeOfDay,
    pub available: bool,
}

/// Non-fatal findings reported next to a slot list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotWarning {
    /// No active hours for the weekday; the slot list is empty.
    NoSchedule { weekday: u8 },
    /// `end <= start` (or past midnight); the record was ignored.
    MalformedCommitment {
        id: CommitmentId,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
    },
    /// The order's service had no usable duration; the record was ignored.
    UnknownServiceDuration {
        id: CommitmentId,
        service_id: ServiceId,
    },
}

impl fmt::Display for SlotWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotWarning::NoSchedule { weekday } => {
                write!(f, "no business hours configured for weekday {weekday}")
            }
            SlotWarning::MalformedCommitment {
                id,
                start_time,
                end_time,
            } => write!(f, "commitment {id} has malformed interval {start_time}-{end_time}"),
            SlotWarning::UnknownServiceDuration { id, service_id } => {
                write!(f, "commitment {id} references service {service_id} with no duration")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReport {
    pub weekday: u8,
    pub service_duration: Minutes,
    pub slots: Vec<CandidateSlot>,
    pub warnings: Vec<SlotWarning>,
}

impl SlotReport {
    pub fn has_schedule(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, SlotWarning::NoSchedule { .. }))
    }

    pub fn available_starts(&self) -> impl Iterator<Item = TimeOfDay> + '_ {
        self.slots
            .iter()
            .filter(|s| s.available)
            .map(|s| s.start_time)
    }
}

/// A booking the write path is asked to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub id: CommitmentId,
    pub business_id: BusinessId,
    pub date: NaiveDate,
    pub service_id: Option<ServiceId>,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub status: CommitmentStatus,
    pub label: Option<String>,
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BusinessRegistered {
        id: BusinessId,
        name: Option<String>,
    },
    HoursSet {
        business_id: BusinessId,
        hours: BusinessHours,
    },
    HoursCleared {
        business_id: BusinessId,
        weekday: u8,
    },
    ServiceDefined {
        service: ServiceDefinition,
    },
    OrderPlaced {
        business_id: BusinessId,
        date: NaiveDate,
        appointment: LegacyAppointment,
    },
    BookingPlaced {
        business_id: BusinessId,
        date: NaiveDate,
        booking: ExplicitBooking,
    },
    StatusChanged {
        id: CommitmentId,
        business_id: BusinessId,
        date: NaiveDate,
        status: CommitmentStatus,
    },
}

impl Event {
    /// The business an event belongs to; services are global.
    pub fn business_id(&self) -> Option<BusinessId> {
        match self {
            Event::BusinessRegistered { id, .. } => Some(*id),
            Event::HoursSet { business_id, .. }
            | Event::HoursCleared { business_id, .. }
            | Event::OrderPlaced { business_id, .. }
            | Event::BookingPlaced { business_id, .. }
            | Event::StatusChanged { business_id, .. } => Some(*business_id),
            Event::ServiceDefined { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessInfo {
    pub id: BusinessId,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn span_overlap_is_half_open() {
        let a = Span::new(600, 660);
        assert!(a.overlaps(&Span::new(630, 700)));
        assert!(!a.overlaps(&Span::new(660, 700))); // adjacent, not overlapping
        assert!(!a.overlaps(&Span::new(540, 600)));
        assert!(a.overlaps(&Span::new(659, 661)));
    }

    #[test]
    fn span_checked_rejects_inverted_and_past_midnight() {
        assert!(Span::checked(600, 600).is_none());
        assert!(Span::checked(600, 540).is_none());
        assert!(Span::checked(1400, 1441).is_none());
        assert_eq!(Span::checked(1380, 1440), Some(Span::new(1380, 1440)));
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(540, 780);
        assert!(outer.contains_span(&Span::new(540, 600)));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&Span::new(720, 800)));
    }

    #[test]
    fn time_of_day_parses_database_and_form_formats() {
        assert_eq!(t("09:00").minutes(), 540);
        assert_eq!(t("9:05").minutes(), 545);
        assert_eq!(t("13:30:00").minutes(), 810);
        assert_eq!(t("13:30:59").minutes(), 810);
        assert_eq!(t("24:00"), TimeOfDay::END_OF_DAY);
        assert_eq!(t(" 00:00 "), TimeOfDay::MIDNIGHT);
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        for bad in [
            "",
            "9",
            "25:00",
            "24:01",
            "24:00:01",
            "10:60",
            "+1:00",
            "10:00:00:00",
            "ab:cd",
            "100:00",
        ] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn time_of_day_renders_zero_padded() {
        assert_eq!(TimeOfDay::from_minutes(65).unwrap().to_string(), "01:05");
        assert_eq!(TimeOfDay::END_OF_DAY.to_string(), "24:00");
        assert!(TimeOfDay::from_minutes(1441).is_none());
        assert!(TimeOfDay::from_hm(10, 60).is_none());
    }

    #[test]
    fn time_of_day_json_is_a_string() {
        let json = serde_json::to_string(&t("08:15")).unwrap();
        assert_eq!(json, "\"08:15\"");
        let back: TimeOfDay = serde_json::from_str("\"08:15:00\"").unwrap();
        assert_eq!(back, t("08:15"));
        assert!(serde_json::from_str::<TimeOfDay>("\"8h15\"").is_err());
    }

    #[test]
    fn candidate_slot_uses_camel_case() {
        let slot = CandidateSlot {
            start_time: t("10:30"),
            available: false,
        };
        assert_eq!(
            serde_json::to_value(slot).unwrap(),
            serde_json::json!({ "startTime": "10:30", "available": false })
        );
    }

    #[test]
    fn status_blocks_unless_cancelled() {
        assert!(CommitmentStatus::Pending.blocks());
        assert!(CommitmentStatus::Confirmed.blocks());
        assert!(CommitmentStatus::InProgress.blocks());
        assert!(CommitmentStatus::Completed.blocks());
        assert!(!CommitmentStatus::Cancelled.blocks());
    }

    #[test]
    fn status_parses_spellings() {
        assert_eq!(
            "in-progress".parse::<CommitmentStatus>().unwrap(),
            CommitmentStatus::InProgress
        );
        assert_eq!(
            "Canceled".parse::<CommitmentStatus>().unwrap(),
            CommitmentStatus::Cancelled
        );
        assert!("lost".parse::<CommitmentStatus>().is_err());
    }

    #[test]
    fn hours_window() {
        let mut hours = BusinessHours {
            weekday: 1,
            start_time: t("09:00"),
            end_time: t("17:00"),
            active: true,
        };
        assert_eq!(hours.open_window(), Some(Span::new(540, 1020)));
        hours.active = false;
        assert_eq!(hours.open_window(), None);
        hours.active = true;
        hours.end_time = t("09:00");
        assert_eq!(hours.open_window(), None);
    }

    #[test]
    fn hours_default_to_active_in_json() {
        let json = r#"{"weekday":3,"start_time":"10:00","end_time":"18:00"}"#;
        let hours: BusinessHours = serde_json::from_str(json).unwrap();
        assert!(hours.active);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingPlaced {
            business_id: Ulid::new(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            booking: ExplicitBooking {
                id: Ulid::new(),
                start_time: t("10:00"),
                end_time: t("10:45"),
                status: CommitmentStatus::Confirmed,
                service_id: None,
                label: Some("Rex, nail trim".into()),
            },
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn report_helpers() {
        let report = SlotReport {
            weekday: 0,
            service_duration: 60,
            slots: vec![
                CandidateSlot { start_time: t("09:00"), available: false },
                CandidateSlot { start_time: t("10:00"), available: true },
            ],
            warnings: vec![],
        };
        assert!(report.has_schedule());
        assert_eq!(report.available_starts().collect::<Vec<_>>(), vec![t("10:00")]);
    }
}
