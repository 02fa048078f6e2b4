use ulid::Ulid;

use crate::model::{CommitmentId, Minutes, ServiceId, TimeOfDay};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    ServiceNotFound(ServiceId),
    /// Service duration must be a positive number of minutes.
    InvalidDuration(Minutes),
    InvalidTime(String),
    InvalidDate(String),
    InvalidStatus(String),
    InvalidWeekday(u8),
    InvalidInterval {
        start: TimeOfDay,
        end: TimeOfDay,
    },
    /// The requested day has no active hours.
    NoSchedule(u8),
    OutsideHours {
        start: TimeOfDay,
        end: TimeOfDay,
    },
    /// Another commitment got there first. Retryable: refresh slots and pick again.
    SlotTaken {
        start: TimeOfDay,
        conflicting: CommitmentId,
    },
    LimitExceeded(&'static str),
    /// An upstream lookup (hours, catalog, commitments) failed.
    Lookup(String),
    Config(String),
    WalError(String),
}

impl EngineError {
    /// Whether the caller may retry after refreshing its view.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::SlotTaken { .. } | EngineError::Lookup(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::ServiceNotFound(id) => write!(f, "service not found: {id}"),
            EngineError::InvalidDuration(d) => {
                write!(f, "invalid service duration: {d} minutes")
            }
            EngineError::InvalidTime(s) => write!(f, "invalid time of day: {s:?}"),
            EngineError::InvalidDate(s) => write!(f, "invalid date: {s:?}"),
            EngineError::InvalidStatus(s) => write!(f, "invalid status: {s:?}"),
            EngineError::InvalidWeekday(d) => write!(f, "invalid weekday: {d}"),
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: {start}-{end} ends before it starts")
            }
            EngineError::NoSchedule(weekday) => {
                write!(f, "no business hours configured for weekday {weekday}")
            }
            EngineError::OutsideHours { start, end } => {
                write!(f, "{start}-{end} falls outside business hours")
            }
            EngineError::SlotTaken { start, conflicting } => {
                write!(f, "slot {start} is taken (conflicts with {conflicting})")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Lookup(e) => write!(f, "lookup failed: {e}"),
            EngineError::Config(e) => write!(f, "configuration error: {e}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
