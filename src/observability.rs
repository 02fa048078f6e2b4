use crate::engine::EngineError;
use crate::model::SlotWarning;

// ── Request-driven ──────────────────────────────────────────────

/// Counter: slot computations. Labels: outcome.
pub const SLOT_COMPUTATIONS_TOTAL: &str = "slotwise_slot_computations_total";

/// Histogram: snapshot gathering plus engine time, in seconds.
pub const SLOT_COMPUTATION_DURATION_SECONDS: &str = "slotwise_slot_computation_duration_seconds";

/// Counter: data-quality warnings raised while computing slots. Labels: kind.
pub const SLOT_WARNINGS_TOTAL: &str = "slotwise_slot_warnings_total";

/// Counter: booking attempts through the desk. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "slotwise_bookings_total";

// ── Resource ────────────────────────────────────────────────────

/// Histogram: WAL append + fsync duration in seconds.
pub const WAL_APPEND_DURATION_SECONDS: &str = "slotwise_wal_append_duration_seconds";

/// Map an error to a short label for metrics.
pub fn error_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::NotFound(_) => "not_found",
        EngineError::AlreadyExists(_) => "already_exists",
        EngineError::ServiceNotFound(_) => "service_not_found",
        EngineError::InvalidDuration(_) => "invalid_duration",
        EngineError::InvalidTime(_) => "invalid_time",
        EngineError::InvalidDate(_) => "invalid_date",
        EngineError::InvalidStatus(_) => "invalid_status",
        EngineError::InvalidWeekday(_) => "invalid_weekday",
        EngineError::InvalidInterval { .. } => "invalid_interval",
        EngineError::NoSchedule(_) => "no_schedule",
        EngineError::OutsideHours { .. } => "outside_hours",
        EngineError::SlotTaken { .. } => "slot_taken",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::Lookup(_) => "lookup",
        EngineError::Config(_) => "config",
        EngineError::WalError(_) => "wal",
    }
}

pub fn warning_label(warning: &SlotWarning) -> &'static str {
    match warning {
        SlotWarning::NoSchedule { .. } => "no_schedule",
        SlotWarning::MalformedCommitment { .. } => "malformed_commitment",
        SlotWarning::UnknownServiceDuration { .. } => "unknown_service_duration",
    }
}
