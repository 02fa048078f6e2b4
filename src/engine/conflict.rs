use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub fn validate_duration(duration: Minutes) -> Result<Minutes, EngineError> {
    if duration == 0 || duration > MAX_SERVICE_DURATION_MINUTES {
        return Err(EngineError::InvalidDuration(duration));
    }
    Ok(duration)
}

pub fn validate_interval(start: TimeOfDay, end: TimeOfDay) -> Result<Span, EngineError> {
    Span::checked(start.minutes(), end.minutes())
        .ok_or(EngineError::InvalidInterval { start, end })
}

pub fn validate_weekday(weekday: u8) -> Result<u8, EngineError> {
    if weekday > 6 {
        return Err(EngineError::InvalidWeekday(weekday));
    }
    Ok(weekday)
}

/// Same overlap test the slot list uses, applied at write time.
pub fn check_no_conflict(commitments: &[Commitment], span: &Span) -> Result<(), EngineError> {
    match commitments.iter().find(|c| c.span.overlaps(span)) {
        Some(existing) => Err(EngineError::SlotTaken {
            start: TimeOfDay::saturating(span.start),
            conflicting: existing.id,
        }),
        None => Ok(()),
    }
}
