//! Slot availability: pure, synchronous, no shared state.
//!
//! Callers gather a [`DaySnapshot`] (hours, the requested duration, both
//! commitment sources and the batched service durations) and get back an
//! ordered [`SlotReport`]. Nothing here performs I/O or writes.

mod conflict;
mod error;
mod normalize;
mod slots;

pub use conflict::{check_no_conflict, validate_duration, validate_interval, validate_weekday};
pub use error::EngineError;
pub use normalize::{distinct_service_ids, normalize, Normalized};
pub use slots::candidate_slots;

use std::collections::HashMap;

use crate::model::*;

/// Immutable inputs for one slot computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySnapshot {
    /// 0 = Sunday .. 6 = Saturday, in the business's local calendar.
    pub weekday: u8,
    pub hours: Option<BusinessHours>,
    pub service_duration: Minutes,
    pub legacy: Vec<LegacyAppointment>,
    /// Durations for the services referenced by `legacy`.
    pub durations: HashMap<ServiceId, Minutes>,
    pub explicit: Vec<ExplicitBooking>,
}

/// Compute the day's candidate slots.
///
/// Missing, inactive or inverted hours (or hours recorded for a different
/// weekday) give an empty list with [`SlotWarning::NoSchedule`].
pub fn compute_slots(snapshot: &DaySnapshot) -> SlotReport {
    let window = snapshot
        .hours
        .as_ref()
        .filter(|h| h.weekday == snapshot.weekday)
        .and_then(BusinessHours::open_window);

    let Some(window) = window else {
        return SlotReport {
            weekday: snapshot.weekday,
            service_duration: snapshot.service_duration,
            slots: Vec::new(),
            warnings: vec![SlotWarning::NoSchedule {
                weekday: snapshot.weekday,
            }],
        };
    };

    let Normalized {
        commitments,
        warnings,
    } = normalize(&snapshot.legacy, &snapshot.durations, &snapshot.explicit);

    SlotReport {
        weekday: snapshot.weekday,
        service_duration: snapshot.service_duration,
        slots: candidate_slots(window, snapshot.service_duration, &commitments),
        warnings,
    }
}
