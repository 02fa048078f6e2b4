//! Collaborators the slot planner and booking desk talk to.
//!
//! Every lookup is an independent read; none depends on another's result
//! except the batched duration lookup, which is keyed by the order list.
//! [`crate::store::Store`] implements all of them.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::engine::EngineError;
use crate::model::*;

#[async_trait]
pub trait BusinessHoursStore: Send + Sync {
    /// `None` when no row exists for the weekday.
    async fn business_hours(
        &self,
        business_id: BusinessId,
        weekday: u8,
    ) -> Result<Option<BusinessHours>, EngineError>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn service(&self, service_id: ServiceId)
        -> Result<Option<ServiceDefinition>, EngineError>;

    /// One call for the whole set. Unknown ids are simply absent from the map.
    async fn service_durations(
        &self,
        service_ids: &BTreeSet<ServiceId>,
    ) -> Result<HashMap<ServiceId, Minutes>, EngineError>;
}

#[async_trait]
pub trait CommitmentSource: Send + Sync {
    /// Order-style appointments on `date`, cancelled ones included.
    async fn legacy_appointments(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
    ) -> Result<Vec<LegacyAppointment>, EngineError>;

    /// Booking-style appointments on `date`, cancelled ones included.
    async fn explicit_bookings(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
    ) -> Result<Vec<ExplicitBooking>, EngineError>;
}

#[async_trait]
pub trait BookingWriter: Send + Sync {
    /// Persist a booking. Implementations must re-check overlap atomically
    /// with the write and answer [`EngineError::SlotTaken`] on conflict.
    async fn write_booking(&self, booking: NewBooking) -> Result<CommitmentId, EngineError>;
}
