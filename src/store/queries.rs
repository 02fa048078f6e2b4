use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::engine::{EngineError, validate_weekday};
use crate::limits::*;
use crate::model::*;
use crate::ports::*;

use super::{DayBook, Store};

impl Store {
    pub async fn list_businesses(&self) -> Vec<BusinessInfo> {
        // Clone the handles out first; no DashMap guard is held across an await.
        let handles: Vec<_> = self.businesses.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(handles.len());
        for bs in handles {
            let guard = bs.read().await;
            out.push(BusinessInfo {
                id: guard.id,
                name: guard.name.clone(),
            });
        }
        out.sort_by_key(|b| b.id);
        out
    }

    pub fn list_services(&self) -> Vec<ServiceDefinition> {
        let mut out: Vec<ServiceDefinition> =
            self.services.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// A copy of one business day; empty when nothing is booked.
    pub async fn day(&self, business_id: BusinessId, date: NaiveDate) -> DayBook {
        let Some(bs) = self.get_business(&business_id) else {
            return DayBook::default();
        };
        let guard = bs.read().await;
        guard.days.get(&date).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl BusinessHoursStore for Store {
    async fn business_hours(
        &self,
        business_id: BusinessId,
        weekday: u8,
    ) -> Result<Option<BusinessHours>, EngineError> {
        validate_weekday(weekday)?;
        let Some(bs) = self.get_business(&business_id) else {
            return Ok(None);
        };
        let guard = bs.read().await;
        Ok(guard.hours[weekday as usize].clone())
    }
}

#[async_trait]
impl ServiceCatalog for Store {
    async fn service(
        &self,
        service_id: ServiceId,
    ) -> Result<Option<ServiceDefinition>, EngineError> {
        Ok(self.services.get(&service_id).map(|e| e.value().clone()))
    }

    async fn service_durations(
        &self,
        service_ids: &BTreeSet<ServiceId>,
    ) -> Result<HashMap<ServiceId, Minutes>, EngineError> {
        if service_ids.len() > MAX_DURATION_LOOKUP_IDS {
            return Err(EngineError::LimitExceeded("too many service ids in one lookup"));
        }
        Ok(self.durations_for(service_ids))
    }
}

#[async_trait]
impl CommitmentSource for Store {
    async fn legacy_appointments(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
    ) -> Result<Vec<LegacyAppointment>, EngineError> {
        Ok(self.day(business_id, date).await.orders)
    }

    async fn explicit_bookings(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
    ) -> Result<Vec<ExplicitBooking>, EngineError> {
        Ok(self.day(business_id, date).await.bookings)
    }
}

#[async_trait]
impl BookingWriter for Store {
    async fn write_booking(&self, booking: NewBooking) -> Result<CommitmentId, EngineError> {
        self.place_booking(booking).await
    }
}
