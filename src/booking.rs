//! Write path: turn a picked slot into a booking.
//!
//! The desk checks the pick against the day's hours; the writer re-checks
//! overlap atomically with the write, so a stale slot list surfaces as a
//! retryable [`EngineError::SlotTaken`] rather than a double booking.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ulid::Ulid;

use crate::calendar::BusinessCalendar;
use crate::engine::{EngineError, validate_duration};
use crate::model::*;
use crate::observability::{self, error_label};
use crate::ports::{BookingWriter, BusinessHoursStore, ServiceCatalog};

/// A slot the user chose from a slot list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotPick {
    pub business_id: BusinessId,
    pub date: NaiveDate,
    pub service_id: ServiceId,
    pub start_time: TimeOfDay,
    #[serde(default)]
    pub status: CommitmentStatus,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub id: CommitmentId,
    pub business_id: BusinessId,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

#[derive(Clone)]
pub struct BookingDesk {
    hours: Arc<dyn BusinessHoursStore>,
    catalog: Arc<dyn ServiceCatalog>,
    writer: Arc<dyn BookingWriter>,
}

impl BookingDesk {
    pub fn new(
        hours: Arc<dyn BusinessHoursStore>,
        catalog: Arc<dyn ServiceCatalog>,
        writer: Arc<dyn BookingWriter>,
    ) -> Self {
        Self {
            hours,
            catalog,
            writer,
        }
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BusinessHoursStore + ServiceCatalog + BookingWriter + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub async fn pick_slot(&self, pick: SlotPick) -> Result<BookingReceipt, EngineError> {
        let result = self.book(pick).await;
        let outcome = match &result {
            Ok(_) => "booked",
            Err(e) => error_label(e),
        };
        metrics::counter!(observability::BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn book(&self, pick: SlotPick) -> Result<BookingReceipt, EngineError> {
        if !pick.status.blocks() {
            return Err(EngineError::InvalidStatus(pick.status.to_string()));
        }
        let weekday = BusinessCalendar::weekday_index(pick.date);
        let (hours, service) = tokio::try_join!(
            self.hours.business_hours(pick.business_id, weekday),
            self.catalog.service(pick.service_id),
        )?;
        let service = service.ok_or(EngineError::ServiceNotFound(pick.service_id))?;
        let duration = validate_duration(service.duration_minutes)?;

        let window = hours
            .filter(|h| h.weekday == weekday)
            .and_then(|h| h.open_window())
            .ok_or(EngineError::NoSchedule(weekday))?;

        let start = pick.start_time;
        let end_minutes = start.minutes() + duration;
        let end = TimeOfDay::saturating(end_minutes);
        Span::checked(start.minutes(), end_minutes)
            .filter(|span| window.contains_span(span))
            .ok_or(EngineError::OutsideHours { start, end })?;

        let booking = NewBooking {
            id: Ulid::new(),
            business_id: pick.business_id,
            date: pick.date,
            service_id: Some(service.id),
            start_time: start,
            end_time: end,
            status: pick.status,
            label: pick.label,
        };
        match self.writer.write_booking(booking).await {
            Ok(id) => {
                info!("booked {id} for {} on {} at {start}-{end}", pick.business_id, pick.date);
                Ok(BookingReceipt {
                    id,
                    business_id: pick.business_id,
                    date: pick.date,
                    start_time: start,
                    end_time: end,
                })
            }
            Err(e @ EngineError::SlotTaken { .. }) => {
                warn!("{} on {}: {e}", pick.business_id, pick.date);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
