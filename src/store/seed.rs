//! JSON seed import.
//!
//! Import is idempotent: businesses, services and commitments already present
//! (by id) are left alone, so the same file can be applied on every start.
//! Historical data may double-book; such records are skipped and counted.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::EngineError;
use crate::model::*;
use crate::ports::BusinessHoursStore;

use super::Store;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Seed {
    #[serde(default)]
    pub businesses: Vec<SeedBusiness>,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    #[serde(default)]
    pub orders: Vec<SeedOrder>,
    #[serde(default)]
    pub bookings: Vec<SeedBooking>,
}

#[derive(Debug, Deserialize)]
pub struct SeedBusiness {
    pub id: BusinessId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hours: Vec<BusinessHours>,
}

#[derive(Debug, Deserialize)]
pub struct SeedOrder {
    pub business_id: BusinessId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub appointment: LegacyAppointment,
}

#[derive(Debug, Deserialize)]
pub struct SeedBooking {
    pub business_id: BusinessId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub booking: ExplicitBooking,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub businesses: usize,
    pub hours: usize,
    pub services: usize,
    pub orders: usize,
    pub bookings: usize,
    pub skipped: usize,
}

impl Seed {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(format!("invalid seed: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

/// Apply a seed. Conflicting or already-present commitments are skipped;
/// any other error aborts the import.
pub async fn import(store: &Store, seed: Seed) -> Result<SeedSummary, EngineError> {
    let mut summary = SeedSummary::default();

    for service in seed.services {
        if store.services.get(&service.id).is_some_and(|s| *s == service) {
            continue;
        }
        store.define_service(service).await?;
        summary.services += 1;
    }

    for business in seed.businesses {
        if store.get_business(&business.id).is_none() {
            store.register_business(business.id, business.name).await?;
            summary.businesses += 1;
        }
        for hours in business.hours {
            let current = store.business_hours(business.id, hours.weekday).await?;
            if current.as_ref() == Some(&hours) {
                continue;
            }
            store.set_hours(business.id, hours).await?;
            summary.hours += 1;
        }
    }

    for order in seed.orders {
        if store.contains_commitment(&order.appointment.id) {
            continue;
        }
        let id = order.appointment.id;
        match store
            .place_order(order.business_id, order.date, order.appointment)
            .await
        {
            Ok(_) => summary.orders += 1,
            Err(e @ (EngineError::SlotTaken { .. } | EngineError::InvalidInterval { .. })) => {
                warn!("seed: skipping order {id}: {e}");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for entry in seed.bookings {
        let booking = entry.booking;
        if store.contains_commitment(&booking.id) {
            continue;
        }
        let id = booking.id;
        let request = NewBooking {
            id,
            business_id: entry.business_id,
            date: entry.date,
            service_id: booking.service_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
            label: booking.label,
        };
        match store.place_booking(request).await {
            Ok(_) => summary.bookings += 1,
            Err(e @ (EngineError::SlotTaken { .. } | EngineError::InvalidInterval { .. })) => {
                warn!("seed: skipping booking {id}: {e}");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "seed imported: {} businesses, {} hours rows, {} services, {} orders, {} bookings, {} skipped",
        summary.businesses,
        summary.hours,
        summary.services,
        summary.orders,
        summary.bookings,
        summary.skipped
    );
    Ok(summary)
}
