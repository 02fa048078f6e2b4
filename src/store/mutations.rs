use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{MutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info};

use crate::engine::{
    EngineError, check_no_conflict, distinct_service_ids, normalize, validate_duration,
    validate_interval, validate_weekday,
};
use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

use super::{BusinessState, DayBook, SharedBusinessState, Store, append_timed};

type WriteGuards = BTreeMap<BusinessId, OwnedRwLockWriteGuard<BusinessState>>;

fn check_label(label: &Option<String>) -> Result<(), EngineError> {
    if let Some(l) = label
        && l.len() > MAX_LABEL_LEN
    {
        return Err(EngineError::LimitExceeded("label too long"));
    }
    Ok(())
}

/// Every order of `service` on `day`, stretched to `service`'s duration,
/// must still end by midnight and overlap nothing else.
fn check_stretched_orders(
    store: &Store,
    day: &DayBook,
    service: &ServiceDefinition,
) -> Result<(), EngineError> {
    if !day
        .orders
        .iter()
        .any(|o| o.service_id == service.id && o.status.blocks())
    {
        return Ok(());
    }
    let mut durations = store.durations_for(&distinct_service_ids(&day.orders));
    durations.insert(service.id, service.duration_minutes);
    let commitments = normalize(&day.orders, &durations, &day.bookings).commitments;

    for order in day
        .orders
        .iter()
        .filter(|o| o.service_id == service.id && o.status.blocks())
    {
        let start = order.start_time;
        let end = start.minutes() + service.duration_minutes;
        let span = Span::checked(start.minutes(), end).ok_or(EngineError::InvalidInterval {
            start,
            end: TimeOfDay::saturating(end),
        })?;
        let others: Vec<Commitment> = commitments
            .iter()
            .filter(|c| c.id != order.id)
            .copied()
            .collect();
        check_no_conflict(&others, &span)?;
    }
    Ok(())
}

fn check_day_capacity(bs: &BusinessState, date: &NaiveDate) -> Result<(), EngineError> {
    if bs.days.get(date).map_or(0, DayBook::len) >= MAX_COMMITMENTS_PER_DAY {
        return Err(EngineError::LimitExceeded("too many commitments on one day"));
    }
    Ok(())
}

impl Store {
    pub async fn register_business(
        &self,
        id: BusinessId,
        name: Option<String>,
    ) -> Result<(), EngineError> {
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("business name too long"));
        }

        let mut wal = self.lock_wal().await;
        if self.businesses.len() >= MAX_BUSINESSES {
            return Err(EngineError::LimitExceeded("too many businesses"));
        }
        if self.businesses.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::BusinessRegistered {
            id,
            name: name.clone(),
        };
        if let Some(wal) = wal.as_mut() {
            append_timed(wal, &event)?;
        }
        self.businesses
            .insert(id, Arc::new(RwLock::new(BusinessState::new(id, name))));
        drop(wal);

        self.notify.send(id, &event);
        info!("registered business {id}");
        Ok(())
    }

    /// Replace one weekday's hours. An inactive row may carry any times.
    pub async fn set_hours(
        &self,
        business_id: BusinessId,
        hours: BusinessHours,
    ) -> Result<(), EngineError> {
        validate_weekday(hours.weekday)?;
        if hours.active {
            validate_interval(hours.start_time, hours.end_time)?;
        }
        let bs = self
            .get_business(&business_id)
            .ok_or(EngineError::NotFound(business_id))?;
        let mut guard = bs.write().await;

        let event = Event::HoursSet { business_id, hours };
        self.persist_and_apply(business_id, &mut guard, &event).await
    }

    pub async fn clear_hours(
        &self,
        business_id: BusinessId,
        weekday: u8,
    ) -> Result<(), EngineError> {
        validate_weekday(weekday)?;
        let bs = self
            .get_business(&business_id)
            .ok_or(EngineError::NotFound(business_id))?;
        let mut guard = bs.write().await;

        let event = Event::HoursCleared { business_id, weekday };
        self.persist_and_apply(business_id, &mut guard, &event).await
    }

    /// Create or redefine a service. Orders take their end from the current
    /// duration, so a longer duration is refused with `SlotTaken` (or
    /// `InvalidInterval` past midnight) if any stored order would then
    /// overlap another commitment.
    pub async fn define_service(&self, service: ServiceDefinition) -> Result<(), EngineError> {
        validate_duration(service.duration_minutes)?;
        if let Some(ref n) = service.name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
        let previous = self.services.get(&service.id).map(|s| s.duration_minutes);
        if previous.is_none() && self.services.len() >= MAX_SERVICES {
            return Err(EngineError::LimitExceeded("too many services"));
        }

        let event = Event::ServiceDefined {
            service: service.clone(),
        };
        // Business locks stay held until the new duration is visible, so no
        // order is placed against the old one meanwhile.
        let (_held, mut wal) = match previous {
            Some(old) if service.duration_minutes > old => {
                let (held, wal) = self.lock_every_business().await;
                for bs in held.values() {
                    for day in bs.days.values() {
                        check_stretched_orders(self, day, &service)?;
                    }
                }
                (held, wal)
            }
            _ => (BTreeMap::new(), self.lock_wal().await),
        };
        if let Some(wal) = wal.as_mut() {
            append_timed(wal, &event)?;
        }
        if let Some(old) = previous
            && old != service.duration_minutes
        {
            info!(
                "service {} duration {old} -> {} minutes",
                service.id, service.duration_minutes
            );
        }
        self.services.insert(service.id, service);
        Ok(())
    }

    /// Write locks on every business, then the WAL lock. Same retry scheme
    /// as [`Store::compact`].
    async fn lock_every_business(&self) -> (WriteGuards, Option<MutexGuard<'_, Wal>>) {
        let mut held = WriteGuards::new();
        loop {
            for (id, bs) in self.businesses_not_in(&held) {
                held.insert(id, bs.write_owned().await);
            }
            let wal = self.lock_wal().await;
            let mut busy = false;
            for (id, bs) in self.businesses_not_in(&held) {
                match bs.try_write_owned() {
                    Ok(guard) => {
                        held.insert(id, guard);
                    }
                    Err(_) => {
                        busy = true;
                        break;
                    }
                }
            }
            if !busy {
                return (held, wal);
            }
            drop(wal);
            held.clear();
            debug!("service redefinition raced a write to a new business, retrying");
        }
    }

    fn businesses_not_in<T>(
        &self,
        held: &BTreeMap<BusinessId, T>,
    ) -> Vec<(BusinessId, SharedBusinessState)> {
        let mut out: Vec<_> = self
            .businesses
            .iter()
            .filter(|e| !held.contains_key(e.key()))
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Record an order-style appointment. Its end is implied by the service.
    pub async fn place_order(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
        appointment: LegacyAppointment,
    ) -> Result<CommitmentId, EngineError> {
        if self.commitment_index.contains_key(&appointment.id) {
            return Err(EngineError::AlreadyExists(appointment.id));
        }

        let bs = self
            .get_business(&business_id)
            .ok_or(EngineError::NotFound(business_id))?;
        let mut guard = bs.write().await;

        // Read under the business lock; a duration change holds every one.
        let duration = self
            .services
            .get(&appointment.service_id)
            .map(|s| s.duration_minutes)
            .ok_or(EngineError::ServiceNotFound(appointment.service_id))?;
        let start = appointment.start_time;
        let span = Span::checked(start.minutes(), start.minutes() + duration).ok_or(
            EngineError::InvalidInterval {
                start,
                end: TimeOfDay::saturating(start.minutes() + duration),
            },
        )?;
        check_day_capacity(&guard, &date)?;

        if appointment.status.blocks()
            && let Some(day) = guard.days.get(&date)
        {
            check_no_conflict(&self.day_commitments(day), &span)?;
        }

        let id = appointment.id;
        let event = Event::OrderPlaced {
            business_id,
            date,
            appointment,
        };
        self.persist_and_apply(business_id, &mut guard, &event).await?;
        debug!("order {id} placed for {business_id} on {date} at {span:?}");
        Ok(id)
    }

    /// Record a booking with explicit ends. Overlap is re-checked under the
    /// business write lock.
    pub async fn place_booking(&self, booking: NewBooking) -> Result<CommitmentId, EngineError> {
        let span = validate_interval(booking.start_time, booking.end_time)?;
        check_label(&booking.label)?;
        if self.commitment_index.contains_key(&booking.id) {
            return Err(EngineError::AlreadyExists(booking.id));
        }
        if let Some(service_id) = booking.service_id
            && !self.services.contains_key(&service_id)
        {
            return Err(EngineError::ServiceNotFound(service_id));
        }

        let business_id = booking.business_id;
        let bs = self
            .get_business(&business_id)
            .ok_or(EngineError::NotFound(business_id))?;
        let mut guard = bs.write().await;
        check_day_capacity(&guard, &booking.date)?;

        if booking.status.blocks()
            && let Some(day) = guard.days.get(&booking.date)
        {
            check_no_conflict(&self.day_commitments(day), &span)?;
        }

        let id = booking.id;
        let date = booking.date;
        let event = Event::BookingPlaced {
            business_id,
            date,
            booking: ExplicitBooking {
                id,
                start_time: booking.start_time,
                end_time: booking.end_time,
                status: booking.status,
                service_id: booking.service_id,
                label: booking.label,
            },
        };
        self.persist_and_apply(business_id, &mut guard, &event).await?;
        debug!("booking {id} placed for {business_id} on {date} at {span:?}");
        Ok(id)
    }

    /// Move a commitment to `status`. Reinstating a cancelled commitment
    /// re-checks overlap against the rest of its day.
    pub async fn set_status(
        &self,
        id: CommitmentId,
        status: CommitmentStatus,
    ) -> Result<BusinessId, EngineError> {
        let (business_id, date, mut guard) = self.resolve_commitment_write(&id).await?;
        let day = guard.days.get(&date).ok_or(EngineError::NotFound(id))?;
        let current = day.status_of(id).ok_or(EngineError::NotFound(id))?;
        if current == status {
            return Ok(business_id);
        }

        if !current.blocks() && status.blocks() {
            let mut with_status = day.clone();
            with_status.set_status(id, status);
            let mine = self
                .day_commitments(&with_status)
                .into_iter()
                .find(|c| c.id == id);
            if let Some(mine) = mine {
                check_no_conflict(&self.day_commitments(&day.without(id)), &mine.span)?;
            }
        }

        let event = Event::StatusChanged {
            id,
            business_id,
            date,
            status,
        };
        self.persist_and_apply(business_id, &mut guard, &event).await?;
        info!("commitment {id} is now {status}");
        Ok(business_id)
    }

    pub async fn cancel(&self, id: CommitmentId) -> Result<BusinessId, EngineError> {
        self.set_status(id, CommitmentStatus::Cancelled).await
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    pub async fn compact(&self) -> Result<(), EngineError> {
        if !self.is_durable() {
            return Ok(());
        }

        // Business locks first (sorted), then the WAL lock. Registrations
        // insert under the WAL lock, so once it is held the set of
        // businesses is fixed. Any that appeared meanwhile are taken without
        // blocking; if one is busy every lock is released and the pass
        // starts over.
        let mut held: BTreeMap<BusinessId, OwnedRwLockReadGuard<BusinessState>> =
            BTreeMap::new();
        let mut wal = loop {
            for (id, bs) in self.businesses_not_in(&held) {
                held.insert(id, bs.read_owned().await);
            }
            let Some(wal) = self.lock_wal().await else {
                return Ok(());
            };
            let mut busy = false;
            for (id, bs) in self.businesses_not_in(&held) {
                match bs.try_read_owned() {
                    Ok(guard) => {
                        held.insert(id, guard);
                    }
                    Err(_) => {
                        busy = true;
                        break;
                    }
                }
            }
            if !busy {
                break wal;
            }
            drop(wal);
            held.clear();
            debug!("compaction raced a write to a new business, retrying");
        };

        let mut events: Vec<Event> = self
            .services
            .iter()
            .map(|e| Event::ServiceDefined {
                service: e.value().clone(),
            })
            .collect();

        for bs in held.values() {
            events.push(Event::BusinessRegistered {
                id: bs.id,
                name: bs.name.clone(),
            });
            for hours in bs.hours.iter().flatten() {
                events.push(Event::HoursSet {
                    business_id: bs.id,
                    hours: hours.clone(),
                });
            }
            for (date, day) in &bs.days {
                for appointment in &day.orders {
                    events.push(Event::OrderPlaced {
                        business_id: bs.id,
                        date: *date,
                        appointment: appointment.clone(),
                    });
                }
                for booking in &day.bookings {
                    events.push(Event::BookingPlaced {
                        business_id: bs.id,
                        date: *date,
                        booking: booking.clone(),
                    });
                }
            }
        }

        let before = wal.appends_since_compact();
        wal.compact(&events)
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!(
            "compacted {} to {} events ({before} appends since last compaction)",
            wal.path().display(),
            events.len()
        );
        Ok(())
    }
}
