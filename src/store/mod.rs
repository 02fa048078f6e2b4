//! In-memory store behind every port, with an optional write-ahead log.
//!
//! Each business lives behind its own `RwLock`; a write holds that lock
//! across conflict check, WAL append and apply, so two clients racing for
//! the same slot are serialized and the loser sees `SlotTaken`.
//! Lock order is always business lock, then WAL lock.

mod mutations;
mod queries;
pub mod seed;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;

use crate::engine::{EngineError, distinct_service_ids, normalize};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedBusinessState = Arc<RwLock<BusinessState>>;

/// Everything booked for one business on one date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayBook {
    pub orders: Vec<LegacyAppointment>,
    pub bookings: Vec<ExplicitBooking>,
}

impl DayBook {
    pub fn len(&self) -> usize {
        self.orders.len() + self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status_of(&self, id: CommitmentId) -> Option<CommitmentStatus> {
        self.orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.status)
            .or_else(|| self.bookings.iter().find(|b| b.id == id).map(|b| b.status))
    }

    fn set_status(&mut self, id: CommitmentId, status: CommitmentStatus) {
        if let Some(order) = self.orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
        } else if let Some(booking) = self.bookings.iter_mut().find(|b| b.id == id) {
            booking.status = status;
        }
    }

    /// Copy of the day with one commitment left out.
    fn without(&self, id: CommitmentId) -> DayBook {
        DayBook {
            orders: self.orders.iter().filter(|o| o.id != id).cloned().collect(),
            bookings: self.bookings.iter().filter(|b| b.id != id).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusinessState {
    pub id: BusinessId,
    pub name: Option<String>,
    /// Indexed by weekday, 0 = Sunday.
    pub hours: [Option<BusinessHours>; 7],
    pub days: BTreeMap<NaiveDate, DayBook>,
}

impl BusinessState {
    pub fn new(id: BusinessId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            hours: Default::default(),
            days: BTreeMap::new(),
        }
    }
}

pub struct Store {
    businesses: DashMap<BusinessId, SharedBusinessState>,
    services: DashMap<ServiceId, ServiceDefinition>,
    /// Reverse lookup: commitment id → (business, date).
    commitment_index: DashMap<CommitmentId, (BusinessId, NaiveDate)>,
    wal: Option<Mutex<Wal>>,
    pub notify: Arc<NotifyHub>,
}

/// Apply an event to a business. Caller holds the lock.
fn apply_to_business(
    bs: &mut BusinessState,
    event: &Event,
    index: &DashMap<CommitmentId, (BusinessId, NaiveDate)>,
) {
    match event {
        Event::HoursSet { hours, .. } => {
            if let Some(slot) = bs.hours.get_mut(hours.weekday as usize) {
                *slot = Some(hours.clone());
            }
        }
        Event::HoursCleared { weekday, .. } => {
            if let Some(slot) = bs.hours.get_mut(*weekday as usize) {
                *slot = None;
            }
        }
        Event::OrderPlaced {
            business_id,
            date,
            appointment,
        } => {
            bs.days.entry(*date).or_default().orders.push(appointment.clone());
            index.insert(appointment.id, (*business_id, *date));
        }
        Event::BookingPlaced {
            business_id,
            date,
            booking,
        } => {
            bs.days.entry(*date).or_default().bookings.push(booking.clone());
            index.insert(booking.id, (*business_id, *date));
        }
        Event::StatusChanged {
            id, date, status, ..
        } => {
            if let Some(day) = bs.days.get_mut(date) {
                day.set_status(*id, *status);
            }
        }
        // Registration and services are handled at the DashMap level.
        Event::BusinessRegistered { .. } | Event::ServiceDefined { .. } => {}
    }
}

pub(super) fn append_timed(wal: &mut Wal, event: &Event) -> Result<(), EngineError> {
    let started = std::time::Instant::now();
    let result = wal
        .append(event)
        .map_err(|e| EngineError::WalError(e.to_string()));
    metrics::histogram!(crate::observability::WAL_APPEND_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    result
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store {
    /// A store with no durability, for tests and embedding.
    pub fn in_memory() -> Self {
        Self {
            businesses: DashMap::new(),
            services: DashMap::new(),
            commitment_index: DashMap::new(),
            wal: None,
            notify: Arc::new(NotifyHub::new()),
        }
    }

    /// Open a WAL-backed store, replaying `wal_path`. A torn tail is cut off
    /// before the log is reopened for append. When more than
    /// `compact_threshold` events were replayed the log is rewritten.
    pub async fn open(wal_path: &Path, compact_threshold: u64) -> Result<Self, EngineError> {
        let events = Wal::recover(wal_path).map_err(|e| EngineError::WalError(e.to_string()))?;
        let wal = Wal::open(wal_path).map_err(|e| EngineError::WalError(e.to_string()))?;

        let mut store = Self::in_memory();
        store.wal = Some(Mutex::new(wal));

        // We're the sole owner of every lock here, so try_write always succeeds.
        for event in &events {
            store.replay_event(event);
        }
        info!(
            "replayed {} events from {} ({} businesses, {} services)",
            events.len(),
            wal_path.display(),
            store.businesses.len(),
            store.services.len()
        );

        if events.len() as u64 > compact_threshold {
            store.compact().await?;
        }
        Ok(store)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::BusinessRegistered { id, name } => {
                let bs = BusinessState::new(*id, name.clone());
                self.businesses.insert(*id, Arc::new(RwLock::new(bs)));
            }
            Event::ServiceDefined { service } => {
                self.services.insert(service.id, service.clone());
            }
            other => {
                let Some(business_id) = other.business_id() else {
                    return;
                };
                if let Some(entry) = self.businesses.get(&business_id) {
                    let bs = entry.value().clone();
                    drop(entry);
                    match bs.try_write() {
                        Ok(mut guard) => {
                            apply_to_business(&mut guard, other, &self.commitment_index)
                        }
                        Err(_) => {
                            tracing::warn!("replay: business {business_id} unexpectedly locked")
                        }
                    };
                }
            }
        }
    }

    pub(crate) fn get_business(&self, id: &BusinessId) -> Option<SharedBusinessState> {
        self.businesses.get(id).map(|e| e.value().clone())
    }

    pub fn business_count(&self) -> usize {
        self.businesses.len()
    }

    pub fn contains_commitment(&self, id: &CommitmentId) -> bool {
        self.commitment_index.contains_key(id)
    }

    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    /// Durations the store knows for `ids`.
    fn durations_for(&self, ids: &BTreeSet<ServiceId>) -> HashMap<ServiceId, Minutes> {
        ids.iter()
            .filter_map(|id| self.services.get(id).map(|s| (*id, s.duration_minutes)))
            .collect()
    }

    /// The day's blocking commitments, normalized exactly as the slot engine does.
    pub(crate) fn day_commitments(&self, day: &DayBook) -> Vec<Commitment> {
        let durations = self.durations_for(&distinct_service_ids(&day.orders));
        normalize(&day.orders, &durations, &day.bookings).commitments
    }

    /// The WAL lock, or `None` for an in-memory store. Held across append and
    /// map insert so compaction never sees one without the other.
    pub(super) async fn lock_wal(&self) -> Option<MutexGuard<'_, Wal>> {
        match &self.wal {
            Some(wal) => Some(wal.lock().await),
            None => None,
        }
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        match self.lock_wal().await {
            Some(mut wal) => append_timed(&mut wal, event),
            None => Ok(()),
        }
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        business_id: BusinessId,
        bs: &mut BusinessState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_business(bs, event, &self.commitment_index);
        self.notify.send(business_id, event);
        Ok(())
    }

    /// Lookup commitment → business, acquire its write lock.
    pub(super) async fn resolve_commitment_write(
        &self,
        id: &CommitmentId,
    ) -> Result<
        (
            BusinessId,
            NaiveDate,
            tokio::sync::OwnedRwLockWriteGuard<BusinessState>,
        ),
        EngineError,
    > {
        let (business_id, date) = self
            .commitment_index
            .get(id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(*id))?;
        let bs = self
            .get_business(&business_id)
            .ok_or(EngineError::NotFound(business_id))?;
        let guard = bs.write_owned().await;
        Ok((business_id, date, guard))
    }
}
