//! Read path: gather one day's inputs from the ports, then run the engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::calendar::BusinessCalendar;
use crate::engine::{
    DaySnapshot, EngineError, compute_slots, distinct_service_ids, validate_duration,
};
use crate::limits::MAX_PLAN_DAYS;
use crate::model::*;
use crate::observability::{self, error_label, warning_label};
use crate::ports::{BusinessHoursStore, CommitmentSource, ServiceCatalog};

#[derive(Clone)]
pub struct SlotPlanner {
    hours: Arc<dyn BusinessHoursStore>,
    catalog: Arc<dyn ServiceCatalog>,
    commitments: Arc<dyn CommitmentSource>,
}

impl SlotPlanner {
    pub fn new(
        hours: Arc<dyn BusinessHoursStore>,
        catalog: Arc<dyn ServiceCatalog>,
        commitments: Arc<dyn CommitmentSource>,
    ) -> Self {
        Self {
            hours,
            catalog,
            commitments,
        }
    }

    /// One backend serving every read port, e.g. [`crate::store::Store`].
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BusinessHoursStore + ServiceCatalog + CommitmentSource + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    /// Fetch everything the engine needs for `date`.
    ///
    /// `date` is the business-local calendar date; its weekday selects the
    /// hours row. The four independent reads run concurrently and any
    /// failure aborts the whole snapshot.
    pub async fn snapshot(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
        service_id: ServiceId,
    ) -> Result<DaySnapshot, EngineError> {
        let weekday = BusinessCalendar::weekday_index(date);

        let (hours, service, legacy, explicit) = tokio::try_join!(
            self.hours.business_hours(business_id, weekday),
            self.catalog.service(service_id),
            self.commitments.legacy_appointments(business_id, date),
            self.commitments.explicit_bookings(business_id, date),
        )?;

        let service = service.ok_or(EngineError::ServiceNotFound(service_id))?;
        let service_duration = validate_duration(service.duration_minutes)?;

        let ids = distinct_service_ids(&legacy);
        let durations = if ids.is_empty() {
            HashMap::new()
        } else {
            self.catalog.service_durations(&ids).await?
        };

        Ok(DaySnapshot {
            weekday,
            hours,
            service_duration,
            legacy,
            durations,
            explicit,
        })
    }

    /// Candidate slots for `service_id` on `date`.
    pub async fn plan(
        &self,
        business_id: BusinessId,
        date: NaiveDate,
        service_id: ServiceId,
    ) -> Result<SlotReport, EngineError> {
        let started = Instant::now();
        let result = self
            .snapshot(business_id, date, service_id)
            .await
            .map(|snapshot| compute_slots(&snapshot));
        metrics::histogram!(observability::SLOT_COMPUTATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(report) => {
                metrics::counter!(observability::SLOT_COMPUTATIONS_TOTAL, "outcome" => "ok")
                    .increment(1);
                for warning in &report.warnings {
                    let kind = warning_label(warning);
                    metrics::counter!(observability::SLOT_WARNINGS_TOTAL, "kind" => kind)
                        .increment(1);
                    match warning {
                        SlotWarning::NoSchedule { .. } => {
                            debug!("{business_id} on {date}: {warning}")
                        }
                        _ => warn!("{business_id} on {date}: {warning}"),
                    }
                }
                debug!(
                    "planned {} slots ({} available) for {business_id} on {date}",
                    report.slots.len(),
                    report.available_starts().count()
                );
            }
            Err(e) => {
                let outcome = error_label(e);
                metrics::counter!(observability::SLOT_COMPUTATIONS_TOTAL, "outcome" => outcome)
                    .increment(1);
                debug!("slot computation for {business_id} on {date} failed: {e}");
            }
        }
        result
    }

    /// Slot reports for `days` consecutive dates starting at `from`,
    /// computed concurrently. Fails if any single day fails.
    pub async fn plan_days(
        &self,
        business_id: BusinessId,
        from: NaiveDate,
        days: u32,
        service_id: ServiceId,
    ) -> Result<Vec<(NaiveDate, SlotReport)>, EngineError> {
        if days > MAX_PLAN_DAYS {
            return Err(EngineError::LimitExceeded("too many days in one request"));
        }
        let dates: Vec<NaiveDate> = from.iter_days().take(days as usize).collect();
        let reports = try_join_all(
            dates
                .iter()
                .map(|date| self.plan(business_id, *date, service_id)),
        )
        .await?;
        Ok(dates.into_iter().zip(reports).collect())
    }
}
