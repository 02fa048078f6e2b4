use std::collections::{BTreeSet, HashMap};

use crate::limits::MINUTES_PER_DAY;
use crate::model::*;

/// Service ids whose durations the day's orders need, for a single batched
/// lookup. Cancelled orders never block, so their services are left out.
pub fn distinct_service_ids(legacy: &[LegacyAppointment]) -> BTreeSet<ServiceId> {
    legacy
        .iter()
        .filter(|a| a.status.blocks())
        .map(|a| a.service_id)
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub commitments: Vec<Commitment>,
    pub warnings: Vec<SlotWarning>,
}

/// Fold both commitment sources into one `{id, span}` list.
///
/// Cancelled records are dropped here. Records that cannot be turned into a
/// positive interval are skipped and reported, never fatal. An order whose
/// implied end runs past midnight is clamped to `24:00`.
pub fn normalize(
    legacy: &[LegacyAppointment],
    durations: &HashMap<ServiceId, Minutes>,
    explicit: &[ExplicitBooking],
) -> Normalized {
    let mut out = Normalized {
        commitments: Vec::with_capacity(legacy.len() + explicit.len()),
        warnings: Vec::new(),
    };

    for appt in legacy.iter().filter(|a| a.status.blocks()) {
        let duration = match durations.get(&appt.service_id) {
            Some(&d) if d > 0 => d,
            _ => {
                out.warnings.push(SlotWarning::UnknownServiceDuration {
                    id: appt.id,
                    service_id: appt.service_id,
                });
                continue;
            }
        };
        let start = appt.start_time.minutes();
        let end = start.saturating_add(duration).min(MINUTES_PER_DAY);
        push_checked(&mut out, appt.id, start, end);
    }

    for booking in explicit.iter().filter(|b| b.status.blocks()) {
        push_checked(
            &mut out,
            booking.id,
            booking.start_time.minutes(),
            booking.end_time.minutes(),
        );
    }

    out
}

fn push_checked(out: &mut Normalized, id: CommitmentId, start: Minutes, end: Minutes) {
    match Span::checked(start, end) {
        Some(span) => out.commitments.push(Commitment { id, span }),
        None => {
            tracing::debug!("skipping malformed commitment {id}: [{start}, {end})");
            out.warnings.push(SlotWarning::MalformedCommitment {
                id,
                start_time: TimeOfDay::saturating(start),
                end_time: TimeOfDay::saturating(end),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn order(start: &str, service_id: ServiceId, status: CommitmentStatus) -> LegacyAppointment {
        LegacyAppointment {
            id: Ulid::new(),
            start_time: t(start),
            service_id,
            status,
        }
    }

    fn booking(start: &str, end: &str, status: CommitmentStatus) -> ExplicitBooking {
        ExplicitBooking {
            id: Ulid::new(),
            start_time: t(start),
            end_time: t(end),
            status,
            service_id: None,
            label: None,
        }
    }

    #[test]
    fn distinct_ids_deduplicate_and_skip_cancelled() {
        let groom = Ulid::new();
        let bath = Ulid::new();
        let walk = Ulid::new();
        let legacy = vec![
            order("09:00", groom, CommitmentStatus::Confirmed),
            order("11:00", groom, CommitmentStatus::Pending),
            order("13:00", bath, CommitmentStatus::Completed),
            order("15:00", walk, CommitmentStatus::Cancelled),
        ];
        let ids = distinct_service_ids(&legacy);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&groom));
        assert!(ids.contains(&bath));
        assert!(!ids.contains(&walk));
    }

    #[test]
    fn legacy_end_is_start_plus_own_duration() {
        let svc = Ulid::new();
        let legacy = vec![order("10:00", svc, CommitmentStatus::InProgress)];
        let durations = HashMap::from([(svc, 30)]);
        let n = normalize(&legacy, &durations, &[]);
        assert!(n.warnings.is_empty());
        assert_eq!(n.commitments.len(), 1);
        assert_eq!(n.commitments[0].span, Span::new(600, 630));
        assert_eq!(n.commitments[0].id, legacy[0].id);
    }

    #[test]
    fn explicit_uses_stored_ends() {
        let explicit = vec![booking("10:00", "10:45", CommitmentStatus::Confirmed)];
        let n = normalize(&[], &HashMap::new(), &explicit);
        assert_eq!(n.commitments[0].span, Span::new(600, 645));
    }

    #[test]
    fn cancelled_records_are_excluded_from_both_sources() {
        let svc = Ulid::new();
        let legacy = vec![order("10:00", svc, CommitmentStatus::Cancelled)];
        let explicit = vec![booking("11:00", "12:00", CommitmentStatus::Cancelled)];
        let n = normalize(&legacy, &HashMap::from([(svc, 30)]), &explicit);
        assert!(n.commitments.is_empty());
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn malformed_explicit_booking_is_skipped_with_warning() {
        let explicit = vec![
            booking("11:00", "10:00", CommitmentStatus::Confirmed),
            booking("12:00", "12:00", CommitmentStatus::Pending),
            booking("13:00", "14:00", CommitmentStatus::Pending),
        ];
        let n = normalize(&[], &HashMap::new(), &explicit);
        assert_eq!(n.commitments.len(), 1);
        assert_eq!(n.commitments[0].span, Span::new(780, 840));
        assert_eq!(
            n.warnings,
            vec![
                SlotWarning::MalformedCommitment {
                    id: explicit[0].id,
                    start_time: t("11:00"),
                    end_time: t("10:00"),
                },
                SlotWarning::MalformedCommitment {
                    id: explicit[1].id,
                    start_time: t("12:00"),
                    end_time: t("12:00"),
                },
            ]
        );
    }

    #[test]
    fn unknown_or_zero_duration_is_skipped_with_warning() {
        let known = Ulid::new();
        let zero = Ulid::new();
        let missing = Ulid::new();
        let legacy = vec![
            order("09:00", known, CommitmentStatus::Pending),
            order("10:00", zero, CommitmentStatus::Pending),
            order("11:00", missing, CommitmentStatus::Pending),
        ];
        let durations = HashMap::from([(known, 45), (zero, 0)]);
        let n = normalize(&legacy, &durations, &[]);
        assert_eq!(n.commitments.len(), 1);
        assert_eq!(n.warnings.len(), 2);
        assert!(matches!(
            n.warnings[1],
            SlotWarning::UnknownServiceDuration { service_id, .. } if service_id == missing
        ));
    }

    #[test]
    fn late_order_is_clamped_to_midnight() {
        let svc = Ulid::new();
        let legacy = vec![order("23:30", svc, CommitmentStatus::Confirmed)];
        let n = normalize(&legacy, &HashMap::from([(svc, 90)]), &[]);
        assert_eq!(n.commitments[0].span, Span::new(1410, 1440));
    }
}
