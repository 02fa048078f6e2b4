use crate::model::*;

/// Step through `window` in `duration`-sized slots and flag each one.
///
/// A slot is emitted only if it ends at or before `window.end`; a slot is
/// available iff no commitment intersects it by a positive amount.
/// A zero duration yields no slots.
pub fn candidate_slots(
    window: Span,
    duration: Minutes,
    commitments: &[Commitment],
) -> Vec<CandidateSlot> {
    if duration == 0 || duration > window.duration() {
        return Vec::new();
    }

    let mut spans: Vec<Span> = commitments.iter().map(|c| c.span).collect();
    spans.sort_by_key(|s| s.start);

    let mut slots = Vec::with_capacity((window.duration() / duration) as usize);
    let mut current = window.start;
    while current + duration <= window.end {
        let slot = Span::new(current, current + duration);
        // Everything at index >= bound starts at or after slot.end → can't overlap.
        let bound = spans.partition_point(|s| s.start < slot.end);
        let available = !spans[..bound].iter().any(|s| s.end > slot.start);
        slots.push(CandidateSlot {
            start_time: TimeOfDay::saturating(current),
            available,
        });
        current += duration;
    }
    slots
}
