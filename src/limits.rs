use crate::model::Minutes;

/// Minutes in one calendar day; commitments and hours never cross midnight.
pub const MINUTES_PER_DAY: Minutes = 1440;

/// Longest service a business may define.
pub const MAX_SERVICE_DURATION_MINUTES: Minutes = MINUTES_PER_DAY;

/// Orders + bookings a single business may hold on one date.
pub const MAX_COMMITMENTS_PER_DAY: usize = 2_000;

pub const MAX_LABEL_LEN: usize = 256;
pub const MAX_NAME_LEN: usize = 256;

pub const MAX_BUSINESSES: usize = 100_000;
pub const MAX_SERVICES: usize = 100_000;

/// Upper bound on ids accepted by a single batched duration lookup.
pub const MAX_DURATION_LOOKUP_IDS: usize = 1_000;

/// Consecutive dates one multi-day slot request may cover.
pub const MAX_PLAN_DAYS: u32 = 62;

/// Largest encoded event the WAL writes or accepts on replay. A longer
/// length prefix is read as a torn tail.
pub const MAX_EVENT_BYTES: usize = 1 << 20;
