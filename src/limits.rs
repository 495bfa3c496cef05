//! Hard caps guarding the store against runaway input.

use crate::model::Ms;

/// Guest count accepted on a booking, inclusive on both ends.
pub const MIN_GUESTS: u32 = 1;
pub const MAX_GUESTS: u32 = 10;

/// Longest bookable stay.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Accepted timestamp window. The lower bound is 0 so tests can use small
/// synthetic day offsets; the upper bound is the year 3000.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 32_503_680_000_000;

pub const MAX_BOOKINGS_PER_PROPERTY: usize = 10_000;

pub const MAX_SESSIONS: usize = 1024;
pub const MAX_SESSION_KEY_LEN: usize = 256;
