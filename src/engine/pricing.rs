use crate::model::{Quote, Stay};

use super::EngineError;

/// Flat surcharge per guest above a property's standard capacity.
pub const DEFAULT_EXTRA_GUEST_FEE: f64 = 10.0;

/// Price a stay. Pure and deterministic; the engine recomputes this on every
/// submission instead of trusting a caller-supplied total.
pub fn quote(
    price_per_night: f64,
    stay: &Stay,
    guests: u32,
    standard_capacity: u32,
    extra_guest_fee: f64,
) -> Result<Quote, EngineError> {
    let nights = stay.nights();
    if nights <= 0 {
        return Err(EngineError::InvalidRange);
    }
    let subtotal = price_per_night * nights as f64;
    let extra_guests = guests.saturating_sub(standard_capacity);
    let extra_fee = f64::from(extra_guests) * extra_guest_fee;
    Ok(Quote {
        nights,
        subtotal,
        extra_guests,
        extra_fee,
        total: subtotal + extra_fee,
    })
}
