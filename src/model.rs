use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// One night in unix milliseconds.
pub const NIGHT_MS: Ms = 86_400_000;

/// Half-open stay interval `[check_in, check_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: Ms,
    pub check_out: Ms,
}

impl Stay {
    pub fn new(check_in: Ms, check_out: Ms) -> Self {
        debug_assert!(check_in < check_out, "Stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    pub fn duration_ms(&self) -> Ms {
        self.check_out - self.check_in
    }

    /// Whole nights between check-in and check-out.
    pub fn nights(&self) -> i64 {
        self.duration_ms() / NIGHT_MS
    }

    /// Strict interval overlap. A shared endpoint — checkout day equal to the
    /// next check-in day — is not an overlap.
    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    #[allow(dead_code)]
    pub fn contains_instant(&self, t: Ms) -> bool {
        self.check_in <= t && t < self.check_out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Structured search destination. Matching is field-wise equality, never a
/// formatted `"city, state, country"` string comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub city: String,
    pub state: String,
    pub country: String,
}

impl Destination {
    pub fn matches(&self, location: &Location) -> bool {
        self.city == location.city
            && self.state == location.state
            && self.country == location.country
    }
}

/// Catalog reference data. Immutable for the session; bookings reference
/// properties by id and never copy or mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Ulid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub price_per_night: f64,
    pub amenities: BTreeMap<String, bool>,
    pub rating: f64,
    pub reviews: u32,
    /// Standard capacity; guests beyond this pay the extra-guest fee.
    pub guests: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub property_id: Ulid,
    pub stay: Stay,
    pub guests: u32,
    /// Derived by the pricing calculator at commit time, never caller-supplied.
    pub total_price: f64,
}

/// Partial update for an existing booking. Absent fields keep their stored
/// value; the total is always recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BookingPatch {
    pub stay: Option<Stay>,
    pub guests: Option<u32>,
}

/// The journal record format — flat, no nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookingEvent {
    Created {
        booking: Booking,
    },
    Updated {
        id: Ulid,
        stay: Stay,
        guests: u32,
        total_price: f64,
    },
    Cancelled {
        id: Ulid,
    },
}

impl BookingEvent {
    pub fn booking_id(&self) -> Ulid {
        match self {
            BookingEvent::Created { booking } => booking.id,
            BookingEvent::Updated { id, .. } | BookingEvent::Cancelled { id } => *id,
        }
    }
}

/// Price breakdown for one stay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub nights: i64,
    pub subtotal: f64,
    pub extra_guests: u32,
    pub extra_fee: f64,
    pub total: f64,
}

/// Live bookings split around a reference instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingsByTime {
    pub upcoming: Vec<Booking>,
    pub past: Vec<Booking>,
}

/// All live bookings on one property, sorted by `stay.check_in`.
#[derive(Debug, Clone)]
pub struct PropertyBookings {
    pub property_id: Ulid,
    pub bookings: Vec<Booking>,
}

impl PropertyBookings {
    pub fn new(property_id: Ulid) -> Self {
        Self {
            property_id,
            bookings: Vec::new(),
        }
    }

    /// Insert maintaining sort order by check-in.
    pub fn insert(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.stay.check_in, |b| b.stay.check_in)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    /// Remove a booking by id.
    pub fn remove(&mut self, id: Ulid) -> Option<Booking> {
        if let Some(pos) = self.bookings.iter().position(|b| b.id == id) {
            Some(self.bookings.remove(pos))
        } else {
            None
        }
    }

    pub fn get(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Return only bookings whose stay overlaps the query window.
    /// Uses binary search to skip bookings checking in at or after
    /// `query.check_out`.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &Booking> {
        // Everything at index >= right_bound checks in at or after
        // query.check_out → can't overlap.
        let right_bound = self
            .bookings
            .partition_point(|b| b.stay.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.stay.check_out > query.check_in)
    }
}
