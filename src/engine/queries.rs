use ulid::Ulid;

use crate::catalog::{PropertyMatch, SearchQuery};
use crate::model::*;

use super::{Engine, EngineError, SharedPropertyBookings};

impl Engine {
    /// All live bookings, most recent first. Booking ids are ULIDs, so
    /// descending id order is descending creation order.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let shards: Vec<SharedPropertyBookings> =
            self.state.iter().map(|e| e.value().clone()).collect();
        let mut all = Vec::new();
        for shard in shards {
            let guard = shard.read().await;
            all.extend(guard.bookings.iter().cloned());
        }
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all
    }

    pub async fn booking_count(&self) -> usize {
        self.list_bookings().await.len()
    }

    pub async fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        let property_id = self.property_for_booking(id)?;
        let shard = self.property_shard(&property_id)?;
        let guard = shard.read().await;
        guard.get(*id).cloned()
    }

    /// Bookings on one property, ascending check-in.
    pub async fn bookings_for_property(&self, property_id: Ulid) -> Vec<Booking> {
        let Some(shard) = self.property_shard(&property_id) else {
            return Vec::new();
        };
        let guard = shard.read().await;
        guard.bookings.clone()
    }

    /// Partition live bookings around `now`: upcoming stays have a check-in
    /// strictly after `now`; everything else has begun and is past. `now` is
    /// an explicit parameter so callers control the clock.
    pub async fn partition_by_time(&self, now: Ms) -> BookingsByTime {
        let mut parts = BookingsByTime::default();
        for booking in self.list_bookings().await {
            if booking.stay.check_in > now {
                parts.upcoming.push(booking);
            } else {
                parts.past.push(booking);
            }
        }
        parts
    }

    pub fn get_property(&self, id: &Ulid) -> Result<Property, EngineError> {
        self.catalog
            .get(id)
            .cloned()
            .ok_or(EngineError::PropertyNotFound(*id))
    }

    pub fn list_properties(&self) -> Vec<Property> {
        self.catalog.all().to_vec()
    }

    pub fn search_properties(&self, query: &SearchQuery) -> Result<Vec<PropertyMatch>, EngineError> {
        self.catalog.search(query)
    }

    /// Distinct destinations in catalog order, for autocomplete.
    pub fn destinations(&self) -> Vec<Destination> {
        self.catalog.destinations()
    }
}
