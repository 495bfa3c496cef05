use std::sync::Arc;

use tokio::sync::{RwLock, oneshot};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_guests, validate_stay};
use super::{Engine, EngineError, JournalCommand, SharedPropertyBookings, pricing};

impl Engine {
    /// Book a stay. Validation, pricing, and the conflict check all run
    /// before the journal append; on any error the store is unchanged.
    pub async fn create_booking(
        &self,
        property_id: Ulid,
        stay: Stay,
        guests: u32,
    ) -> Result<Booking, EngineError> {
        validate_stay(&stay)?;
        validate_guests(guests)?;
        let property = self
            .catalog
            .get(&property_id)
            .ok_or(EngineError::PropertyNotFound(property_id))?;
        let quote = pricing::quote(
            property.price_per_night,
            &stay,
            guests,
            property.guests,
            self.extra_guest_fee,
        )?;

        // Shards are created lazily on a property's first booking. Clone the
        // Arc out so the map reference is released before the lock await.
        let shard: SharedPropertyBookings = self
            .state
            .entry(property_id)
            .or_insert_with(|| Arc::new(RwLock::new(PropertyBookings::new(property_id))))
            .value()
            .clone();
        let mut guard = shard.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_PROPERTY {
            return Err(EngineError::LimitExceeded("too many bookings on property"));
        }
        check_no_conflict(&guard, &stay, None)?;

        let booking = Booking {
            id: self.next_id(),
            property_id,
            stay,
            guests,
            total_price: quote.total,
        };
        let event = BookingEvent::Created {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(booking)
    }

    /// Merge `patch` onto an existing booking, reprice, and recheck overlap
    /// excluding the booking itself. The id (and hence the booking's place in
    /// the most-recent-first listing) never changes.
    pub async fn update_booking(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        let (property_id, mut guard) = self.resolve_booking_write(&id).await?;
        let current = guard
            .get(id)
            .ok_or(EngineError::BookingNotFound(id))?
            .clone();

        let stay = patch.stay.unwrap_or(current.stay);
        let guests = patch.guests.unwrap_or(current.guests);
        validate_stay(&stay)?;
        validate_guests(guests)?;

        let property = self
            .catalog
            .get(&property_id)
            .ok_or(EngineError::PropertyNotFound(property_id))?;
        let quote = pricing::quote(
            property.price_per_night,
            &stay,
            guests,
            property.guests,
            self.extra_guest_fee,
        )?;
        check_no_conflict(&guard, &stay, Some(id))?;

        let event = BookingEvent::Updated {
            id,
            stay,
            guests,
            total_price: quote.total,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(Booking {
            stay,
            guests,
            total_price: quote.total,
            ..current
        })
    }

    /// Cancel a booking. Terminal — the entry is removed outright, never
    /// soft-deleted.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (_property_id, mut guard) = self.resolve_booking_write(&id).await?;
        let cancelled = guard
            .get(id)
            .ok_or(EngineError::BookingNotFound(id))?
            .clone();
        let event = BookingEvent::Cancelled { id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(cancelled)
    }

    /// Rewrite the journal as a snapshot: one `Created` event per live
    /// booking, in creation order.
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        let shards: Vec<SharedPropertyBookings> =
            self.state.iter().map(|e| e.value().clone()).collect();
        for shard in shards {
            let guard = shard.read().await;
            for booking in &guard.bookings {
                events.push(BookingEvent::Created {
                    booking: booking.clone(),
                });
            }
        }
        // Ulid ids are monotonic, so sorting by id restores creation order
        // across shards.
        events.sort_by_key(|e| e.booking_id());

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
