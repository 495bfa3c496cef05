//! In-process boundary between the presentation layer and the engine.
//!
//! Every submission awaits a simulated network round trip, then runs the
//! domain operation to completion: once issued, an operation cannot be
//! cancelled and the caller observes exactly one resolution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::catalog::{PropertyMatch, SearchQuery};
use crate::engine::{Engine, EngineError, now_ms};
use crate::model::*;
use crate::observability;

/// Simulated round-trip latency applied before each call reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    /// No delay (tests).
    None,
    Fixed(Duration),
    /// Uniform random delay in `0..=max`.
    Jittered { max: Duration },
}

impl Latency {
    async fn simulate(&self) {
        match self {
            Latency::None => {}
            Latency::Fixed(d) => tokio::time::sleep(*d).await,
            Latency::Jittered { max } => {
                let ms = rand::thread_rng().gen_range(0..=max.as_millis() as u64);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CreateBookingInput {
    pub property_id: Ulid,
    pub stay: Stay,
    pub guests: u32,
}

pub struct BookingApi {
    engine: Arc<Engine>,
    latency: Latency,
}

impl BookingApi {
    pub fn new(engine: Arc<Engine>, latency: Latency) -> Self {
        Self { engine, latency }
    }

    fn record<T>(
        op: &'static str,
        started: Instant,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        match &result {
            Ok(_) => observability::record_op(op, "ok", started),
            Err(e) => {
                if matches!(e, EngineError::RangeConflict(_)) {
                    metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
                }
                observability::record_op(op, "error", started);
            }
        }
        result
    }

    pub async fn create_booking(
        &self,
        input: CreateBookingInput,
    ) -> Result<Booking, EngineError> {
        self.latency.simulate().await;
        let started = Instant::now();
        let result = self
            .engine
            .create_booking(input.property_id, input.stay, input.guests)
            .await;
        Self::record("create_booking", started, result)
    }

    pub async fn update_booking(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        self.latency.simulate().await;
        let started = Instant::now();
        let result = self.engine.update_booking(id, patch).await;
        Self::record("update_booking", started, result)
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.latency.simulate().await;
        let started = Instant::now();
        let result = self.engine.cancel_booking(id).await;
        Self::record("cancel_booking", started, result)
    }

    /// Live bookings partitioned around the current wall clock.
    pub async fn list_bookings(&self) -> BookingsByTime {
        self.latency.simulate().await;
        self.engine.partition_by_time(now_ms()).await
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        self.latency.simulate().await;
        self.engine.get_booking(&id).await
    }

    pub async fn get_property(&self, id: Ulid) -> Result<Property, EngineError> {
        self.latency.simulate().await;
        self.engine.get_property(&id)
    }

    pub async fn list_properties(&self) -> Vec<Property> {
        self.latency.simulate().await;
        self.engine.list_properties()
    }

    pub async fn search_properties(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PropertyMatch>, EngineError> {
        self.latency.simulate().await;
        let started = Instant::now();
        let result = self.engine.search_properties(query);
        Self::record("search_properties", started, result)
    }

    /// Subscribe to committed booking events, e.g. to re-read lists after a
    /// mutation lands.
    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.engine.notify.subscribe()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}
