mod conflict;
mod error;
mod mutations;
pub mod pricing;
mod queries;

pub use error::EngineError;
pub use pricing::{DEFAULT_EXTRA_GUEST_FEE, quote};

pub(crate) use conflict::now_ms;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::{Generator, Ulid};

use crate::catalog::PropertyCatalog;
use crate::journal::Journal;
use crate::model::*;
use crate::notify::NotifyHub;

pub type SharedPropertyBookings = Arc<RwLock<PropertyBookings>>;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: BookingEvent,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<BookingEvent>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the journal and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            JournalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(JournalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut journal, &mut batch);
                            handle_non_append(&mut journal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut journal, &mut batch);
                }
            }
            other => handle_non_append(&mut journal, other),
        }
    }
}

fn flush_and_respond(
    journal: &mut Journal,
    batch: &mut Vec<(BookingEvent, oneshot::Sender<io::Result<()>>)>,
) {
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE)
        .record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(journal, batch);
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    journal: &mut Journal,
    batch: &[(BookingEvent, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = journal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let result = Journal::write_compact_file(journal.path(), &events)
                .and_then(|()| journal.swap_compact_file());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { .. } => unreachable!(),
    }
}

/// The authoritative booking store for one session: bookings sharded by
/// property so the overlap check and the following insert run under a single
/// per-property write lock.
pub struct Engine {
    pub(super) state: DashMap<Ulid, SharedPropertyBookings>,
    /// Reverse lookup: booking id → property id.
    pub(super) booking_index: DashMap<Ulid, Ulid>,
    pub(super) catalog: Arc<PropertyCatalog>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) extra_guest_fee: f64,
    /// Monotonic id source: a later booking always sorts after an earlier
    /// one, even within the same millisecond.
    id_gen: std::sync::Mutex<Generator>,
}

/// Apply a committed event to a property shard (no locking — caller holds the
/// write lock).
fn apply_to_property(
    property: &mut PropertyBookings,
    event: &BookingEvent,
    index: &DashMap<Ulid, Ulid>,
) {
    match event {
        BookingEvent::Created { booking } => {
            property.insert(booking.clone());
            index.insert(booking.id, booking.property_id);
        }
        BookingEvent::Updated { id, stay, guests, total_price } => {
            // Remove + reinsert keeps the shard sorted by check-in.
            if let Some(mut booking) = property.remove(*id) {
                booking.stay = *stay;
                booking.guests = *guests;
                booking.total_price = *total_price;
                property.insert(booking);
            }
        }
        BookingEvent::Cancelled { id } => {
            property.remove(*id);
            index.remove(id);
        }
    }
}

impl Engine {
    pub fn new(
        journal_path: PathBuf,
        catalog: Arc<PropertyCatalog>,
        notify: Arc<NotifyHub>,
        extra_guest_fee: f64,
    ) -> io::Result<Self> {
        let events = Journal::replay(&journal_path)?;
        let journal = Journal::open(&journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            state: DashMap::new(),
            booking_index: DashMap::new(),
            catalog,
            journal_tx,
            notify,
            extra_guest_fee,
            id_gen: std::sync::Mutex::new(Generator::new()),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context (e.g. lazy session
        // creation).
        for event in &events {
            match event {
                BookingEvent::Created { booking } => {
                    let shard = engine
                        .state
                        .entry(booking.property_id)
                        .or_insert_with(|| {
                            Arc::new(RwLock::new(PropertyBookings::new(booking.property_id)))
                        })
                        .value()
                        .clone();
                    let mut guard = shard.try_write().expect("replay: uncontended write");
                    apply_to_property(&mut guard, event, &engine.booking_index);
                }
                BookingEvent::Updated { id, .. } | BookingEvent::Cancelled { id } => {
                    if let Some(property_id) = engine.booking_index.get(id).map(|e| *e.value())
                        && let Some(entry) = engine.state.get(&property_id)
                    {
                        let shard = entry.value().clone();
                        let mut guard = shard.try_write().expect("replay: uncontended write");
                        apply_to_property(&mut guard, event, &engine.booking_index);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write an event to the journal via the background group-commit writer.
    async fn journal_append(&self, event: &BookingEvent) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }

    pub(super) fn next_id(&self) -> Ulid {
        self.id_gen
            .lock()
            .expect("id generator lock poisoned")
            .generate()
            // Random-part overflow within one millisecond; a fresh ulid is
            // still unique, it merely loses intra-ms ordering.
            .unwrap_or_else(|_| Ulid::new())
    }

    pub fn property_shard(&self, property_id: &Ulid) -> Option<SharedPropertyBookings> {
        self.state.get(property_id).map(|e| e.value().clone())
    }

    pub fn property_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_index.get(booking_id).map(|e| *e.value())
    }

    /// Journal-append + apply + notify in one call. All validation happens
    /// before this point, so a journal failure leaves the store unchanged.
    pub(super) async fn persist_and_apply(
        &self,
        property: &mut PropertyBookings,
        event: &BookingEvent,
    ) -> Result<(), EngineError> {
        self.journal_append(event).await?;
        apply_to_property(property, event, &self.booking_index);
        self.notify.send(event);
        Ok(())
    }

    /// Lookup booking → property, get the shard, acquire its write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<PropertyBookings>), EngineError> {
        let property_id = self
            .property_for_booking(booking_id)
            .ok_or(EngineError::BookingNotFound(*booking_id))?;
        let shard = self
            .property_shard(&property_id)
            .ok_or(EngineError::BookingNotFound(*booking_id))?;
        let guard = shard.write_owned().await;
        Ok((property_id, guard))
    }
}
