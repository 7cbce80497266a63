//! Request coalescing for per-member availability reads.
//!
//! Concurrent [`AvailabilityLoader::load`] calls that ask for the same
//! [`TimeRange`] are grouped into one batch. The request that opens a batch
//! owns its dispatch: it yields its own task once, and when that task is
//! polled again a single [`BatchFetch::fetch_batch`] query is issued for the
//! union of members. Every waiter receives only its own member's records.
//!
//! A tick therefore ends when the batch creator's task resumes. Loads joined
//! into that task (`tokio::join!`, [`AvailabilityLoader::load_many`]) always
//! land in one batch, whichever worker threads the runtime uses.
//!
//! Nothing is cached between batches: a request made after a flush starts a
//! new batch and a new query. Batches carry a generation so a dispatch only
//! ever takes the batch it opened.
//!
//! Loading must happen inside a Tokio runtime: a batch whose creator is
//! dropped before dispatching is handed to a spawned task.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::availability::AvailabilityInterval;
use crate::interval::TimeRange;
use crate::types::MemberNumber;

/// Backend able to answer one query for many members over the same range.
pub trait BatchFetch: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns all records for `members` overlapping `range`, in any order.
    fn fetch_batch(
        &self,
        members: Vec<MemberNumber>,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<AvailabilityInterval>, Self::Error>> + Send;
}

/// Errors delivered to individual waiters.
#[derive(Debug, Error)]
pub enum LoadError<E: std::error::Error> {
    /// The batched query failed; every waiter in the batch sees the same error.
    #[error("batched availability fetch failed: {0}")]
    Fetch(Arc<E>),
    /// The batch was dropped before it resolved (e.g. runtime shutdown).
    #[error("availability batch was cancelled before it resolved")]
    Cancelled,
}

type LoadResult<E> = Result<Vec<AvailabilityInterval>, LoadError<E>>;

struct Waiter<E: std::error::Error> {
    member: MemberNumber,
    reply: oneshot::Sender<LoadResult<E>>,
}

impl<E: std::error::Error> Waiter<E> {
    fn new(member: MemberNumber) -> (Self, oneshot::Receiver<LoadResult<E>>) {
        let (reply, receiver) = oneshot::channel();
        (Self { member, reply }, receiver)
    }
}

struct Batch<E: std::error::Error> {
    generation: u64,
    waiters: Vec<Waiter<E>>,
}

struct PendingTable<E: std::error::Error> {
    next_generation: u64,
    batches: HashMap<TimeRange, Batch<E>>,
}

/// Coalesces availability reads sharing an identical time range.
pub struct AvailabilityLoader<S: BatchFetch> {
    source: Arc<S>,
    pending: Arc<Mutex<PendingTable<S::Error>>>,
}

impl<S: BatchFetch> Clone for AvailabilityLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<S: BatchFetch> AvailabilityLoader<S> {
    pub fn new(source: S) -> Self {
        Self::from_shared(Arc::new(source))
    }

    pub fn from_shared(source: Arc<S>) -> Self {
        Self {
            source,
            pending: Arc::new(Mutex::new(PendingTable {
                next_generation: 0,
                batches: HashMap::new(),
            })),
        }
    }

    /// Loads one member's intervals overlapping `range`.
    ///
    /// Equivalent to querying the member directly; only the number of
    /// backend round-trips differs.
    pub async fn load(&self, member: MemberNumber, range: TimeRange) -> LoadResult<S::Error> {
        let (waiter, receiver) = Waiter::new(member);
        if let Some(dispatch) = self.register(range, vec![waiter]) {
            dispatch.run().await;
        }
        receiver.await.unwrap_or(Err(LoadError::Cancelled))
    }

    /// Loads several members through the same batch.
    ///
    /// Every member is registered under one lock, so the whole slice shares a
    /// single query. Results follow the order of `members`.
    pub async fn load_many(
        &self,
        members: &[MemberNumber],
        range: TimeRange,
    ) -> Vec<LoadResult<S::Error>> {
        if members.is_empty() {
            return Vec::new();
        }

        let mut waiters = Vec::with_capacity(members.len());
        let mut receivers = Vec::with_capacity(members.len());
        for member in members {
            let (waiter, receiver) = Waiter::new(*member);
            waiters.push(waiter);
            receivers.push(receiver);
        }

        if let Some(dispatch) = self.register(range, waiters) {
            dispatch.run().await;
        }

        let mut results = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            results.push(receiver.await.unwrap_or(Err(LoadError::Cancelled)));
        }
        results
    }

    /// Dispatches every pending batch now instead of waiting for the tick.
    pub async fn flush(&self) {
        let batches: Vec<(TimeRange, u64)> = self
            .pending()
            .batches
            .iter()
            .map(|(range, batch)| (*range, batch.generation))
            .collect();
        for (range, generation) in batches {
            self.dispatch(range, generation).await;
        }
    }

    /// Number of ranges with requests waiting for a flush.
    pub fn pending_batches(&self) -> usize {
        self.pending().batches.len()
    }

    fn pending(&self) -> MutexGuard<'_, PendingTable<S::Error>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `waiters` to the open batch for `range`, or opens a new one and
    /// returns the handle that must dispatch it.
    fn register(
        &self,
        range: TimeRange,
        waiters: Vec<Waiter<S::Error>>,
    ) -> Option<ScheduledDispatch<S>> {
        let mut guard = self.pending();
        let table = &mut *guard;
        match table.batches.entry(range) {
            Entry::Occupied(mut open) => {
                open.get_mut().waiters.extend(waiters);
                None
            }
            Entry::Vacant(slot) => {
                let generation = table.next_generation;
                table.next_generation += 1;
                slot.insert(Batch {
                    generation,
                    waiters,
                });
                Some(ScheduledDispatch {
                    loader: self.clone(),
                    range,
                    generation,
                    armed: true,
                })
            }
        }
    }

    /// Removes the batch for `range` if it is still the given generation.
    fn take_batch(&self, range: TimeRange, generation: u64) -> Option<Vec<Waiter<S::Error>>> {
        let mut table = self.pending();
        match table.batches.entry(range) {
            Entry::Occupied(open) if open.get().generation == generation => {
                Some(open.remove().waiters)
            }
            _ => None,
        }
    }

    async fn dispatch(&self, range: TimeRange, generation: u64) {
        // An explicit flush may already have taken this batch.
        let Some(waiters) = self.take_batch(range, generation) else {
            return;
        };

        let mut members: Vec<MemberNumber> = waiters.iter().map(|waiter| waiter.member).collect();
        members.sort_unstable();
        members.dedup();
        tracing::debug!(
            members = members.len(),
            waiters = waiters.len(),
            generation,
            start = %range.start(),
            end = %range.end(),
            "dispatching availability batch"
        );

        match self.source.fetch_batch(members, range).await {
            Ok(records) => {
                for waiter in waiters {
                    let own = records
                        .iter()
                        .filter(|record| {
                            record.member == waiter.member && record.range.intersects(&range)
                        })
                        .cloned()
                        .collect();
                    let _ = waiter.reply.send(Ok(own));
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "availability batch failed");
                let err = Arc::new(err);
                for waiter in waiters {
                    let _ = waiter.reply.send(Err(LoadError::Fetch(Arc::clone(&err))));
                }
            }
        }
    }
}

/// Dispatch duty for one batch, held by the request that opened it.
struct ScheduledDispatch<S: BatchFetch> {
    loader: AvailabilityLoader<S>,
    range: TimeRange,
    generation: u64,
    armed: bool,
}

impl<S: BatchFetch> ScheduledDispatch<S> {
    /// Ends the tick by yielding the creator's task, then dispatches.
    async fn run(mut self) {
        tokio::task::yield_now().await;
        self.armed = false;
        self.loader.dispatch(self.range, self.generation).await;
    }
}

impl<S: BatchFetch> Drop for ScheduledDispatch<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // The creator went away before its tick ended; other waiters still
        // need the batch dispatched.
        let (loader, range, generation) = (self.loader.clone(), self.range, self.generation);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { loader.dispatch(range, generation).await });
            }
            Err(_) => {
                // Dropping the senders resolves every waiter as cancelled.
                drop(loader.take_batch(range, generation));
            }
        }
    }
}
