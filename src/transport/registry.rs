//! Pending-request registry.
//!
//! Maps the sequence number of every in-flight long frame to a one-shot
//! signal that the receive loop fires when the matching ACK arrives.
//!
//! The map sits behind a `std::sync::Mutex`. Critical sections are a single
//! insert or remove and never await, so the receive loop is never held up
//! by a pending `send`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

/// A registered, not yet terminated request.
#[derive(Debug)]
struct PendingEntry {
    /// Identifies which waiter owns this slot.
    ticket: u64,
    /// When the request was registered.
    created_at: Instant,
    /// Fired exactly once on ACK.
    resolved: oneshot::Sender<()>,
}

/// How a [`Waiter`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The matching ACK arrived. Carries the time since registration.
    Resolved(Duration),
    /// The deadline elapsed first.
    Expired,
    /// The entry was dropped without being resolved, either because another
    /// request registered the same sequence or because the registry was
    /// cleared.
    Abandoned,
}

/// Registry of in-flight sequence numbers.
///
/// At most one entry exists per sequence. Registering a sequence that is
/// already pending replaces the earlier entry; its waiter then finishes with
/// [`WaitOutcome::Abandoned`].
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: Mutex<HashMap<u32, PendingEntry>>,
    next_ticket: AtomicU64,
}

impl PendingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u32, PendingEntry>> {
        // Entries stay consistent even if a holder panicked mid-insert.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `sequence` and return the handle to wait on.
    pub fn register(&self, sequence: u32) -> Waiter<'_> {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let created_at = Instant::now();

        let displaced = self.entries().insert(
            sequence,
            PendingEntry {
                ticket,
                created_at,
                resolved: tx,
            },
        );
        if displaced.is_some() {
            tracing::warn!(sequence, "sequence collision, replacing pending request");
        }

        Waiter {
            registry: self,
            sequence,
            ticket,
            created_at,
            resolved: rx,
        }
    }

    /// Resolve `sequence` if it is pending.
    ///
    /// Returns the elapsed time since registration, or `None` if nothing was
    /// waiting for this sequence.
    pub fn resolve(&self, sequence: u32) -> Option<Duration> {
        let entry = self.entries().remove(&sequence)?;
        let elapsed = entry.created_at.elapsed();
        // The waiter may have given up in the meantime.
        let _ = entry.resolved.send(());
        Some(elapsed)
    }

    /// Remove `sequence` by number, whichever registration holds it.
    ///
    /// Manual removal only. Timed-out sends release their slot by dropping
    /// their [`Waiter`], which checks the ticket so it never removes a newer
    /// registration for the same sequence; this method does not. A waiter
    /// still waiting on the removed entry finishes as
    /// [`WaitOutcome::Abandoned`]. Returns `true` if an entry was removed.
    pub fn expire(&self, sequence: u32) -> bool {
        self.entries().remove(&sequence).is_some()
    }

    /// Remove `sequence` only if the slot still belongs to `ticket`.
    fn release(&self, sequence: u32, ticket: u64) {
        let mut entries = self.entries();
        if entries.get(&sequence).is_some_and(|e| e.ticket == ticket) {
            entries.remove(&sequence);
        }
    }

    /// Check whether `sequence` is pending.
    pub fn contains(&self, sequence: u32) -> bool {
        self.entries().contains_key(&sequence)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no request is pending.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every pending request. Their waiters finish as abandoned.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

/// Handle held by the sender while it waits for an ACK.
///
/// Dropping the waiter releases its registry slot, unless the slot has
/// already been resolved or taken over by a newer registration.
#[derive(Debug)]
pub struct Waiter<'a> {
    registry: &'a PendingRegistry,
    sequence: u32,
    ticket: u64,
    created_at: Instant,
    resolved: oneshot::Receiver<()>,
}

impl Waiter<'_> {
    /// Sequence number this waiter is registered under.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// When the request was registered.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Wait for the ACK or until `deadline` elapses.
    pub async fn wait(mut self, deadline: Duration) -> WaitOutcome {
        match tokio::time::timeout(deadline, &mut self.resolved).await {
            Ok(Ok(())) => WaitOutcome::Resolved(self.created_at.elapsed()),
            Ok(Err(_)) => WaitOutcome::Abandoned,
            Err(_) => WaitOutcome::Expired,
        }
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.registry.release(self.sequence, self.ticket);
    }
}
