//! # Query Barrier
//!
//! Counts the radio queries outstanding for one polling cycle. Every cycle
//! gets a fresh [`PollingContext`] with a monotonic [`CycleId`]; opening a new
//! context supersedes the old one, and completions carrying a superseded id
//! are rejected by identity rather than by value.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Monotonic polling-cycle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CycleId(u64);

impl CycleId {
    /// Id carried by the snapshot in place before any cycle has committed.
    pub const ZERO: CycleId = CycleId(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of reporting one finished query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Context still waiting on this many queries.
    Pending(usize),
    /// This call observed the final 1 → 0 transition.
    Done,
    /// The context was superseded, or had already reached zero.
    Stale,
}

/// Outstanding-query counter for exactly one cycle.
#[derive(Debug)]
pub struct PollingContext {
    id: CycleId,
    outstanding: AtomicUsize,
}

impl PollingContext {
    pub fn id(&self) -> CycleId {
        self.id
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Decrement by one. Safe to call from many threads: exactly one caller
    /// ever sees [`Completion::Done`].
    pub fn complete(&self) -> Completion {
        match self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => Completion::Done,
            Ok(prev) => Completion::Pending(prev - 1),
            Err(_) => Completion::Stale,
        }
    }
}

/// Owns the current polling context.
#[derive(Debug, Default)]
pub struct QueryBarrier {
    last_id: u64,
    active: Option<Arc<PollingContext>>,
}

impl QueryBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle expecting `n` completions. Any previous context is
    /// invalidated; its future completions are no-ops.
    pub fn open(&mut self, n: usize) -> Arc<PollingContext> {
        self.last_id += 1;
        let ctx = Arc::new(PollingContext {
            id: CycleId(self.last_id),
            outstanding: AtomicUsize::new(n),
        });
        if let Some(prev) = self.active.replace(ctx.clone()) {
            if prev.outstanding() > 0 {
                tracing::debug!(
                    superseded = %prev.id,
                    outstanding = prev.outstanding(),
                    "polling context superseded"
                );
            }
        }
        ctx
    }

    /// Report one finished query for cycle `id`.
    pub fn complete(&self, id: CycleId) -> Completion {
        match &self.active {
            Some(ctx) if ctx.id == id => ctx.complete(),
            _ => Completion::Stale,
        }
    }

    pub fn is_current(&self, id: CycleId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|ctx| ctx.id == id && ctx.outstanding() > 0)
    }

    pub fn current(&self) -> Option<CycleId> {
        self.active.as_ref().map(|ctx| ctx.id)
    }

    /// Drop the active context; later completions for it are stale.
    pub fn close(&mut self) {
        self.active = None;
    }

    /// Id of the most recently opened cycle.
    pub fn last_id(&self) -> CycleId {
        CycleId(self.last_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn counts_down_to_done_once() {
        let mut barrier = QueryBarrier::new();
        let ctx = barrier.open(3);
        assert_eq!(barrier.complete(ctx.id()), Completion::Pending(2));
        assert_eq!(barrier.complete(ctx.id()), Completion::Pending(1));
        assert_eq!(barrier.complete(ctx.id()), Completion::Done);
        assert_eq!(barrier.complete(ctx.id()), Completion::Stale);
    }

    #[test]
    fn cycle_ids_are_monotonic() {
        let mut barrier = QueryBarrier::new();
        let a = barrier.open(1).id();
        let b = barrier.open(1).id();
        assert!(b > a);
        assert_eq!(barrier.last_id(), b);
    }

    #[test]
    fn superseded_context_completions_are_stale() {
        let mut barrier = QueryBarrier::new();
        let a = barrier.open(2);
        let b = barrier.open(1);

        // Cycle A's replies trickle in after B was opened.
        assert_eq!(barrier.complete(a.id()), Completion::Stale);
        assert_eq!(barrier.complete(a.id()), Completion::Stale);
        assert!(barrier.is_current(b.id()));

        assert_eq!(barrier.complete(b.id()), Completion::Done);
    }

    #[test]
    fn zero_sized_context_is_never_current() {
        let mut barrier = QueryBarrier::new();
        let ctx = barrier.open(0);
        assert!(!barrier.is_current(ctx.id()));
        assert_eq!(barrier.complete(ctx.id()), Completion::Stale);
    }

    #[test]
    fn close_invalidates_active_context() {
        let mut barrier = QueryBarrier::new();
        let ctx = barrier.open(1);
        barrier.close();
        assert_eq!(barrier.current(), None);
        assert_eq!(barrier.complete(ctx.id()), Completion::Stale);
    }

    #[test]
    fn concurrent_completions_observe_done_exactly_once() {
        const THREADS: usize = 16;
        for _ in 0..50 {
            let mut barrier = QueryBarrier::new();
            let ctx = barrier.open(THREADS);
            let gate = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let ctx = ctx.clone();
                    let gate = gate.clone();
                    thread::spawn(move || {
                        gate.wait();
                        ctx.complete()
                    })
                })
                .collect();

            let results: Vec<Completion> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            let done = results.iter().filter(|c| **c == Completion::Done).count();
            assert_eq!(done, 1, "results: {results:?}");
            assert_eq!(ctx.outstanding(), 0);
        }
    }
}
