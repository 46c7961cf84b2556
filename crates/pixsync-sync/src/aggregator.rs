//! Fan-in aggregation of many update streams
//!
//! A [`FanInAggregator`] forwards every value of a dynamic set of sources into
//! one combined [`Observable`]. Each source gets its own forwarding task; the
//! task removes its entry when its source ends, so a set of terminal-bounded
//! sources (transfers, rendering jobs) drains by itself. A task only ever
//! removes its own entry, never one added later under the same id.
//!
//! ```text
//! source A ──► task A ──┐
//! source B ──► task B ──┼──► output: Observable<T> ──► updates()
//! source C ──► task C ──┘
//!           tasks: DashMap<id, Forwarder>
//! ```
//!
//! Values from one source keep their order; values from different sources
//! interleave in emission order with no further guarantee.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

use crate::bounded::UpdateSource;
use crate::observable::{BufferingPolicy, Observable, ObservableReader};

/// Forwarding task of one source
struct Forwarder {
    generation: u64,
    handle: AbortHandle,
}

/// Multiplexes a dynamic set of sources into one observable stream
pub struct FanInAggregator<T> {
    output: Observable<T>,
    tasks: Arc<DashMap<Uuid, Forwarder>>,
    generations: AtomicU64,
}

impl<T> FanInAggregator<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an aggregator whose combined value starts at `initial`
    pub fn new(initial: T) -> Self {
        Self {
            output: Observable::new(initial),
            tasks: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Starts forwarding `source` under `id`
    ///
    /// # Returns
    /// `false` if a source is already tracked under `id`; the new source is
    /// dropped unpolled
    pub fn add<S>(&self, id: Uuid, source: S) -> bool
    where
        S: Stream<Item = T> + Send + 'static,
    {
        match self.tasks.entry(id) {
            Entry::Occupied(_) => {
                debug!(%id, "Source already tracked");
                false
            }
            Entry::Vacant(vacant) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                let output = self.output.clone();
                let tasks = Arc::clone(&self.tasks);
                let handle = tokio::spawn(async move {
                    let mut source = std::pin::pin!(source);
                    while let Some(value) = source.next().await {
                        output.set(value);
                    }
                    tasks.remove_if(&id, |_, current| current.generation == generation);
                    debug!(%id, "Source finished, no longer tracked");
                });
                vacant.insert(Forwarder {
                    generation,
                    handle: handle.abort_handle(),
                });
                true
            }
        }
    }

    /// Tracks the update stream of `source` under `id`
    pub fn track<U>(&self, id: Uuid, source: &U) -> bool
    where
        U: UpdateSource<T>,
    {
        self.add(id, source.updates())
    }

    /// Pull-based view of the combined stream
    pub fn updates(&self, policy: BufferingPolicy) -> ObservableReader<T> {
        self.output.subscribe(policy)
    }

    /// Latest value forwarded from any source
    pub fn current(&self) -> T {
        self.output.get()
    }

    /// Number of sources still forwarding
    pub fn tracked_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if a source is tracked under `id`
    pub fn is_tracking(&self, id: Uuid) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Identifiers of all tracked sources
    pub fn tracked_ids(&self) -> Vec<Uuid> {
        self.tasks.iter().map(|entry| *entry.key()).collect()
    }

    /// Stops forwarding the source tracked under `id`
    ///
    /// # Returns
    /// `true` if a source was tracked under `id`
    pub fn remove(&self, id: Uuid) -> bool {
        match self.tasks.remove(&id) {
            Some((_, forwarder)) => {
                forwarder.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Stops forwarding every source
    pub fn cancel_all(&self) {
        let ids: Vec<Uuid> = self.tracked_ids();
        for id in ids {
            self.remove(id);
        }
    }
}

impl<T> Drop for FanInAggregator<T> {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().handle.abort();
        }
    }
}
