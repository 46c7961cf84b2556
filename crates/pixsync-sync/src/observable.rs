//! Observable values bridged to pull-based streams
//!
//! An [`Observable`] holds a current value and pushes every change to its
//! subscribers. Each call to [`Observable::subscribe`] creates an independent
//! [`ObservableReader`], a [`Stream`] that yields the value current at
//! subscription time followed by every later change, and nothing emitted
//! before it subscribed.
//!
//! ```text
//!  set(v) ──► Observable ──┬──► slot A (queue, waker) ──► reader A
//!             current: T   ├──► slot B (queue, waker) ──► reader B
//!                          └──► slot C (queue, waker) ──► reader C
//! ```
//!
//! Dropping a reader removes its slot from the observable. Closing the
//! observable, or dropping its last handle, ends every reader once it has
//! drained its queue.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures_util::stream::{FusedStream, Stream};
use futures_util::task::AtomicWaker;

use crate::bounded::CompletionBounded;

/// How a reader's queue behaves when the reader falls behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferingPolicy {
    /// Keep every value until it is read
    #[default]
    Unbounded,
    /// Keep at most `n` values, discarding the oldest on overflow
    DropOldest(usize),
}

impl BufferingPolicy {
    fn capacity(&self) -> Option<usize> {
        match self {
            BufferingPolicy::Unbounded => None,
            BufferingPolicy::DropOldest(n) => Some((*n).max(1)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Slot
// ============================================================================

/// Per-reader queue shared between the observable and one reader
struct Slot<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: Option<usize>,
    waker: AtomicWaker,
    closed: AtomicBool,
}

impl<T> Slot<T> {
    fn new(policy: BufferingPolicy) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: policy.capacity(),
            waker: AtomicWaker::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, value: T) {
        {
            let mut queue = lock(&self.queue);
            if let Some(capacity) = self.capacity {
                while queue.len() >= capacity {
                    queue.pop_front();
                }
            }
            queue.push_back(value);
        }
        self.waker.wake();
    }

    fn pop(&self) -> Option<T> {
        lock(&self.queue).pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.waker.wake();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Observable
// ============================================================================

struct State<T> {
    current: T,
    subscribers: HashMap<u64, Arc<Slot<T>>>,
    next_id: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for slot in state.subscribers.values() {
            slot.close();
        }
    }
}

/// A current value with push notification to independent subscribers
///
/// Cloning an `Observable` yields another handle to the same value.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> Observable<T> {
    /// Creates an observable holding `initial`
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    current: initial,
                    subscribers: HashMap::new(),
                    next_id: 0,
                    closed: false,
                }),
            }),
        }
    }

    /// Returns a clone of the current value
    pub fn get(&self) -> T {
        lock(&self.shared.state).current.clone()
    }

    /// Replaces the current value and pushes it to every subscriber
    ///
    /// Ignored once the observable is closed.
    pub fn set(&self, value: T) {
        self.set_if(|_| true, value);
    }

    /// Replaces the current value only if `predicate` holds for it
    ///
    /// The check and the replacement happen atomically with respect to other
    /// writers. Returns whether the value was replaced.
    pub fn set_if(&self, predicate: impl FnOnce(&T) -> bool, value: T) -> bool {
        let mut state = lock(&self.shared.state);
        if state.closed || !predicate(&state.current) {
            return false;
        }
        for slot in state.subscribers.values() {
            slot.push(value.clone());
        }
        state.current = value;
        true
    }

    /// Creates an independent reader starting at the current value
    pub fn subscribe(&self, policy: BufferingPolicy) -> ObservableReader<T> {
        let slot = Arc::new(Slot::new(policy));
        let mut state = lock(&self.shared.state);
        slot.push(state.current.clone());

        let id = state.next_id;
        state.next_id += 1;
        if state.closed {
            slot.close();
        } else {
            state.subscribers.insert(id, Arc::clone(&slot));
        }

        ObservableReader {
            id,
            slot,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Ends every reader once drained; later `set` calls are ignored
    pub fn close(&self) {
        let mut state = lock(&self.shared.state);
        if state.closed {
            return;
        }
        state.closed = true;
        for (_, slot) in state.subscribers.drain() {
            slot.close();
        }
    }

    /// Returns true once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.state).closed
    }

    /// Number of live readers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.state).subscribers.len()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("Observable")
            .field("current", &state.current)
            .field("subscribers", &state.subscribers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

// ============================================================================
// ObservableReader
// ============================================================================

/// Pull-based view of an [`Observable`]
///
/// Dropping the reader unsubscribes it.
pub struct ObservableReader<T> {
    id: u64,
    slot: Arc<Slot<T>>,
    shared: Weak<Shared<T>>,
}

impl<T> ObservableReader<T> {
    /// Ends the stream right after the first item matching `is_terminal`
    pub fn until<F>(self, is_terminal: F) -> CompletionBounded<Self, F>
    where
        F: FnMut(&T) -> bool,
    {
        CompletionBounded::new(self, is_terminal)
    }
}

impl<T> Stream for ObservableReader<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let slot = &self.slot;
        if let Some(value) = slot.pop() {
            return Poll::Ready(Some(value));
        }
        if slot.is_closed() {
            return Poll::Ready(slot.pop());
        }

        slot.waker.register(cx.waker());

        // A push or close may have raced the registration.
        if let Some(value) = slot.pop() {
            return Poll::Ready(Some(value));
        }
        if slot.is_closed() {
            return Poll::Ready(slot.pop());
        }
        Poll::Pending
    }
}

impl<T> FusedStream for ObservableReader<T> {
    fn is_terminated(&self) -> bool {
        self.slot.is_closed() && lock(&self.slot.queue).is_empty()
    }
}

impl<T> Drop for ObservableReader<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.state).subscribers.remove(&self.id);
        }
    }
}

impl<T> fmt::Debug for ObservableReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableReader")
            .field("id", &self.id)
            .field("closed", &self.slot.is_closed())
            .finish()
    }
}
