//! Completion-bounded streams
//!
//! Lifecycle streams in this crate never end on their own while their
//! producer is alive; they carry a terminal item instead (`Completed`,
//! `done`, ...). [`CompletionBounded`] turns such a stream into a finite one:
//! it yields the terminal item, drops its source and returns `None` from then
//! on without polling the source again.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::stream::{FusedStream, Stream};
use pixsync_core::domain::{RenderingJobRecord, TransferEvent};

/// Values that can mark the end of a lifecycle
pub trait Terminal {
    /// Returns true if no further values are meaningful after this one
    fn is_terminal(&self) -> bool;
}

impl Terminal for TransferEvent {
    fn is_terminal(&self) -> bool {
        TransferEvent::is_terminal(self)
    }
}

impl Terminal for RenderingJobRecord {
    fn is_terminal(&self) -> bool {
        RenderingJobRecord::is_terminal(self)
    }
}

/// Anything that exposes a terminal-bounded update stream
pub trait UpdateSource<T> {
    /// The stream type returned by [`updates`](Self::updates)
    type Updates: Stream<Item = T> + Send + Unpin + 'static;

    /// Fresh view of the current value and all later ones, ending after the
    /// terminal value
    fn updates(&self) -> Self::Updates;
}

/// Stream adapter that ends after the first terminal item
#[must_use = "streams do nothing unless polled"]
pub struct CompletionBounded<S, F> {
    source: Option<S>,
    is_terminal: F,
}

impl<S, F> CompletionBounded<S, F> {
    /// Wraps `source`, ending after the first item for which `is_terminal` holds
    pub fn new(source: S, is_terminal: F) -> Self {
        Self {
            source: Some(source),
            is_terminal,
        }
    }

    /// Returns true once the source has been released
    pub fn is_finished(&self) -> bool {
        self.source.is_none()
    }
}

impl<S, F> Stream for CompletionBounded<S, F>
where
    S: Stream + Unpin,
    F: FnMut(&S::Item) -> bool + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let this = self.get_mut();
        let Some(source) = this.source.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(source).poll_next(cx)) {
            Some(item) => {
                if (this.is_terminal)(&item) {
                    this.source = None;
                }
                Poll::Ready(Some(item))
            }
            None => {
                this.source = None;
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.source {
            Some(source) => (0, source.size_hint().1),
            None => (0, Some(0)),
        }
    }
}

impl<S, F> FusedStream for CompletionBounded<S, F>
where
    S: Stream + Unpin,
    F: FnMut(&S::Item) -> bool + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.source.is_none()
    }
}

/// `StreamExt`-style constructors for [`CompletionBounded`]
pub trait CompletionBoundedExt: Stream + Sized {
    /// Ends after the first item matching `is_terminal`
    fn until_terminal<F>(self, is_terminal: F) -> CompletionBounded<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        CompletionBounded::new(self, is_terminal)
    }

    /// Ends after the first item whose [`Terminal::is_terminal`] holds
    fn until_complete(self) -> CompletionBounded<Self, fn(&Self::Item) -> bool>
    where
        Self::Item: Terminal,
    {
        CompletionBounded::new(self, <Self::Item as Terminal>::is_terminal)
    }
}

impl<S: Stream> CompletionBoundedExt for S {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures_util::stream::{self, StreamExt};

    use super::*;

    #[tokio::test]
    async fn test_stops_after_terminal_item() {
        let source = stream::iter(vec![1, 2, 3, 4, 5]);
        let items: Vec<_> = source.until_terminal(|v| *v == 3).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_never_polls_source_after_terminal() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polled);
        let source = stream::iter(0..10).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut bounded = source.until_terminal(|v| *v == 1);
        assert_eq!(bounded.next().await, Some(0));
        assert_eq!(bounded.next().await, Some(1));
        assert!(bounded.is_finished());
        assert_eq!(bounded.next().await, None);
        assert_eq!(bounded.next().await, None);
        assert_eq!(polled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ends_when_source_ends() {
        let source = stream::iter(vec![1, 2]);
        let mut bounded = source.until_terminal(|v| *v > 10);
        assert_eq!(bounded.next().await, Some(1));
        assert_eq!(bounded.next().await, Some(2));
        assert_eq!(bounded.next().await, None);
        assert!(bounded.is_terminated());
    }

    #[tokio::test]
    async fn test_until_complete_uses_terminal_trait() {
        let events = vec![
            TransferEvent::Initializing,
            TransferEvent::Started,
            TransferEvent::Progress(0.5),
            TransferEvent::Completed,
            TransferEvent::Started,
        ];
        let collected: Vec<_> = stream::iter(events).until_complete().collect().await;
        assert_eq!(collected.len(), 4);
        assert_eq!(collected.last(), Some(&TransferEvent::Completed));
    }
}
