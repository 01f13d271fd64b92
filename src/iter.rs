//! Lazy, closable result sequences handed out by routing backends.
//!
//! A [`ResultIter`] yields `anyhow::Result<T>` items one at a time. It is
//! owned by exactly one consumer and released when dropped, whichever way
//! iteration ends: exhaustion, an early `return`, an error item, or the
//! consumer's own future being cancelled.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

type BoxedResults<T> = Pin<Box<dyn Stream<Item = anyhow::Result<T>> + Send>>;
type CloseHook = Box<dyn FnOnce() + Send>;

/// Pull-based, one-shot sequence of results with release-on-drop semantics.
pub struct ResultIter<T> {
    inner: BoxedResults<T>,
    on_close: Option<CloseHook>,
}

impl<T: Send + 'static> ResultIter<T> {
    /// Wrap any stream of results.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
            on_close: None,
        }
    }

    /// A sequence that yields the given results in order.
    pub fn from_results(results: Vec<anyhow::Result<T>>) -> Self {
        Self::new(futures_util::stream::iter(results))
    }

    /// A sequence that yields only successful values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures_util::stream::iter(values.into_iter().map(Ok)))
    }

    /// A sequence with no items.
    pub fn empty() -> Self {
        Self::new(futures_util::stream::empty())
    }

    /// A sequence fed by a channel; it ends when every sender is dropped.
    pub fn from_receiver(rx: mpsc::Receiver<anyhow::Result<T>>) -> Self {
        Self::new(ReceiverStream::new(rx))
    }

    /// Drain all values, stopping at the first error.
    pub async fn read_all(mut self) -> anyhow::Result<Vec<T>> {
        let mut values = Vec::new();
        while let Some(res) = self.next().await {
            values.push(res?);
        }
        Ok(values)
    }
}

impl<T> ResultIter<T> {
    /// Run `hook` when the sequence is released.
    ///
    /// Backends use this to tear down whatever is producing the results. The
    /// hook runs exactly once, from `Drop`. Registering a second hook chains
    /// it after the first.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_close = Some(match self.on_close.take() {
            Some(prev) => Box::new(move || {
                prev();
                hook();
            }),
            None => Box::new(hook),
        });
        self
    }
}

impl<T> Stream for ResultIter<T> {
    type Item = anyhow::Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

impl<T> Drop for ResultIter<T> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl<T> fmt::Debug for ResultIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultIter")
            .field("has_close_hook", &self.on_close.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counted<T: Send + 'static>(iter: ResultIter<T>) -> (ResultIter<T>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let hook_closes = Arc::clone(&closes);
        let iter = iter.on_close(move || {
            hook_closes.fetch_add(1, Ordering::SeqCst);
        });
        (iter, closes)
    }

    #[tokio::test]
    async fn yields_items_in_order() {
        let iter = ResultIter::from_values(vec![1, 2, 3]);
        assert_eq!(iter.read_all().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn read_all_stops_at_first_error() {
        let iter = ResultIter::from_results(vec![
            Ok(1),
            Err(anyhow::anyhow!("backend went away")),
            Ok(3),
        ]);
        let err = iter.read_all().await.unwrap_err();
        assert_eq!(err.to_string(), "backend went away");
    }

    #[tokio::test]
    async fn close_hook_runs_once_after_exhaustion() {
        let (mut iter, closes) = counted(ResultIter::from_values(vec!["a", "b"]));
        while iter.next().await.is_some() {}
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        drop(iter);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_hook_runs_on_early_drop() {
        let (mut iter, closes) = counted(ResultIter::from_values(0..100));
        assert_eq!(iter.next().await.unwrap().unwrap(), 0);
        drop(iter);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chained_hooks_both_run() {
        let (iter, first) = counted(ResultIter::<u8>::empty());
        let (iter, second) = counted(iter);
        drop(iter);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn receiver_sequence_ends_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let mut iter = ResultIter::from_receiver(rx);
        tx.send(Ok(7u32)).await.unwrap();
        drop(tx);
        assert_eq!(iter.next().await.unwrap().unwrap(), 7);
        assert!(iter.next().await.is_none());
    }
}
