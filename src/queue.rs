//! Hand-off queue between crawl chains and the downloader.
//!
//! [`PostQueue`] is an unbounded multi-producer queue with an explicit
//! completion signal. Producers never block. Once [`PostQueue::mark_complete`]
//! has been called no further items are accepted, but consumers keep
//! receiving buffered items until the queue is drained; only then do they see
//! end-of-stream.
//!
//! # Example
//!
//! ```
//! use search_downloader::queue::PostQueue;
//! use search_downloader::extract::{MediaKind, MediaReference};
//!
//! # async fn example() {
//! let queue = PostQueue::new();
//! queue.enqueue(MediaReference::new("https://x.test/a.jpg", MediaKind::Photo, 1)).unwrap();
//! queue.mark_complete();
//!
//! assert!(queue.dequeue().await.is_some());
//! assert!(queue.dequeue().await.is_none());
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::extract::MediaReference;

/// Returned by [`PostQueue::enqueue`] after completion has been signalled.
#[derive(Debug, Error)]
#[error("post queue is complete, rejected {}", .0.url)]
pub struct QueueClosed(pub MediaReference);

/// Result of a non-blocking dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum TryDequeue {
    Item(MediaReference),
    /// Nothing buffered, more may still arrive.
    Empty,
    /// Complete and drained; nothing will ever arrive.
    Closed,
}

#[derive(Debug)]
struct Inner {
    sender: std::sync::Mutex<Option<mpsc::UnboundedSender<MediaReference>>>,
    receiver: Mutex<mpsc::UnboundedReceiver<MediaReference>>,
    enqueued: AtomicUsize,
}

/// Thread-safe, closeable queue of discovered media references.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct PostQueue {
    inner: Arc<Inner>,
}

impl Default for PostQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PostQueue {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                sender: std::sync::Mutex::new(Some(sender)),
                receiver: Mutex::new(receiver),
                enqueued: AtomicUsize::new(0),
            }),
        }
    }

    /// Appends an item. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] carrying the item if completion was already
    /// signalled.
    pub fn enqueue(&self, item: MediaReference) -> Result<(), QueueClosed> {
        let guard = match self.inner.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(sender) = guard.as_ref() else {
            return Err(QueueClosed(item));
        };
        trace!(url = %item.url, kind = %item.kind, "enqueued media reference");
        sender.send(item).map_err(|e| QueueClosed(e.0))?;
        self.inner.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Signals that no more items will arrive. Safe to call more than once.
    pub fn mark_complete(&self) {
        let mut guard = match self.inner.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            debug!(
                enqueued = self.inner.enqueued.load(Ordering::SeqCst),
                "post queue marked complete"
            );
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self.inner.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Total items accepted so far.
    #[must_use]
    pub fn enqueued(&self) -> usize {
        self.inner.enqueued.load(Ordering::SeqCst)
    }

    /// Waits for the next item; `None` once complete and drained.
    pub async fn dequeue(&self) -> Option<MediaReference> {
        self.inner.receiver.lock().await.recv().await
    }

    /// Takes the next item without waiting.
    ///
    /// Distinguishes "empty but open" from "empty and complete".
    pub async fn try_dequeue(&self) -> TryDequeue {
        match self.inner.receiver.lock().await.try_recv() {
            Ok(item) => TryDequeue::Item(item),
            Err(mpsc::error::TryRecvError::Empty) => TryDequeue::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => TryDequeue::Closed,
        }
    }
}
