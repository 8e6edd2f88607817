//! Finished-clip queue and the listener registry that announces new clips.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clip::FinishedClip;
use crate::stats::RelayStats;

/// FIFO of finished clips. Each clip leaves the queue exactly once.
pub struct ClipQueue {
    clips: Mutex<VecDeque<FinishedClip>>,
    capacity: Option<NonZeroUsize>,
    available: Notify,
    stats: Arc<RelayStats>,
}

impl ClipQueue {
    /// `capacity` of `None` means unbounded.
    pub fn new(capacity: Option<NonZeroUsize>, stats: Arc<RelayStats>) -> Self {
        Self {
            clips: Mutex::new(VecDeque::new()),
            capacity,
            available: Notify::new(),
            stats,
        }
    }

    /// Append a clip. When the queue is full the oldest clip is evicted and returned.
    pub fn enqueue(&self, clip: FinishedClip) -> Option<FinishedClip> {
        let evicted = {
            let mut clips = self.clips.lock();
            let evicted = match self.capacity {
                Some(cap) if clips.len() >= cap.get() => clips.pop_front(),
                _ => None,
            };
            clips.push_back(clip);
            evicted
        };

        if let Some(ref old) = evicted {
            warn!(clip = %old.id(), "Clip queue full, evicting oldest undelivered clip");
            self.stats.record_eviction();
        }
        self.available.notify_one();
        evicted
    }

    /// Remove and return the oldest clip, `None` if nothing is ready.
    pub fn pull_oldest(&self) -> Option<FinishedClip> {
        let clip = self.clips.lock().pop_front();
        self.stats.record_pull(clip.is_some());
        clip
    }

    /// Like [`pull_oldest`](Self::pull_oldest) but waits up to `timeout` for a clip to arrive.
    pub async fn pull_oldest_within(&self, timeout: Duration) -> Option<FinishedClip> {
        // No deadline when `timeout` reaches past what `Instant` can represent.
        let deadline = Instant::now().checked_add(timeout);
        let clip = loop {
            let notified = self.available.notified();
            if let Some(clip) = self.clips.lock().pop_front() {
                break Some(clip);
            }
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        break self.clips.lock().pop_front();
                    }
                }
                None => notified.await,
            }
        };
        self.stats.record_pull(clip.is_some());
        clip
    }

    pub fn len(&self) -> usize {
        self.clips.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.lock().is_empty()
    }
}

/// Something that can announce "a clip is ready".
pub trait ClipNotifier: Send + Sync {
    /// Tell one listener. Returns whether anyone was told.
    fn notify_one(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Signal delivered to a listener when a clip is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipReady;

/// Connected listeners in registration order.
pub struct ListenerRegistry {
    listeners: Mutex<BTreeMap<ListenerId, mpsc::UnboundedSender<ClipReady>>>,
    next_id: AtomicU64,
    stats: Arc<RelayStats>,
}

impl ListenerRegistry {
    pub fn new(stats: Arc<RelayStats>) -> Self {
        Self {
            listeners: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            stats,
        }
    }

    pub fn register(&self) -> (ListenerId, mpsc::UnboundedReceiver<ClipReady>) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().insert(id, tx);
        debug!(listener = %id, "Listener registered");
        (id, rx)
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.listeners.lock().remove(&id).is_some();
        if removed {
            debug!(listener = %id, "Listener unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl ClipNotifier for ListenerRegistry {
    /// Only the earliest-registered live listener is told. Listeners whose
    /// receiving side is gone are pruned on the way.
    fn notify_one(&self) -> bool {
        let mut listeners = self.listeners.lock();
        while let Some(entry) = listeners.first_entry() {
            if entry.get().send(ClipReady).is_ok() {
                debug!(listener = %entry.key(), "Notified listener of ready clip");
                self.stats.record_notification();
                return true;
            }
            let (id, _) = entry.remove_entry();
            debug!(listener = %id, "Pruned closed listener");
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(fill: u8) -> FinishedClip {
        FinishedClip::from_pcm(&[fill; 16], 22_050).unwrap()
    }

    #[test]
    fn test_pull_on_empty_queue() {
        let queue = ClipQueue::new(None, Arc::new(RelayStats::new()));
        assert!(queue.pull_oldest().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_then_pull_returns_same_clip() {
        let queue = ClipQueue::new(None, Arc::new(RelayStats::new()));
        let c = clip(1);
        let id = c.id();
        queue.enqueue(c);
        assert_eq!(queue.len(), 1);

        let pulled = queue.pull_oldest().unwrap();
        assert_eq!(pulled.id(), id);
        assert!(queue.is_empty());
        assert!(queue.pull_oldest().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let queue = ClipQueue::new(None, Arc::new(RelayStats::new()));
        let ids: Vec<_> = (0..4)
            .map(|i| {
                let c = clip(i);
                let id = c.id();
                queue.enqueue(c);
                id
            })
            .collect();
        let pulled: Vec<_> = std::iter::from_fn(|| queue.pull_oldest())
            .map(|c| c.id())
            .collect();
        assert_eq!(pulled, ids);
    }

    #[test]
    fn test_bounded_queue_evicts_oldest() {
        let stats = Arc::new(RelayStats::new());
        let queue = ClipQueue::new(NonZeroUsize::new(2), stats.clone());
        let first = clip(1);
        let first_id = first.id();
        assert!(queue.enqueue(first).is_none());
        assert!(queue.enqueue(clip(2)).is_none());

        let evicted = queue.enqueue(clip(3)).unwrap();
        assert_eq!(evicted.id(), first_id);
        assert_eq!(queue.len(), 2);
        assert_eq!(stats.snapshot().clips_evicted, 1);
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out_empty() {
        let queue = ClipQueue::new(None, Arc::new(RelayStats::new()));
        let started = std::time::Instant::now();
        assert!(queue
            .pull_oldest_within(Duration::from_millis(30))
            .await
            .is_none());
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_bounded_wait_wakes_on_enqueue() {
        let queue = Arc::new(ClipQueue::new(None, Arc::new(RelayStats::new())));
        let producer = queue.clone();
        let c = clip(9);
        let id = c.id();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(c);
        });

        let pulled = queue.pull_oldest_within(Duration::from_secs(5)).await;
        assert_eq!(pulled.map(|c| c.id()), Some(id));
    }

    #[tokio::test]
    async fn test_huge_wait_does_not_overflow() {
        let queue = Arc::new(ClipQueue::new(None, Arc::new(RelayStats::new())));
        queue.enqueue(clip(1));
        assert!(queue.pull_oldest_within(Duration::MAX).await.is_some());

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(clip(2));
        });
        let pulled = tokio::time::timeout(
            Duration::from_secs(5),
            queue.pull_oldest_within(Duration::from_millis(u64::MAX)),
        )
        .await
        .expect("wait never woke");
        assert!(pulled.is_some());
    }

    #[test]
    fn test_notify_with_no_listeners_is_noop() {
        let registry = ListenerRegistry::new(Arc::new(RelayStats::new()));
        assert!(!registry.notify_one());
    }

    #[test]
    fn test_notify_reaches_only_earliest_listener() {
        let stats = Arc::new(RelayStats::new());
        let registry = ListenerRegistry::new(stats.clone());
        let (_first, mut first_rx) = registry.register();
        let (_second, mut second_rx) = registry.register();

        assert!(registry.notify_one());
        assert_eq!(first_rx.try_recv(), Ok(ClipReady));
        assert!(second_rx.try_recv().is_err());
        assert_eq!(stats.snapshot().notifications_sent, 1);
    }

    #[test]
    fn test_unregistered_listener_is_skipped() {
        let registry = ListenerRegistry::new(Arc::new(RelayStats::new()));
        let (first, _first_rx) = registry.register();
        let (_second, mut second_rx) = registry.register();

        assert!(registry.unregister(first));
        assert!(!registry.unregister(first));
        assert!(registry.notify_one());
        assert_eq!(second_rx.try_recv(), Ok(ClipReady));
    }

    #[test]
    fn test_closed_listener_is_pruned() {
        let registry = ListenerRegistry::new(Arc::new(RelayStats::new()));
        let (_first, first_rx) = registry.register();
        let (_second, mut second_rx) = registry.register();
        drop(first_rx);

        assert!(registry.notify_one());
        assert_eq!(second_rx.try_recv(), Ok(ClipReady));
        assert_eq!(registry.len(), 1);
    }
}
