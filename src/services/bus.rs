//! In-process notification bus keyed by topic name.
//!
//! Producers call [NotificationBus::publish]; every consumer registered on the
//! topic at that moment receives one clone of the payload. Consumers are
//! [ConsumerHandle]s, which are [Stream]s that suspend between events and
//! unregister themselves when dropped; there is no separate unsubscribe call.
//!
//! Delivery is fire-and-forget: nothing is buffered for topics without
//! consumers and nothing is replayed to late subscribers. All consumers of a
//! topic see publishes in the same order because one publish is delivered to
//! every consumer while the topic map lock is held.
//!
//! The bus is a [Service] so the manager can tear it down on shutdown, which
//! ends every outstanding consumer stream.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, trace};

use crate::services::manager::{Service, ServiceHealth};

/// Identifier of a single consumer registration.
pub type ConsumerId = u64;

type Consumers<T> = HashMap<ConsumerId, mpsc::UnboundedSender<T>>;

struct BusInner<T> {
    topics: Mutex<HashMap<String, Consumers<T>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<T> BusInner<T> {
    fn unregister(&self, topic: &str, id: ConsumerId) -> bool {
        let mut topics = self.topics.lock();
        let Some(consumers) = topics.get_mut(topic) else {
            return false;
        };
        let removed = consumers.remove(&id).is_some();
        if consumers.is_empty() {
            topics.remove(topic);
        }
        removed
    }
}

/// Topic-scoped publish/subscribe bus. Cloning yields another handle onto the
/// same bus.
pub struct NotificationBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for NotificationBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for NotificationBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> NotificationBus<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Deliver `payload` to every consumer currently registered on `topic`.
    /// Returns the number of consumers that received it; zero means the
    /// payload was dropped.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        if self.inner.closed.load(Ordering::Acquire) {
            trace!(topic, "Bus closed, dropping payload");
            return 0;
        }

        let mut topics = self.inner.topics.lock();
        let Some(consumers) = topics.get_mut(topic) else {
            trace!(topic, "No consumers, dropping payload");
            return 0;
        };

        // Receivers are removed on drop, but a receiver can be gone before its
        // handle's Drop runs, so prune failed sends here.
        consumers.retain(|_, tx| tx.send(payload.clone()).is_ok());
        let delivered = consumers.len();
        if consumers.is_empty() {
            topics.remove(topic);
        }
        trace!(topic, delivered, "Published");
        delivered
    }

    /// Register a new consumer on `topic`. The returned handle yields every
    /// payload published on the topic from now on. On a closed bus the
    /// handle ends immediately.
    pub fn subscribe(&self, topic: &str) -> ConsumerHandle<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut topics = self.inner.topics.lock();
            // Checked under the lock so close() cannot miss this consumer.
            if !self.inner.closed.load(Ordering::Acquire) {
                topics.entry(topic.to_string()).or_default().insert(id, tx);
            }
        }

        debug!(topic, consumer_id = id, "Consumer registered");
        ConsumerHandle {
            id,
            topic: topic.to_string(),
            stream: UnboundedReceiverStream::new(rx),
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live consumers on `topic`.
    pub fn consumer_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Tear the bus down: every registered consumer is dropped so its stream
    /// ends, and further publishes are discarded until [reopen](Self::reopen).
    /// Returns how many consumers were disposed.
    pub fn close(&self) -> usize {
        let drained = {
            let mut topics = self.inner.topics.lock();
            self.inner.closed.store(true, Ordering::Release);
            std::mem::take(&mut *topics)
        };
        drained.values().map(|c| c.len()).sum()
    }

    /// Accept consumers and publishes again after [close](Self::close).
    pub fn reopen(&self) {
        self.inner.closed.store(false, Ordering::Release);
    }
}

/// A consumer's registration on one topic.
///
/// Yields payloads in publish order. Ends when the bus is closed. Dropping the
/// handle unregisters it.
pub struct ConsumerHandle<T> {
    id: ConsumerId,
    topic: String,
    stream: UnboundedReceiverStream<T>,
    bus: Weak<BusInner<T>>,
}

impl<T> ConsumerHandle<T> {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

// The handle never pins its fields in place.
impl<T> Unpin for ConsumerHandle<T> {}

impl<T> Stream for ConsumerHandle<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl<T> Drop for ConsumerHandle<T> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade()
            && bus.unregister(&self.topic, self.id)
        {
            debug!(topic = %self.topic, consumer_id = self.id, "Consumer unregistered");
        }
    }
}

impl<T> std::fmt::Debug for ConsumerHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

#[async_trait]
impl<T> Service for NotificationBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "bus"
    }

    async fn start(&self) -> Result<()> {
        self.reopen();
        info!(service = "bus", "Notification bus started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let disposed = self.close();
        info!(service = "bus", disposed, "Notification bus stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        if self.is_closed() {
            Ok(ServiceHealth::unhealthy("bus closed"))
        } else {
            Ok(ServiceHealth::healthy())
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    use super::*;

    const TOPIC: &str = "resource-created";

    #[test]
    fn test_publish_without_consumers_is_dropped() {
        let bus = NotificationBus::<u32>::new();
        assert_eq!(bus.publish(TOPIC, 1), 0);

        // A later subscriber does not see the earlier payload.
        let mut handle = task::spawn(bus.subscribe(TOPIC));
        assert_pending!(handle.poll_next());
    }

    #[test]
    fn test_every_consumer_receives_each_publish_in_order() {
        let bus = NotificationBus::new();
        let mut first = task::spawn(bus.subscribe(TOPIC));
        let mut second = task::spawn(bus.subscribe(TOPIC));

        for n in 1..=3 {
            assert_eq!(bus.publish(TOPIC, n), 2);
        }

        for handle in [&mut first, &mut second] {
            assert_ready_eq!(handle.poll_next(), Some(1));
            assert_ready_eq!(handle.poll_next(), Some(2));
            assert_ready_eq!(handle.poll_next(), Some(3));
            assert_pending!(handle.poll_next());
        }
    }

    #[test]
    fn test_no_replay_for_late_subscriber() {
        let bus = NotificationBus::new();
        let mut early = task::spawn(bus.subscribe(TOPIC));
        bus.publish(TOPIC, "first");

        let mut late = task::spawn(bus.subscribe(TOPIC));
        bus.publish(TOPIC, "second");

        assert_ready_eq!(early.poll_next(), Some("first"));
        assert_ready_eq!(early.poll_next(), Some("second"));
        assert_ready_eq!(late.poll_next(), Some("second"));
        assert_pending!(late.poll_next());
    }

    #[test]
    fn test_pending_consumer_is_woken_by_publish() {
        let bus = NotificationBus::new();
        let mut handle = task::spawn(bus.subscribe(TOPIC));
        assert_pending!(handle.poll_next());

        bus.publish(TOPIC, 7u8);
        assert!(handle.is_woken());
        assert_ready_eq!(handle.poll_next(), Some(7));
    }

    #[test]
    fn test_dropping_handle_unregisters_only_that_consumer() {
        let bus = NotificationBus::new();
        let kept = bus.subscribe(TOPIC);
        let dropped = bus.subscribe(TOPIC);
        assert_eq!(bus.consumer_count(TOPIC), 2);

        drop(dropped);
        assert_eq!(bus.consumer_count(TOPIC), 1);
        assert_eq!(bus.publish(TOPIC, 5), 1);

        let mut kept = task::spawn(kept);
        assert_ready_eq!(kept.poll_next(), Some(5));
    }

    #[test]
    fn test_last_unregister_removes_topic() {
        let bus = NotificationBus::<u8>::new();
        let handle = bus.subscribe(TOPIC);
        assert_eq!(handle.topic(), TOPIC);
        drop(handle);
        assert_eq!(bus.consumer_count(TOPIC), 0);
        assert!(bus.inner.topics.lock().is_empty());
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = NotificationBus::new();
        let mut created = task::spawn(bus.subscribe(TOPIC));
        let mut other = task::spawn(bus.subscribe("other"));

        assert_eq!(bus.publish("other", 'o'), 1);
        assert_pending!(created.poll_next());
        assert_ready_eq!(other.poll_next(), Some('o'));
    }

    #[test]
    fn test_consumer_ids_are_unique() {
        let bus = NotificationBus::<u8>::new();
        let a = bus.subscribe(TOPIC);
        let b = bus.subscribe(TOPIC);
        let c = bus.subscribe("other");
        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());
    }

    #[test]
    fn test_close_ends_streams_and_reopen_accepts_consumers() {
        let bus = NotificationBus::new();
        let mut a = task::spawn(bus.subscribe(TOPIC));
        let mut b = task::spawn(bus.subscribe("other"));

        assert_eq!(bus.close(), 2);
        assert!(bus.is_closed());
        assert_ready_eq!(a.poll_next(), None);
        assert_ready_eq!(b.poll_next(), None);

        assert_eq!(bus.publish(TOPIC, 1), 0);
        let mut after_close = task::spawn(bus.subscribe(TOPIC));
        assert_ready_eq!(after_close.poll_next(), None);
        assert_eq!(bus.consumer_count(TOPIC), 0);

        bus.reopen();
        let mut fresh = task::spawn(bus.subscribe(TOPIC));
        assert_eq!(bus.publish(TOPIC, 2), 1);
        assert_ready_eq!(fresh.poll_next(), Some(2));
    }

    #[test]
    fn test_handle_outliving_bus_ends_quietly() {
        let bus = NotificationBus::<u8>::new();
        let handle = bus.subscribe(TOPIC);
        drop(bus);
        let mut handle = task::spawn(handle);
        let polled = assert_ready!(handle.poll_next());
        assert_eq!(polled, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_are_seen_in_same_order() {
        let bus = NotificationBus::new();
        let first = bus.subscribe(TOPIC);
        let second = bus.subscribe(TOPIC);

        let mut tasks = Vec::new();
        for worker in 0..4u32 {
            let bus = bus.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..50u32 {
                    bus.publish(TOPIC, worker * 1000 + n);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        bus.close();

        let first: Vec<u32> = first.collect().await;
        let second: Vec<u32> = second.collect().await;
        assert_eq!(first.len(), 200);
        assert_eq!(first, second);

        // Each publisher's own sequence stays ordered.
        for worker in 0..4u32 {
            let seq: Vec<u32> = first
                .iter()
                .copied()
                .filter(|v| v / 1000 == worker)
                .collect();
            let mut sorted = seq.clone();
            sorted.sort_unstable();
            assert_eq!(seq, sorted);
        }
    }

    #[tokio::test]
    async fn test_service_lifecycle() {
        let bus = NotificationBus::<u8>::new();
        let handle = bus.subscribe(TOPIC);

        bus.stop().await.unwrap();
        assert_eq!(
            bus.health().await.unwrap().status,
            crate::services::manager::HealthStatus::Unhealthy
        );
        let drained: Vec<u8> = handle.collect().await;
        assert!(drained.is_empty());

        bus.start().await.unwrap();
        assert_eq!(bus.health().await.unwrap(), ServiceHealth::healthy());
        assert_eq!(bus.name(), "bus");
    }
}
