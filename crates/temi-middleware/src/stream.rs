//! [`StreamAdapter`] – one native event source as cancellable streams.
//!
//! Each adapter owns a small state machine guarded by a single mutex:
//!
//! ```text
//! Idle ──first subscribe──▶ Active { listener, generation, sinks }
//!  ▲                              │
//!  └──last cancel / disconnect────┘
//! ```
//!
//! While `Active`, exactly one native [`RobotListener`] is registered with
//! the SDK for the adapter's source.  Every native callback takes the same
//! mutex before fanning the event out to the live sinks, so a `cancel` that
//! returns has removed its sink before any later callback can look for it.
//! Callbacks from a listener that was already replaced carry a stale
//! generation number and are discarded.
//!
//! Sinks are bounded Tokio channels fed with `try_send`: a full sink drops
//! the event (the subscriber lagged), and the native thread never blocks.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use parking_lot::Mutex;
use temi_hal::robot::{ListenerId, RobotListener, RobotSdk};
use temi_types::{BridgeError, BridgeEvent, EventSourceId, RobotEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Default per-subscriber buffer (events queued before new ones are dropped
/// for a slow subscriber).
pub const DEFAULT_CAPACITY: usize = 256;

/// Identifies one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    source: EventSourceId,
    id: u64,
}

impl SubscriptionHandle {
    pub fn source(&self) -> EventSourceId {
        self.source
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventStream
// ─────────────────────────────────────────────────────────────────────────────

/// The receiving end of a subscription.
///
/// Yields [`BridgeEvent`]s in native delivery order and ends (`None`) once
/// the subscription is cancelled, torn down, or disconnected by the SDK.
/// Nothing is yielded after the cancel call for its handle has returned.
pub struct EventStream {
    handle: SubscriptionHandle,
    receiver: mpsc::Receiver<BridgeEvent>,
    open: Arc<AtomicBool>,
}

impl EventStream {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        let event = self.receiver.recv().await?;
        self.open.load(Ordering::Acquire).then_some(event)
    }

    /// Take the next already-queued event, if any.
    pub fn try_recv(&mut self) -> Option<BridgeEvent> {
        let event = self.receiver.try_recv().ok()?;
        self.open.load(Ordering::Acquire).then_some(event)
    }
}

impl Stream for EventStream {
    type Item = BridgeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<BridgeEvent>> {
        let event = ready!(self.receiver.poll_recv(cx));
        Poll::Ready(event.filter(|_| self.open.load(Ordering::Acquire)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter state
// ─────────────────────────────────────────────────────────────────────────────

struct Sink {
    sender: mpsc::Sender<BridgeEvent>,
    open: Arc<AtomicBool>,
}

impl Sink {
    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

enum AdapterState {
    Idle,
    Active {
        listener: ListenerId,
        generation: u64,
        sinks: HashMap<u64, Sink>,
    },
}

struct AdapterInner {
    source: EventSourceId,
    robot: Arc<dyn RobotSdk>,
    capacity: usize,
    state: Mutex<AdapterState>,
    next_subscription: AtomicU64,
    next_generation: AtomicU64,
}

impl AdapterInner {
    // Unregister the native listener and return to Idle.  Caller holds the
    // state lock.
    fn release(&self, state: &mut AdapterState) {
        if let AdapterState::Active { listener, .. } = std::mem::replace(state, AdapterState::Idle) {
            match self.robot.remove_listener(self.source, listener) {
                Ok(()) => info!(source = %self.source, "native listener unregistered"),
                Err(e) => warn!(source = %self.source, error = %e, "failed to unregister native listener"),
            }
        }
    }

    fn deliver(&self, generation: u64, event: RobotEvent) {
        let mut state = self.state.lock();
        let now_empty = match &mut *state {
            AdapterState::Active {
                generation: current,
                sinks,
                ..
            } if *current == generation => {
                if event.source() != self.source {
                    warn!(
                        source = %self.source,
                        got = %event.source(),
                        "dropping event delivered to the wrong source"
                    );
                    return;
                }
                let payload = match event.to_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(source = %self.source, error = %e, "dropping malformed native event");
                        return;
                    }
                };
                let event = BridgeEvent::new(self.source, payload);
                sinks.retain(|id, sink| match sink.sender.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!(source = %self.source, subscription = id, "subscriber lagged; event dropped");
                        true
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(source = %self.source, subscription = id, "subscriber dropped its stream");
                        false
                    }
                });
                sinks.is_empty()
            }
            _ => {
                debug!(source = %self.source, "discarding callback for inactive listener");
                return;
            }
        };
        if now_empty {
            self.release(&mut state);
        }
    }

    fn disconnect(&self, generation: u64, reason: &str) {
        let mut state = self.state.lock();
        if matches!(&*state, AdapterState::Active { generation: g, .. } if *g == generation) {
            warn!(source = %self.source, reason, "native source disconnected; closing streams");
            // Dropping the senders ends every stream once it has drained.
            self.release(&mut state);
        }
    }
}

/// Native callback target handed to the SDK.
struct NativeListener {
    adapter: Weak<AdapterInner>,
    generation: u64,
}

impl RobotListener for NativeListener {
    fn on_event(&self, event: RobotEvent) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.deliver(self.generation, event);
        }
    }

    fn on_disconnect(&self, reason: &str) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.disconnect(self.generation, reason);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StreamAdapter
// ─────────────────────────────────────────────────────────────────────────────

/// Turns the callbacks of one [`EventSourceId`] into [`EventStream`]s.
pub struct StreamAdapter {
    inner: Arc<AdapterInner>,
}

impl StreamAdapter {
    pub fn new(source: EventSourceId, robot: Arc<dyn RobotSdk>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                source,
                robot,
                capacity: capacity.max(1),
                state: Mutex::new(AdapterState::Idle),
                next_subscription: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn source(&self) -> EventSourceId {
        self.inner.source
    }

    /// Open a new stream, registering the native listener if this is the
    /// first live subscription.
    ///
    /// # Errors
    ///
    /// Propagates the SDK's error when listener registration fails; the
    /// adapter stays Idle.
    pub fn subscribe(&self) -> Result<EventStream, BridgeError> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let id = inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(inner.capacity);
        let open = Arc::new(AtomicBool::new(true));
        let sink = Sink {
            sender,
            open: Arc::clone(&open),
        };

        match &mut *state {
            AdapterState::Active { sinks, .. } => {
                sinks.insert(id, sink);
            }
            AdapterState::Idle => {
                let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let listener = Arc::new(NativeListener {
                    adapter: Arc::downgrade(inner),
                    generation,
                });
                let listener_id = inner.robot.add_listener(inner.source, listener)?;
                info!(source = %inner.source, "native listener registered");
                *state = AdapterState::Active {
                    listener: listener_id,
                    generation,
                    sinks: HashMap::from([(id, sink)]),
                };
            }
        }
        debug!(source = %inner.source, subscription = id, "subscribed");

        Ok(EventStream {
            handle: SubscriptionHandle {
                source: inner.source,
                id,
            },
            receiver,
            open,
        })
    }

    /// Cancel one subscription.  Returns `false` if the handle was not live
    /// (already cancelled, disconnected, or belonging to another source).
    pub fn cancel(&self, handle: SubscriptionHandle) -> bool {
        if handle.source != self.inner.source {
            return false;
        }
        let mut state = self.inner.state.lock();
        let AdapterState::Active { sinks, .. } = &mut *state else {
            return false;
        };
        let Some(sink) = sinks.remove(&handle.id) else {
            return false;
        };
        sink.close();
        debug!(source = %self.inner.source, subscription = handle.id, "cancelled");
        if sinks.is_empty() {
            self.inner.release(&mut state);
        }
        true
    }

    /// Cancel every subscription.  Returns how many were live.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.inner.state.lock();
        let cancelled = match &*state {
            AdapterState::Active { sinks, .. } => {
                sinks.values().for_each(Sink::close);
                sinks.len()
            }
            AdapterState::Idle => 0,
        };
        self.inner.release(&mut state);
        cancelled
    }

    pub fn is_active(&self) -> bool {
        matches!(&*self.inner.state.lock(), AdapterState::Active { .. })
    }

    pub fn subscriber_count(&self) -> usize {
        match &*self.inner.state.lock() {
            AdapterState::Active { sinks, .. } => sinks.len(),
            AdapterState::Idle => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use temi_hal::sim::SimRobot;
    use temi_types::{BatteryData, Value};

    fn battery_adapter(capacity: usize) -> (Arc<SimRobot>, StreamAdapter) {
        let robot = Arc::new(SimRobot::new("sn"));
        let adapter = StreamAdapter::new(EventSourceId::BatteryStatusChanged, robot.clone(), capacity);
        (robot, adapter)
    }

    fn battery(level: i32, charging: bool) -> RobotEvent {
        RobotEvent::BatteryStatusChanged(BatteryData::new(level, charging))
    }

    #[tokio::test]
    async fn battery_events_arrive_in_order() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let mut stream = adapter.subscribe().unwrap();

        robot.emit(battery(50, false));
        robot.emit(battery(80, true));

        let first = stream.recv().await.expect("first event");
        let second = stream.recv().await.expect("second event");
        assert_eq!(first.source, EventSourceId::BatteryStatusChanged);
        assert_eq!(first.payload.get("batteryPercentage"), Some(&Value::Int(50)));
        assert_eq!(first.payload.get("isCharging"), Some(&Value::Bool(false)));
        assert_eq!(second.payload.get("batteryPercentage"), Some(&Value::Int(80)));
        assert_eq!(second.payload.get("isCharging"), Some(&Value::Bool(true)));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn one_native_listener_for_many_subscribers() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let a = adapter.subscribe().unwrap();
        let b = adapter.subscribe().unwrap();
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 1);
        assert_eq!(adapter.subscriber_count(), 2);

        assert!(adapter.cancel(a.handle()));
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 1);
        assert!(adapter.cancel(b.handle()));
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 0);
        assert!(!adapter.is_active());
    }

    #[test]
    fn cancel_twice_reports_false() {
        let (_robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let stream = adapter.subscribe().unwrap();
        assert!(adapter.cancel(stream.handle()));
        assert!(!adapter.cancel(stream.handle()));
    }

    #[test]
    fn cancelled_stream_observes_nothing_more() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let mut stream = adapter.subscribe().unwrap();
        robot.emit(battery(10, false));
        adapter.cancel(stream.handle());
        robot.emit(battery(11, false));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn concurrent_subscribes_register_one_listener() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let adapter = Arc::new(adapter);

        let streams: Vec<EventStream> = thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| {
                    let adapter = Arc::clone(&adapter);
                    scope.spawn(move || adapter.subscribe().unwrap())
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(streams.len(), 16);
        assert_eq!(robot.peak_listener_count(EventSourceId::BatteryStatusChanged), 1);
        assert_eq!(adapter.subscriber_count(), 16);
    }

    #[test]
    fn cancel_racing_native_callbacks_delivers_nothing_after_cancel() {
        for _ in 0..200 {
            let (robot, adapter) = battery_adapter(1024);
            let mut stream = adapter.subscribe().unwrap();
            let stop = Arc::new(AtomicBool::new(false));

            let firer = {
                let robot = Arc::clone(&robot);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut level = 0;
                    while !stop.load(Ordering::Relaxed) {
                        robot.emit(battery(level % 101, false));
                        level += 1;
                    }
                })
            };

            thread::sleep(Duration::from_micros(50));
            assert!(adapter.cancel(stream.handle()));
            let after_cancel = stream.try_recv();
            stop.store(true, Ordering::Relaxed);
            firer.join().unwrap();

            assert!(after_cancel.is_none(), "event observed after cancel returned");
            assert!(stream.try_recv().is_none(), "event observed after cancel returned");
            assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 0);
        }
    }

    #[tokio::test]
    async fn resubscribe_after_cancel_registers_fresh_listener() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let first = adapter.subscribe().unwrap();
        adapter.cancel(first.handle());

        let mut second = adapter.subscribe().unwrap();
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 1);
        robot.emit(battery(33, true));
        let event = second.recv().await.expect("event on fresh subscription");
        assert_eq!(event.payload.get("batteryPercentage"), Some(&Value::Int(33)));
    }

    #[tokio::test]
    async fn malformed_events_are_dropped_not_fatal() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let mut stream = adapter.subscribe().unwrap();

        robot.emit(battery(150, false));
        robot.emit_as(EventSourceId::BatteryStatusChanged, RobotEvent::RobotReady(true));
        robot.emit(battery(20, false));

        let event = stream.recv().await.expect("valid event still delivered");
        assert_eq!(event.payload.get("batteryPercentage"), Some(&Value::Int(20)));
        assert!(adapter.is_active());
    }

    #[tokio::test]
    async fn disconnect_closes_streams_and_allows_resubscribe() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let mut stream = adapter.subscribe().unwrap();
        robot.emit(battery(60, false));
        robot.disconnect(EventSourceId::BatteryStatusChanged, "battery service died");

        // Events queued before the disconnect drain, then the stream ends.
        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_none());
        assert!(!adapter.is_active());
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 0);

        let _again = adapter.subscribe().unwrap();
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 1);
    }

    #[test]
    fn full_sink_drops_without_blocking() {
        let (robot, adapter) = battery_adapter(2);
        let mut stream = adapter.subscribe().unwrap();
        for level in 0..10 {
            robot.emit(battery(level, false));
        }
        let mut received = 0;
        while stream.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 2);
        assert!(adapter.is_active());
    }

    #[test]
    fn dropped_stream_is_pruned_on_next_delivery() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let stream = adapter.subscribe().unwrap();
        drop(stream);
        robot.emit(battery(1, false));
        assert!(!adapter.is_active());
        assert_eq!(robot.listener_count(EventSourceId::BatteryStatusChanged), 0);
    }

    #[test]
    fn stale_listener_callbacks_are_ignored() {
        let (robot, adapter) = battery_adapter(DEFAULT_CAPACITY);
        let first = adapter.subscribe().unwrap();

        // Keep a clone of the first native listener alive past its removal.
        let stale = NativeListener {
            adapter: Arc::downgrade(&adapter.inner),
            generation: 1,
        };
        adapter.cancel(first.handle());
        let mut second = adapter.subscribe().unwrap();

        stale.on_event(battery(99, true));
        assert!(second.try_recv().is_none());

        robot.emit(battery(98, true));
        assert!(second.try_recv().is_some());
    }

    #[test]
    fn cancel_rejects_foreign_handle() {
        let robot = Arc::new(SimRobot::new("sn"));
        let battery = StreamAdapter::new(EventSourceId::BatteryStatusChanged, robot.clone(), 8);
        let asr = StreamAdapter::new(EventSourceId::AsrResult, robot, 8);
        let stream = battery.subscribe().unwrap();
        assert!(!asr.cancel(stream.handle()));
        assert!(battery.is_active());
    }
}
