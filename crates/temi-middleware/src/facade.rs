//! [`TemiBridge`] – the single entry point a transport talks to.
//!
//! Owns the [`CommandDispatcher`], the [`EventSourceRegistry`] and the
//! [`HostContext`], and routes host lifecycle transitions into the latter.
//! Once [`TemiBridge::teardown`] has run, every dispatch and subscribe is
//! refused and no native listener remains registered.

use std::sync::Arc;

use parking_lot::RwLock;
use temi_hal::dispatcher::CommandDispatcher;
use temi_hal::host::HostContext;
use temi_hal::robot::{PackageResolver, RobotSdk};
use temi_types::{ActivityRef, BridgeError, EventSourceId, Reply, Value};
use tracing::{debug, info};

use crate::registry::EventSourceRegistry;
use crate::stream::{DEFAULT_CAPACITY, EventStream, SubscriptionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Events buffered per subscriber before drops begin.
    pub stream_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            stream_capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct TemiBridge {
    host: Arc<HostContext>,
    dispatcher: CommandDispatcher,
    registry: EventSourceRegistry,
    stream_capacity: usize,
    // Subscribe holds the read side across check-and-register so teardown
    // cannot slip in between.
    torn_down: RwLock<bool>,
}

impl TemiBridge {
    /// Wire the bridge to a robot.  No native listener is registered until
    /// the first subscribe.
    pub fn attach(
        robot: Arc<dyn RobotSdk>,
        resolver: Arc<dyn PackageResolver>,
        config: BridgeConfig,
    ) -> Self {
        let host = Arc::new(HostContext::new());
        let dispatcher = CommandDispatcher::new(Arc::clone(&robot), Arc::clone(&host), resolver);
        let registry = EventSourceRegistry::new(robot, config.stream_capacity);
        info!(stream_capacity = config.stream_capacity, "bridge attached");
        Self {
            host,
            dispatcher,
            registry,
            stream_capacity: config.stream_capacity.max(1),
            torn_down: RwLock::new(false),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn attach_activity(&self, activity: ActivityRef) {
        self.host.attach(activity);
    }

    /// The activity is being recreated; the current one stays recorded.
    pub fn detach_for_config_changes(&self) {
        debug!("host detached for configuration change");
    }

    pub fn reattach_activity(&self, activity: ActivityRef) {
        self.host.attach(activity);
    }

    pub fn detach_activity(&self) {
        self.host.detach();
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands and streams
    // ─────────────────────────────────────────────────────────────────────────

    pub fn dispatch(&self, method: &str, args: &Value) -> Reply {
        if self.is_torn_down() {
            return Reply::Failure(torn_down_error());
        }
        self.dispatcher.dispatch(method, args)
    }

    /// # Errors
    ///
    /// [`BridgeError::PreconditionUnmet`] after teardown, or the SDK's error
    /// if the native listener could not be registered.
    pub fn subscribe(&self, source: EventSourceId) -> Result<EventStream, BridgeError> {
        let torn_down = self.torn_down.read();
        if *torn_down {
            return Err(torn_down_error());
        }
        self.registry.subscribe(source)
    }

    /// Subscribe by transport channel name (`temi/<source>_stream`).
    ///
    /// # Errors
    ///
    /// [`BridgeError::Unrecognized`] for an unknown channel, otherwise as
    /// [`TemiBridge::subscribe`].
    pub fn subscribe_channel(&self, channel: &str) -> Result<EventStream, BridgeError> {
        let source = EventSourceId::from_channel_name(channel)
            .ok_or_else(|| BridgeError::Unrecognized(channel.to_string()))?;
        self.subscribe(source)
    }

    pub fn cancel(&self, handle: SubscriptionHandle) -> bool {
        self.registry.cancel(handle)
    }

    /// Cancel every subscription and refuse further work.  Safe to call more
    /// than once; returns how many subscriptions this call cancelled.
    pub fn teardown(&self) -> usize {
        let mut torn_down = self.torn_down.write();
        let first = !*torn_down;
        *torn_down = true;
        let cancelled = self.registry.cancel_all();
        if first {
            info!(cancelled, "bridge torn down");
        }
        cancelled
    }

    /// Events buffered per subscriber before drops begin.
    pub fn stream_capacity(&self) -> usize {
        self.stream_capacity
    }

    pub fn is_torn_down(&self) -> bool {
        *self.torn_down.read()
    }

    pub fn active_sources(&self) -> Vec<EventSourceId> {
        self.registry.active_sources()
    }
}

impl Drop for TemiBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn torn_down_error() -> BridgeError {
    BridgeError::PreconditionUnmet("bridge has been torn down".into())
}
