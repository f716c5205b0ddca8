//! [`EventSourceRegistry`] – one [`StreamAdapter`] per event source.

use std::collections::BTreeMap;
use std::sync::Arc;

use temi_hal::robot::RobotSdk;
use temi_types::{BridgeError, EventSourceId};

use crate::stream::{EventStream, StreamAdapter, SubscriptionHandle};

pub struct EventSourceRegistry {
    adapters: BTreeMap<EventSourceId, StreamAdapter>,
}

impl EventSourceRegistry {
    /// Build an idle adapter for every entry of [`EventSourceId::ALL`].
    pub fn new(robot: Arc<dyn RobotSdk>, capacity: usize) -> Self {
        let adapters = EventSourceId::ALL
            .into_iter()
            .map(|source| (source, StreamAdapter::new(source, Arc::clone(&robot), capacity)))
            .collect();
        Self { adapters }
    }

    /// The adapter for `source`.
    pub fn adapter(&self, source: EventSourceId) -> Option<&StreamAdapter> {
        self.adapters.get(&source)
    }

    pub fn subscribe(&self, source: EventSourceId) -> Result<EventStream, BridgeError> {
        self.adapters
            .get(&source)
            .ok_or_else(|| BridgeError::Unrecognized(source.channel_name().to_string()))?
            .subscribe()
    }

    pub fn cancel(&self, handle: SubscriptionHandle) -> bool {
        self.adapters
            .get(&handle.source())
            .is_some_and(|adapter| adapter.cancel(handle))
    }

    /// Cancel everything on every source.  Returns the number of
    /// subscriptions that were live.
    pub fn cancel_all(&self) -> usize {
        self.adapters.values().map(StreamAdapter::cancel_all).sum()
    }

    /// Sources that currently have a native listener registered.
    pub fn active_sources(&self) -> Vec<EventSourceId> {
        self.adapters
            .iter()
            .filter(|(_, adapter)| adapter.is_active())
            .map(|(source, _)| *source)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temi_hal::sim::SimRobot;
    use temi_types::{BatteryData, RobotEvent};

    #[test]
    fn covers_every_source() {
        let registry = EventSourceRegistry::new(Arc::new(SimRobot::new("sn")), 8);
        for source in EventSourceId::ALL {
            assert_eq!(registry.adapter(source).map(StreamAdapter::source), Some(source));
        }
        assert!(registry.active_sources().is_empty());
    }

    #[test]
    fn sources_are_independent() {
        let robot = Arc::new(SimRobot::new("sn"));
        let registry = EventSourceRegistry::new(robot.clone(), 4);
        let mut battery = registry.subscribe(EventSourceId::BatteryStatusChanged).unwrap();
        let mut ready = registry.subscribe(EventSourceId::RobotReady).unwrap();

        // Flood the battery source well past its capacity.
        for level in 0..100 {
            robot.emit(RobotEvent::BatteryStatusChanged(BatteryData::new(level, false)));
        }
        robot.emit(RobotEvent::RobotReady(true));

        let ready_event = ready.try_recv().expect("robot ready delivered despite flood");
        assert_eq!(ready_event.source, EventSourceId::RobotReady);
        let mut drained = 0;
        while battery.try_recv().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 4);
    }

    #[test]
    fn cancel_all_unregisters_everything() {
        let robot = Arc::new(SimRobot::new("sn"));
        let registry = EventSourceRegistry::new(robot.clone(), 8);
        let _streams: Vec<_> = EventSourceId::ALL
            .into_iter()
            .map(|source| registry.subscribe(source).unwrap())
            .collect();
        assert_eq!(robot.total_listener_count(), 12);
        assert_eq!(registry.active_sources().len(), 12);

        assert_eq!(registry.cancel_all(), 12);
        assert_eq!(robot.total_listener_count(), 0);
        assert_eq!(registry.cancel_all(), 0);
    }

    #[test]
    fn cancel_routes_by_handle_source() {
        let robot = Arc::new(SimRobot::new("sn"));
        let registry = EventSourceRegistry::new(robot.clone(), 8);
        let stream = registry.subscribe(EventSourceId::AsrResult).unwrap();
        assert!(registry.cancel(stream.handle()));
        assert_eq!(robot.listener_count(EventSourceId::AsrResult), 0);
    }
}
