//! The robot capability surface.
//!
//! [`RobotSdk`] is everything the bridge may ask of the native SDK: imperative
//! operations, read-only properties, and listener registration for the
//! [`EventSourceId`] catalogue.  The bridge only ever talks to the trait, so
//! the real SDK binding and the in-process [`SimRobot`][crate::sim::SimRobot]
//! are interchangeable.

use std::sync::Arc;

use temi_types::{
    ActivityInfo, ActivityRef, BatteryData, BridgeError, CallDetail, EventSourceId, RobotEvent,
    TtsRequest, UserInfo,
};

/// Handle returned by [`RobotSdk::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A native callback receiver.
///
/// The SDK may invoke these methods from any of its own threads, possibly
/// concurrently with registration calls on the caller's thread.
pub trait RobotListener: Send + Sync {
    fn on_event(&self, event: RobotEvent);

    /// The SDK can no longer deliver events for this listener.
    fn on_disconnect(&self, reason: &str);
}

/// The native SDK, shared by every component of the bridge.
///
/// Implementations must not invoke a [`RobotListener`] while holding the lock
/// that guards listener registration: the bridge registers listeners while
/// holding its own per-source lock, and delivery takes that same lock.  For
/// the same reason `add_listener` must not call the new listener before it
/// returns.
///
/// Operations return [`BridgeError::CapabilityFailure`] when the SDK rejects
/// the request (unknown location, hardware busy, ...).
pub trait RobotSdk: Send + Sync {
    // -- properties ---------------------------------------------------------

    fn serial_number(&self) -> String;
    fn privacy_mode(&self) -> bool;
    /// `None` until the battery has reported at least once.
    fn battery_data(&self) -> Option<BatteryData>;
    fn locations(&self) -> Vec<String>;
    /// `None` when no admin has been paired with the robot.
    fn admin_info(&self) -> Option<UserInfo>;
    fn all_contacts(&self) -> Vec<UserInfo>;
    fn recent_calls(&self) -> Vec<CallDetail>;

    // -- system UI ----------------------------------------------------------

    fn set_privacy_mode(&self, on: bool) -> Result<(), BridgeError>;
    fn show_top_bar(&self) -> Result<(), BridgeError>;
    fn hide_top_bar(&self) -> Result<(), BridgeError>;
    fn show_app_list(&self) -> Result<(), BridgeError>;
    fn toggle_navigation_billboard(&self, hide: bool) -> Result<(), BridgeError>;
    /// Register `activity` as the robot's kiosk app.
    fn on_start(&self, activity: &ActivityInfo) -> Result<(), BridgeError>;

    // -- speech -------------------------------------------------------------

    fn speak(&self, request: TtsRequest) -> Result<(), BridgeError>;
    fn finish_conversation(&self) -> Result<(), BridgeError>;
    fn wakeup(&self) -> Result<(), BridgeError>;
    fn toggle_wakeup(&self, disable: bool) -> Result<(), BridgeError>;

    // -- navigation & motion ------------------------------------------------

    fn go_to(&self, location: &str) -> Result<(), BridgeError>;
    /// Persist the current pose under `name`.  Returns the SDK's verdict.
    fn save_location(&self, name: &str) -> Result<bool, BridgeError>;
    fn delete_location(&self, name: &str) -> Result<bool, BridgeError>;
    fn be_with_me(&self) -> Result<(), BridgeError>;
    fn constraint_be_with(&self) -> Result<(), BridgeError>;
    fn stop_movement(&self) -> Result<(), BridgeError>;
    /// Direct differential-drive command; both axes in `[-1, 1]`.
    fn skid_joy(&self, x: f32, y: f32) -> Result<(), BridgeError>;
    fn tilt_angle(&self, degrees: i32) -> Result<(), BridgeError>;
    fn tilt_by(&self, degrees: i32) -> Result<(), BridgeError>;
    fn turn_by(&self, degrees: i32) -> Result<(), BridgeError>;
    fn repose(&self) -> Result<(), BridgeError>;

    // -- telepresence -------------------------------------------------------

    /// Begin a call and return its session handle immediately.
    fn start_telepresence(&self, display_name: &str, peer_id: &str) -> Result<String, BridgeError>;

    // -- listeners ----------------------------------------------------------

    fn add_listener(
        &self,
        source: EventSourceId,
        listener: Arc<dyn RobotListener>,
    ) -> Result<ListenerId, BridgeError>;

    fn remove_listener(&self, source: EventSourceId, id: ListenerId) -> Result<(), BridgeError>;
}

/// Resolves package metadata for a host activity.
pub trait PackageResolver: Send + Sync {
    fn activity_info(&self, activity: &ActivityRef) -> Result<ActivityInfo, BridgeError>;
}
