//! In-process robot simulator for tests and headless runs.
//!
//! [`SimRobot`] implements [`RobotSdk`] and [`PackageResolver`] entirely in
//! memory.  It records every capability call it receives, emits the native
//! callbacks a real robot would (privacy-mode changes, navigation progress,
//! speech status, ...) and exposes [`SimRobot::emit`] so tests can fire
//! arbitrary callbacks as if from a native thread.
//!
//! # Example
//!
//! ```rust
//! use temi_hal::robot::RobotSdk;
//! use temi_hal::sim::SimRobot;
//!
//! let robot = SimRobot::new("00119260058").with_locations(["home base", "kitchen"]);
//! robot.go_to("kitchen").expect("known location");
//! assert!(robot.go_to("attic").is_err());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use temi_types::{
    ActivityInfo, ActivityRef, BatteryData, BridgeError, CallDetail, EventSourceId, GoToStatus,
    RobotEvent, TtsRequest, TtsStatus, UserInfo,
};
use uuid::Uuid;

use crate::robot::{ListenerId, PackageResolver, RobotListener, RobotSdk};

/// Metadata key a kiosk app declares in its manifest.
pub const KIOSK_METADATA_KEY: &str = "com.robotemi.sdk.metadata.KIOSK";

// ─────────────────────────────────────────────────────────────────────────────
// Observable state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimState {
    serial: String,
    privacy_mode: bool,
    battery: Option<BatteryData>,
    locations: Vec<String>,
    admin: Option<UserInfo>,
    contacts: Vec<UserInfo>,
    recent_calls: Vec<CallDetail>,
    top_bar_visible: bool,
    billboard_hidden: bool,
    wakeup_disabled: bool,
    head_tilt: i32,
    heading: i32,
    joystick: (f32, f32),
    spoken: Vec<TtsRequest>,
    kiosk: Option<ActivityInfo>,
    operations: Vec<&'static str>,
}

type ListenerTable = HashMap<EventSourceId, Vec<(ListenerId, Arc<dyn RobotListener>)>>;

/// In-memory [`RobotSdk`].
pub struct SimRobot {
    state: Mutex<SimState>,
    listeners: Mutex<ListenerTable>,
    peak_listeners: Mutex<HashMap<EventSourceId, usize>>,
    next_listener: AtomicU64,
}

impl SimRobot {
    /// A robot with the given serial number, no battery report yet, no saved
    /// locations and no contacts.
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SimState {
                serial: serial.into(),
                top_bar_visible: true,
                ..SimState::default()
            }),
            listeners: Mutex::new(HashMap::new()),
            peak_listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// A populated robot used by the `temi-bridge` binary.
    pub fn demo() -> Self {
        let admin = UserInfo {
            user_id: "admin-0001".into(),
            name: "Operator".into(),
            pic_url: None,
            role: 0,
        };
        Self::new("00119260058")
            .with_battery(BatteryData::new(87, false))
            .with_locations(["home base", "kitchen", "reception"])
            .with_admin(admin.clone())
            .with_contacts(vec![
                admin,
                UserInfo {
                    user_id: "member-0042".into(),
                    name: "Grace".into(),
                    pic_url: Some("https://example.invalid/grace.png".into()),
                    role: 1,
                },
            ])
            .with_recent_calls(vec![CallDetail {
                call_type: 1,
                session_id: "session-0001".into(),
                timestamp: chrono::Utc::now().timestamp_millis(),
                user_id: "member-0042".into(),
            }])
    }

    pub fn with_battery(self, battery: BatteryData) -> Self {
        self.state.lock().battery = Some(battery);
        self
    }

    pub fn with_locations<I, S>(self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_admin(self, admin: UserInfo) -> Self {
        self.state.lock().admin = Some(admin);
        self
    }

    pub fn with_contacts(self, contacts: Vec<UserInfo>) -> Self {
        self.state.lock().contacts = contacts;
        self
    }

    pub fn with_recent_calls(self, calls: Vec<CallDetail>) -> Self {
        self.state.lock().recent_calls = calls;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Test hooks
    // ─────────────────────────────────────────────────────────────────────────

    /// Fire `event` at every listener registered for its source, as the
    /// native SDK would from one of its threads.  Returns how many listeners
    /// were invoked.
    pub fn emit(&self, event: RobotEvent) -> usize {
        self.emit_as(event.source(), event)
    }

    /// Fire `event` at the listeners of `source`, even if the event belongs
    /// to a different source.  Models a misbehaving native binding.
    pub fn emit_as(&self, source: EventSourceId, event: RobotEvent) -> usize {
        let targets = self.snapshot(source);
        for listener in &targets {
            listener.on_event(event.clone());
        }
        targets.len()
    }

    /// Report an unrecoverable disconnect to every listener of `source`.
    pub fn disconnect(&self, source: EventSourceId, reason: &str) -> usize {
        let targets = self.snapshot(source);
        for listener in &targets {
            listener.on_disconnect(reason);
        }
        targets.len()
    }

    /// Number of listeners currently registered for `source`.
    pub fn listener_count(&self, source: EventSourceId) -> usize {
        self.listeners.lock().get(&source).map_or(0, Vec::len)
    }

    /// Total listeners registered across every source.
    pub fn total_listener_count(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Highest number of simultaneously registered listeners ever observed
    /// for `source`.
    pub fn peak_listener_count(&self, source: EventSourceId) -> usize {
        self.peak_listeners.lock().get(&source).copied().unwrap_or(0)
    }

    /// Names of every capability operation invoked so far, in call order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.state.lock().operations.clone()
    }

    pub fn spoken(&self) -> Vec<TtsRequest> {
        self.state.lock().spoken.clone()
    }

    pub fn kiosk_activity(&self) -> Option<ActivityInfo> {
        self.state.lock().kiosk.clone()
    }

    pub fn joystick(&self) -> (f32, f32) {
        self.state.lock().joystick
    }

    pub fn head_tilt(&self) -> i32 {
        self.state.lock().head_tilt
    }

    pub fn heading(&self) -> i32 {
        self.state.lock().heading
    }

    pub fn is_top_bar_visible(&self) -> bool {
        self.state.lock().top_bar_visible
    }

    pub fn is_wakeup_disabled(&self) -> bool {
        self.state.lock().wakeup_disabled
    }

    pub fn is_billboard_hidden(&self) -> bool {
        self.state.lock().billboard_hidden
    }

    /// Replace the battery reading and notify battery listeners.
    pub fn set_battery(&self, battery: BatteryData) {
        self.state.lock().battery = Some(battery);
        self.emit(RobotEvent::BatteryStatusChanged(battery));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    // Listeners are cloned out so none is invoked under the registration lock.
    fn snapshot(&self, source: EventSourceId) -> Vec<Arc<dyn RobotListener>> {
        self.listeners
            .lock()
            .get(&source)
            .map(|ls| ls.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    fn record(&self, operation: &'static str) -> parking_lot::MutexGuard<'_, SimState> {
        let mut state = self.state.lock();
        state.operations.push(operation);
        state
    }
}

impl RobotSdk for SimRobot {
    fn serial_number(&self) -> String {
        self.record("serial_number").serial.clone()
    }

    fn privacy_mode(&self) -> bool {
        self.record("privacy_mode").privacy_mode
    }

    fn battery_data(&self) -> Option<BatteryData> {
        self.record("battery_data").battery
    }

    fn locations(&self) -> Vec<String> {
        self.record("locations").locations.clone()
    }

    fn admin_info(&self) -> Option<UserInfo> {
        self.record("admin_info").admin.clone()
    }

    fn all_contacts(&self) -> Vec<UserInfo> {
        self.record("all_contacts").contacts.clone()
    }

    fn recent_calls(&self) -> Vec<CallDetail> {
        self.record("recent_calls").recent_calls.clone()
    }

    fn set_privacy_mode(&self, on: bool) -> Result<(), BridgeError> {
        let changed = {
            let mut state = self.record("set_privacy_mode");
            let changed = state.privacy_mode != on;
            state.privacy_mode = on;
            changed
        };
        if changed {
            self.emit(RobotEvent::PrivacyModeChanged(on));
        }
        Ok(())
    }

    fn show_top_bar(&self) -> Result<(), BridgeError> {
        self.record("show_top_bar").top_bar_visible = true;
        Ok(())
    }

    fn hide_top_bar(&self) -> Result<(), BridgeError> {
        self.record("hide_top_bar").top_bar_visible = false;
        Ok(())
    }

    fn show_app_list(&self) -> Result<(), BridgeError> {
        self.record("show_app_list");
        Ok(())
    }

    fn toggle_navigation_billboard(&self, hide: bool) -> Result<(), BridgeError> {
        self.record("toggle_navigation_billboard").billboard_hidden = hide;
        Ok(())
    }

    fn on_start(&self, activity: &ActivityInfo) -> Result<(), BridgeError> {
        self.record("on_start").kiosk = Some(activity.clone());
        Ok(())
    }

    fn speak(&self, request: TtsRequest) -> Result<(), BridgeError> {
        let privacy = {
            let mut state = self.record("speak");
            state.spoken.push(request.clone());
            state.privacy_mode
        };
        if privacy {
            self.emit(RobotEvent::TtsStatus(request.with_status(TtsStatus::NotAllowed)));
        } else {
            self.emit(RobotEvent::TtsStatus(request.with_status(TtsStatus::Started)));
            self.emit(RobotEvent::TtsStatus(request.with_status(TtsStatus::Completed)));
        }
        Ok(())
    }

    fn finish_conversation(&self) -> Result<(), BridgeError> {
        self.record("finish_conversation");
        Ok(())
    }

    fn wakeup(&self) -> Result<(), BridgeError> {
        self.record("wakeup");
        Ok(())
    }

    fn toggle_wakeup(&self, disable: bool) -> Result<(), BridgeError> {
        self.record("toggle_wakeup").wakeup_disabled = disable;
        Ok(())
    }

    fn go_to(&self, location: &str) -> Result<(), BridgeError> {
        let known = self
            .record("go_to")
            .locations
            .iter()
            .any(|l| l.eq_ignore_ascii_case(location));
        if !known {
            return Err(BridgeError::capability(
                "go_to",
                format!("unknown location '{location}'"),
            ));
        }
        for status in ["start", "going", "complete"] {
            self.emit(RobotEvent::GoToLocationStatus(GoToStatus {
                location: location.to_string(),
                status: status.to_string(),
                description_id: 0,
                description: String::new(),
            }));
        }
        Ok(())
    }

    fn save_location(&self, name: &str) -> Result<bool, BridgeError> {
        let updated = {
            let mut state = self.record("save_location");
            if state.locations.iter().any(|l| l.eq_ignore_ascii_case(name)) {
                None
            } else {
                state.locations.push(name.to_string());
                Some(state.locations.clone())
            }
        };
        match updated {
            Some(locations) => {
                self.emit(RobotEvent::LocationsUpdated(locations));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_location(&self, name: &str) -> Result<bool, BridgeError> {
        let updated = {
            let mut state = self.record("delete_location");
            let before = state.locations.len();
            state.locations.retain(|l| !l.eq_ignore_ascii_case(name));
            (state.locations.len() != before).then(|| state.locations.clone())
        };
        match updated {
            Some(locations) => {
                self.emit(RobotEvent::LocationsUpdated(locations));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn be_with_me(&self) -> Result<(), BridgeError> {
        self.record("be_with_me");
        self.emit(RobotEvent::BeWithMeStatus("search".into()));
        Ok(())
    }

    fn constraint_be_with(&self) -> Result<(), BridgeError> {
        self.record("constraint_be_with");
        self.emit(RobotEvent::ConstraintBeWith(true));
        Ok(())
    }

    fn stop_movement(&self) -> Result<(), BridgeError> {
        self.record("stop_movement").joystick = (0.0, 0.0);
        Ok(())
    }

    fn skid_joy(&self, x: f32, y: f32) -> Result<(), BridgeError> {
        self.record("skid_joy").joystick = (x, y);
        Ok(())
    }

    fn tilt_angle(&self, degrees: i32) -> Result<(), BridgeError> {
        self.record("tilt_angle").head_tilt = degrees;
        Ok(())
    }

    fn tilt_by(&self, degrees: i32) -> Result<(), BridgeError> {
        let mut state = self.record("tilt_by");
        state.head_tilt = state.head_tilt.saturating_add(degrees);
        Ok(())
    }

    fn turn_by(&self, degrees: i32) -> Result<(), BridgeError> {
        let mut state = self.record("turn_by");
        state.heading = (state.heading + degrees % 360).rem_euclid(360);
        Ok(())
    }

    fn repose(&self) -> Result<(), BridgeError> {
        self.record("repose");
        Ok(())
    }

    fn start_telepresence(&self, display_name: &str, peer_id: &str) -> Result<String, BridgeError> {
        self.record("start_telepresence");
        if peer_id.is_empty() {
            return Err(BridgeError::capability(
                "start_telepresence",
                format!("no peer id given for '{display_name}'"),
            ));
        }
        Ok(Uuid::new_v4().to_string())
    }

    fn add_listener(
        &self,
        source: EventSourceId,
        listener: Arc<dyn RobotListener>,
    ) -> Result<ListenerId, BridgeError> {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut table = self.listeners.lock();
            let entries = table.entry(source).or_default();
            entries.push((id, listener));
            entries.len()
        };
        let mut peaks = self.peak_listeners.lock();
        let peak = peaks.entry(source).or_default();
        *peak = (*peak).max(count);
        Ok(id)
    }

    fn remove_listener(&self, source: EventSourceId, id: ListenerId) -> Result<(), BridgeError> {
        let mut table = self.listeners.lock();
        let entries = table.entry(source).or_default();
        let before = entries.len();
        entries.retain(|(lid, _)| *lid != id);
        if entries.len() == before {
            return Err(BridgeError::capability(
                "remove_listener",
                format!("listener {} is not registered for {source}", id.0),
            ));
        }
        Ok(())
    }
}

impl PackageResolver for SimRobot {
    fn activity_info(&self, activity: &ActivityRef) -> Result<ActivityInfo, BridgeError> {
        if activity.package_name.is_empty() {
            return Err(BridgeError::capability(
                "activity_info",
                format!("activity '{}' has no package", activity.class_name),
            ));
        }
        let mut meta_data = BTreeMap::new();
        meta_data.insert(KIOSK_METADATA_KEY.to_string(), "TRUE".to_string());
        Ok(ActivityInfo {
            activity: activity.clone(),
            meta_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<RobotEvent>>,
        disconnects: Mutex<Vec<String>>,
    }

    impl RobotListener for Collector {
        fn on_event(&self, event: RobotEvent) {
            self.events.lock().push(event);
        }
        fn on_disconnect(&self, reason: &str) {
            self.disconnects.lock().push(reason.to_string());
        }
    }

    #[test]
    fn listeners_receive_only_their_source() {
        let robot = SimRobot::new("sn");
        let battery = Arc::new(Collector::default());
        robot
            .add_listener(EventSourceId::BatteryStatusChanged, battery.clone())
            .unwrap();

        assert_eq!(robot.emit(RobotEvent::RobotReady(true)), 0);
        assert_eq!(robot.emit(RobotEvent::BatteryStatusChanged(BatteryData::new(5, true))), 1);
        assert_eq!(battery.events.lock().len(), 1);
    }

    #[test]
    fn remove_unknown_listener_is_capability_failure() {
        let robot = SimRobot::new("sn");
        let result = robot.remove_listener(EventSourceId::AsrResult, ListenerId(99));
        assert!(matches!(result, Err(BridgeError::CapabilityFailure { .. })));
    }

    #[test]
    fn peak_listener_count_tracks_maximum() {
        let robot = SimRobot::new("sn");
        let a = robot
            .add_listener(EventSourceId::AsrResult, Arc::new(Collector::default()))
            .unwrap();
        let _b = robot
            .add_listener(EventSourceId::AsrResult, Arc::new(Collector::default()))
            .unwrap();
        robot.remove_listener(EventSourceId::AsrResult, a).unwrap();
        assert_eq!(robot.listener_count(EventSourceId::AsrResult), 1);
        assert_eq!(robot.peak_listener_count(EventSourceId::AsrResult), 2);
    }

    #[test]
    fn go_to_unknown_location_fails_without_events() {
        let robot = SimRobot::new("sn").with_locations(["kitchen"]);
        let nav = Arc::new(Collector::default());
        robot
            .add_listener(EventSourceId::GoToLocationStatus, nav.clone())
            .unwrap();

        assert!(robot.go_to("attic").is_err());
        assert!(nav.events.lock().is_empty());

        robot.go_to("Kitchen").unwrap();
        assert_eq!(nav.events.lock().len(), 3);
    }

    #[test]
    fn save_and_delete_location_report_changes() {
        let robot = SimRobot::new("sn");
        assert!(robot.save_location("dock").unwrap());
        assert!(!robot.save_location("dock").unwrap());
        assert!(robot.delete_location("dock").unwrap());
        assert!(!robot.delete_location("dock").unwrap());
        assert!(robot.locations().is_empty());
    }

    #[test]
    fn speak_in_privacy_mode_is_not_allowed() {
        let robot = SimRobot::new("sn");
        let tts = Arc::new(Collector::default());
        robot.add_listener(EventSourceId::TtsStatus, tts.clone()).unwrap();

        robot.set_privacy_mode(true).unwrap();
        robot.speak(TtsRequest::new("hello", true)).unwrap();

        let events = tts.events.lock();
        assert!(matches!(
            &events[..],
            [RobotEvent::TtsStatus(r)] if r.status == TtsStatus::NotAllowed
        ));
    }

    #[test]
    fn disconnect_reaches_listeners() {
        let robot = SimRobot::new("sn");
        let c = Arc::new(Collector::default());
        robot.add_listener(EventSourceId::NlpResult, c.clone()).unwrap();
        assert_eq!(robot.disconnect(EventSourceId::NlpResult, "service died"), 1);
        assert_eq!(*c.disconnects.lock(), vec!["service died".to_string()]);
    }

    #[test]
    fn turn_by_wraps_heading() {
        let robot = SimRobot::new("sn");
        robot.turn_by(-90).unwrap();
        assert_eq!(robot.heading(), 270);
        robot.turn_by(450).unwrap();
        assert_eq!(robot.heading(), 0);
    }

    #[test]
    fn resolver_adds_kiosk_metadata() {
        let robot = SimRobot::new("sn");
        let info = robot
            .activity_info(&ActivityRef::new("com.example.kiosk", "MainActivity"))
            .unwrap();
        assert_eq!(info.meta_data.get(KIOSK_METADATA_KEY).map(String::as_str), Some("TRUE"));
    }
}
