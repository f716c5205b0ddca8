//! The fixed catalogue of native event sources and the events they emit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::records::{BatteryData, GoToStatus, NlpResult, TtsRequest, WakeupWord, WireRecord};
use crate::value::Value;
use crate::BridgeError;

/// Identifier of one native event source.  Each source has exactly one
/// outbound transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSourceId {
    BeWithMeStatus,
    GoToLocationStatus,
    LocationsUpdated,
    NlpResult,
    TtsStatus,
    AsrResult,
    WakeupWord,
    ConstraintBeWith,
    PrivacyModeChanged,
    BatteryStatusChanged,
    DetectionStateChanged,
    RobotReady,
}

impl EventSourceId {
    /// Every source in the catalogue, in channel registration order.
    pub const ALL: [EventSourceId; 12] = [
        EventSourceId::BeWithMeStatus,
        EventSourceId::GoToLocationStatus,
        EventSourceId::LocationsUpdated,
        EventSourceId::NlpResult,
        EventSourceId::TtsStatus,
        EventSourceId::AsrResult,
        EventSourceId::WakeupWord,
        EventSourceId::ConstraintBeWith,
        EventSourceId::PrivacyModeChanged,
        EventSourceId::BatteryStatusChanged,
        EventSourceId::DetectionStateChanged,
        EventSourceId::RobotReady,
    ];

    /// Name of the outbound transport channel for this source.
    pub fn channel_name(self) -> &'static str {
        match self {
            EventSourceId::BeWithMeStatus => "temi/be_with_me_status_stream",
            EventSourceId::GoToLocationStatus => "temi/go_to_location_status_stream",
            EventSourceId::LocationsUpdated => "temi/locations_updated_stream",
            EventSourceId::NlpResult => "temi/nlp_stream",
            EventSourceId::TtsStatus => "temi/tts_status_stream",
            EventSourceId::AsrResult => "temi/asr_stream",
            EventSourceId::WakeupWord => "temi/wakeup_word_stream",
            EventSourceId::ConstraintBeWith => "temi/constraint_be_with_stream",
            EventSourceId::PrivacyModeChanged => "temi/privacy_mode_changed_stream",
            EventSourceId::BatteryStatusChanged => "temi/battery_status_changed_stream",
            EventSourceId::DetectionStateChanged => "temi/detection_state_changed_stream",
            EventSourceId::RobotReady => "temi/robot_ready_stream",
        }
    }

    /// Reverse of [`channel_name`][Self::channel_name].
    pub fn from_channel_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.channel_name() == name)
    }
}

impl fmt::Display for EventSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel_name())
    }
}

/// A callback fired by the native SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RobotEvent {
    BeWithMeStatus(String),
    GoToLocationStatus(GoToStatus),
    LocationsUpdated(Vec<String>),
    Nlp(NlpResult),
    TtsStatus(TtsRequest),
    Asr(String),
    WakeupWord(WakeupWord),
    ConstraintBeWith(bool),
    PrivacyModeChanged(bool),
    BatteryStatusChanged(BatteryData),
    DetectionStateChanged(i32),
    RobotReady(bool),
}

impl RobotEvent {
    /// The source this event belongs to.
    pub fn source(&self) -> EventSourceId {
        match self {
            RobotEvent::BeWithMeStatus(_) => EventSourceId::BeWithMeStatus,
            RobotEvent::GoToLocationStatus(_) => EventSourceId::GoToLocationStatus,
            RobotEvent::LocationsUpdated(_) => EventSourceId::LocationsUpdated,
            RobotEvent::Nlp(_) => EventSourceId::NlpResult,
            RobotEvent::TtsStatus(_) => EventSourceId::TtsStatus,
            RobotEvent::Asr(_) => EventSourceId::AsrResult,
            RobotEvent::WakeupWord(_) => EventSourceId::WakeupWord,
            RobotEvent::ConstraintBeWith(_) => EventSourceId::ConstraintBeWith,
            RobotEvent::PrivacyModeChanged(_) => EventSourceId::PrivacyModeChanged,
            RobotEvent::BatteryStatusChanged(_) => EventSourceId::BatteryStatusChanged,
            RobotEvent::DetectionStateChanged(_) => EventSourceId::DetectionStateChanged,
            RobotEvent::RobotReady(_) => EventSourceId::RobotReady,
        }
    }

    /// Translate the event into its transport payload.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] when the native payload is
    /// malformed (currently: a battery level outside `0..=100`).
    pub fn to_payload(&self) -> Result<Value, BridgeError> {
        let value = match self {
            RobotEvent::BeWithMeStatus(status) => Value::from(status.as_str()),
            RobotEvent::GoToLocationStatus(status) => status.to_value(),
            RobotEvent::LocationsUpdated(locations) => Value::from(locations.clone()),
            RobotEvent::Nlp(result) => result.to_value(),
            RobotEvent::TtsStatus(request) => request.to_value(),
            RobotEvent::Asr(text) => Value::from(text.as_str()),
            RobotEvent::WakeupWord(word) => word.to_value(),
            RobotEvent::ConstraintBeWith(on) => Value::from(*on),
            RobotEvent::PrivacyModeChanged(on) => Value::from(*on),
            RobotEvent::BatteryStatusChanged(battery) => {
                if !battery.is_valid() {
                    return Err(BridgeError::Serialization(format!(
                        "battery percentage {} out of range",
                        battery.percentage
                    )));
                }
                battery.to_value()
            }
            RobotEvent::DetectionStateChanged(state) => Value::from(*state),
            RobotEvent::RobotReady(ready) => Value::from(*ready),
        };
        Ok(value)
    }
}

/// Outbound envelope for one delivered native callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: EventSourceId,
    pub payload: Value,
}

impl BridgeEvent {
    pub fn new(source: EventSourceId, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source,
            payload,
        }
    }
}
