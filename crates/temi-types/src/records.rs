//! Native SDK records and their flat wire-map conversions.
//!
//! The key names produced by [`WireRecord::to_map`] are part of the wire
//! contract with client applications and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// A record that crosses the transport as a flat string-keyed map.
pub trait WireRecord {
    /// Every key [`to_map`][Self::to_map] emits, including nullable ones.
    const KEYS: &'static [&'static str];

    fn to_map(&self) -> BTreeMap<String, Value>;

    fn to_value(&self) -> Value {
        Value::Map(self.to_map())
    }
}

fn map_of<const N: usize>(entries: [(&str, Value); N]) -> BTreeMap<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Battery
// ─────────────────────────────────────────────────────────────────────────────

/// Battery snapshot reported by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryData {
    /// Charge level in percent.  Values outside `0..=100` are malformed.
    pub percentage: i32,
    pub is_charging: bool,
}

impl BatteryData {
    pub fn new(percentage: i32, is_charging: bool) -> Self {
        Self {
            percentage,
            is_charging,
        }
    }

    pub fn is_valid(&self) -> bool {
        (0..=100).contains(&self.percentage)
    }
}

impl WireRecord for BatteryData {
    const KEYS: &'static [&'static str] = &["batteryPercentage", "isCharging"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        map_of([
            ("batteryPercentage", Value::from(self.percentage)),
            ("isCharging", Value::from(self.is_charging)),
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Contacts
// ─────────────────────────────────────────────────────────────────────────────

/// A contact (or the robot's admin) as stored by the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub name: String,
    pub pic_url: Option<String>,
    pub role: i32,
}

impl WireRecord for UserInfo {
    const KEYS: &'static [&'static str] = &["userId", "name", "picUrl", "role"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        map_of([
            ("userId", Value::from(self.user_id.as_str())),
            ("name", Value::from(self.name.as_str())),
            ("picUrl", Value::from(self.pic_url.clone())),
            ("role", Value::from(self.role)),
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call log
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the robot's recent-calls list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDetail {
    pub call_type: i32,
    pub session_id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub user_id: String,
}

impl WireRecord for CallDetail {
    const KEYS: &'static [&'static str] = &["callType", "sessionId", "timestamp", "userId"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        map_of([
            ("callType", Value::from(self.call_type)),
            ("sessionId", Value::from(self.session_id.as_str())),
            ("timestamp", Value::from(self.timestamp)),
            ("userId", Value::from(self.user_id.as_str())),
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Speech
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a queued utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TtsStatus {
    Pending,
    Processing,
    Started,
    Completed,
    Error,
    NotAllowed,
}

impl TtsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TtsStatus::Pending => "PENDING",
            TtsStatus::Processing => "PROCESSING",
            TtsStatus::Started => "STARTED",
            TtsStatus::Completed => "COMPLETED",
            TtsStatus::Error => "ERROR",
            TtsStatus::NotAllowed => "NOT_ALLOWED",
        }
    }
}

/// A text-to-speech request and, in status callbacks, its progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub id: Uuid,
    pub speech: String,
    pub status: TtsStatus,
    /// Shown on the conversation layer, where the user may interrupt it.
    pub interruptible: bool,
}

impl TtsRequest {
    pub fn new(speech: impl Into<String>, interruptible: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            speech: speech.into(),
            status: TtsStatus::Pending,
            interruptible,
        }
    }

    /// Same request with a new status, as reported by a status callback.
    pub fn with_status(&self, status: TtsStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

impl WireRecord for TtsRequest {
    const KEYS: &'static [&'static str] = &["id", "speech", "status", "isShowOnConversationLayer"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        map_of([
            ("id", Value::from(self.id.to_string())),
            ("speech", Value::from(self.speech.as_str())),
            ("status", Value::from(self.status.as_str())),
            ("isShowOnConversationLayer", Value::from(self.interruptible)),
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Navigation / NLP / wake word
// ─────────────────────────────────────────────────────────────────────────────

/// Progress report for a `goTo` navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoToStatus {
    pub location: String,
    /// `start`, `calculating`, `going`, `complete`, `abort`, `reposing`.
    pub status: String,
    pub description_id: i32,
    pub description: String,
}

impl WireRecord for GoToStatus {
    const KEYS: &'static [&'static str] = &["location", "status", "descriptionId", "description"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        map_of([
            ("location", Value::from(self.location.as_str())),
            ("status", Value::from(self.status.as_str())),
            ("descriptionId", Value::from(self.description_id)),
            ("description", Value::from(self.description.as_str())),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlpResult {
    pub action: String,
    pub params: BTreeMap<String, String>,
    pub resolved_query: String,
}

impl WireRecord for NlpResult {
    const KEYS: &'static [&'static str] = &["action", "params", "resolvedQuery"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        let params = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect::<BTreeMap<_, _>>();
        map_of([
            ("action", Value::from(self.action.as_str())),
            ("params", Value::Map(params)),
            ("resolvedQuery", Value::from(self.resolved_query.as_str())),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeupWord {
    pub wakeup_word: String,
    /// Direction of the speaker in degrees relative to the robot's heading.
    pub direction: i32,
}

impl WireRecord for WakeupWord {
    const KEYS: &'static [&'static str] = &["wakeupWord", "direction"];

    fn to_map(&self) -> BTreeMap<String, Value> {
        map_of([
            ("wakeupWord", Value::from(self.wakeup_word.as_str())),
            ("direction", Value::from(self.direction)),
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host activity
// ─────────────────────────────────────────────────────────────────────────────

/// Reference to the host's current foreground activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityRef {
    pub package_name: String,
    pub class_name: String,
}

impl ActivityRef {
    pub fn new(package_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            class_name: class_name.into(),
        }
    }
}

/// Package metadata resolved for an [`ActivityRef`], handed to the SDK when
/// the host app takes over as the robot's kiosk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub activity: ActivityRef,
    pub meta_data: BTreeMap<String, String>,
}
