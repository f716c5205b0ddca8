//! `temi-types` – shared vocabulary of the bridge.
//!
//! - [`value`] – the loosely-typed [`Value`] carried by the transport.
//! - [`records`] – native SDK records and their wire-map conversions.
//! - [`events`] – the [`EventSourceId`] catalogue, native [`RobotEvent`]s and
//!   the outbound [`BridgeEvent`] envelope.
//!
//! The crate root holds the error taxonomy ([`BridgeError`]) and the
//! command [`Reply`].

pub mod events;
pub mod records;
pub mod value;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use events::{BridgeEvent, EventSourceId, RobotEvent};
pub use records::{
    ActivityInfo, ActivityRef, BatteryData, CallDetail, GoToStatus, NlpResult, TtsRequest,
    TtsStatus, UserInfo, WakeupWord, WireRecord,
};
pub use value::Value;

/// Every failure the bridge can report.  None of them is fatal to the bridge
/// process; they are all turned into reply-level failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    /// The command name is not in the vocabulary.
    #[error("Not Implemented: {0}")]
    Unrecognized(String),

    #[error("Invalid Argument `{field}`: {details}")]
    InvalidArgument { field: String, details: String },

    /// The native SDK rejected or failed the operation.
    #[error("Capability Failure in {operation}: {details}")]
    CapabilityFailure { operation: String, details: String },

    #[error("Precondition Unmet: {0}")]
    PreconditionUnmet(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl BridgeError {
    pub fn invalid_argument(field: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::InvalidArgument {
            field: field.into(),
            details: details.into(),
        }
    }

    pub fn capability(operation: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::CapabilityFailure {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Stable machine-readable code sent to transport clients.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Unrecognized(_) => "Unrecognized",
            BridgeError::InvalidArgument { .. } => "InvalidArgument",
            BridgeError::CapabilityFailure { .. } => "CapabilityFailure",
            BridgeError::PreconditionUnmet(_) => "PreconditionUnmet",
            BridgeError::Channel(_) => "Channel",
            BridgeError::Serialization(_) => "Serialization",
        }
    }
}

/// Outcome of one dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Value),
    Failure(BridgeError),
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    /// `true` for the non-fatal "command not in vocabulary" signal.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Reply::Failure(BridgeError::Unrecognized(_)))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Reply::Success(v) => Some(v),
            Reply::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            Reply::Success(_) => None,
            Reply::Failure(e) => Some(e),
        }
    }
}

impl From<Result<Value, BridgeError>> for Reply {
    fn from(result: Result<Value, BridgeError>) -> Self {
        match result {
            Ok(v) => Reply::Success(v),
            Err(e) => Reply::Failure(e),
        }
    }
}
