//! [`CommandDispatcher`] – turns transport commands into SDK calls.
//!
//! The dispatcher parses a `(name, Value)` pair into a typed
//! [`Command`], invokes the matching [`RobotSdk`] operation exactly once and
//! wraps the outcome in a [`Reply`].  Every failure (unknown name, bad
//! argument, SDK rejection, missing data) becomes a `Reply::Failure`; nothing
//! here panics or tears down the bridge.
//!
//! The dispatcher keeps no mutable state of its own, so it is safe to call
//! while native callbacks are being delivered on other threads.

use std::sync::Arc;

use temi_types::{BridgeError, Reply, TtsRequest, Value, WireRecord};
use tracing::{debug, warn};

use crate::command::Command;
use crate::host::HostContext;
use crate::robot::{PackageResolver, RobotSdk};

/// Maps the closed command vocabulary onto a [`RobotSdk`].
#[derive(Clone)]
pub struct CommandDispatcher {
    robot: Arc<dyn RobotSdk>,
    host: Arc<HostContext>,
    resolver: Arc<dyn PackageResolver>,
}

impl CommandDispatcher {
    pub fn new(
        robot: Arc<dyn RobotSdk>,
        host: Arc<HostContext>,
        resolver: Arc<dyn PackageResolver>,
    ) -> Self {
        Self {
            robot,
            host,
            resolver,
        }
    }

    /// Parse and execute one command.
    pub fn dispatch(&self, name: &str, args: &Value) -> Reply {
        let command = match Command::parse(name, args) {
            Ok(command) => command,
            Err(BridgeError::Unrecognized(name)) => {
                debug!(command = %name, "command not implemented");
                return Reply::Failure(BridgeError::Unrecognized(name));
            }
            Err(e) => {
                warn!(command = name, error = %e, "rejected command arguments");
                return Reply::Failure(e);
            }
        };

        debug!(command = name, "dispatching");
        let result = self.execute(command);
        if let Err(e) = &result {
            warn!(command = name, error = %e, "command failed");
        }
        result.into()
    }

    /// Execute an already-parsed command.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::CapabilityFailure`] – the SDK rejected the operation.
    /// - [`BridgeError::PreconditionUnmet`] – the SDK has no battery report or
    ///   admin yet, or no host activity is attached for kiosk mode.
    pub fn execute(&self, command: Command) -> Result<Value, BridgeError> {
        let robot = self.robot.as_ref();
        match command {
            // ─────────────────────────────────────────────────────────────────
            // Properties
            // ─────────────────────────────────────────────────────────────────
            Command::SerialNumber => Ok(Value::from(robot.serial_number())),
            Command::PrivacyMode => Ok(Value::from(robot.privacy_mode())),
            Command::SetPrivacyMode(on) => {
                robot.set_privacy_mode(on)?;
                Ok(Value::from(robot.privacy_mode()))
            }
            Command::BatteryData => robot
                .battery_data()
                .map(|b| b.to_value())
                .ok_or_else(|| BridgeError::PreconditionUnmet("no battery data reported yet".into())),
            Command::GetLocations => Ok(Value::from(robot.locations())),
            Command::UserInfo => robot
                .admin_info()
                .map(|u| u.to_value())
                .ok_or_else(|| BridgeError::PreconditionUnmet("no admin user paired".into())),
            Command::GetContacts => Ok(Value::List(
                robot.all_contacts().iter().map(WireRecord::to_value).collect(),
            )),
            Command::GetRecentCalls => Ok(Value::List(
                robot.recent_calls().iter().map(WireRecord::to_value).collect(),
            )),

            // ─────────────────────────────────────────────────────────────────
            // System UI
            // ─────────────────────────────────────────────────────────────────
            Command::ShowTopBar => ack(robot.show_top_bar()),
            Command::HideTopBar => ack(robot.hide_top_bar()),
            Command::ShowAppList => ack(robot.show_app_list()),
            Command::ToggleNavigationBillboard { hide } => {
                ack(robot.toggle_navigation_billboard(hide))
            }
            Command::KioskMode => {
                let activity = self.host.current()?;
                let info = self.resolver.activity_info(&activity)?;
                ack(robot.on_start(&info))
            }

            // ─────────────────────────────────────────────────────────────────
            // Speech
            // ─────────────────────────────────────────────────────────────────
            Command::Speak {
                speech,
                interruptible,
            } => ack(robot.speak(TtsRequest::new(speech, interruptible))),
            Command::FinishConversation => ack(robot.finish_conversation()),
            Command::Wakeup => ack(robot.wakeup()),
            Command::ToggleWakeup { disable } => ack(robot.toggle_wakeup(disable)),

            // ─────────────────────────────────────────────────────────────────
            // Navigation & motion
            // ─────────────────────────────────────────────────────────────────
            Command::GoTo(location) => ack(robot.go_to(&location)),
            Command::SaveLocation(name) => robot.save_location(&name).map(Value::from),
            Command::DeleteLocation(name) => robot.delete_location(&name).map(Value::from),
            // Following is the SDK's be-with-me mode under another name.
            Command::BeWithMe | Command::FollowMe => ack(robot.be_with_me()),
            Command::ConstraintBeWith => ack(robot.constraint_be_with()),
            Command::StopMovement => ack(robot.stop_movement()),
            Command::SkidJoy { x, y } => ack(robot.skid_joy(x, y)),
            Command::TiltAngle(degrees) => ack(robot.tilt_angle(degrees)),
            Command::TurnBy(degrees) => ack(robot.turn_by(degrees)),
            Command::TiltBy(degrees) => ack(robot.tilt_by(degrees)),
            Command::Repose => ack(robot.repose()),

            // ─────────────────────────────────────────────────────────────────
            // Telepresence: returns on initiation, not completion.
            // ─────────────────────────────────────────────────────────────────
            Command::StartTelepresence {
                display_name,
                peer_id,
            } => robot
                .start_telepresence(&display_name, &peer_id)
                .map(Value::from),
        }
    }
}

fn ack(result: Result<(), BridgeError>) -> Result<Value, BridgeError> {
    result.map(|()| Value::Bool(true))
}
