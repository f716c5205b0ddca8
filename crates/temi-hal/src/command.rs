//! The closed command vocabulary and argument coercion.
//!
//! [`Command::parse`] turns a `(name, Value)` pair received from the
//! transport into a typed [`Command`].  Coercion failures are reported as
//! [`BridgeError::InvalidArgument`] before anything reaches the SDK.
//!
//! Commands that take no argument ignore whatever payload accompanies them.
//! Commands that take one treat an absent (`null`) argument as invalid.

use temi_types::{BridgeError, Value};

/// A recognised command with its typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SerialNumber,
    PrivacyMode,
    SetPrivacyMode(bool),
    BatteryData,
    ShowTopBar,
    HideTopBar,
    Speak { speech: String, interruptible: bool },
    FinishConversation,
    GoTo(String),
    SaveLocation(String),
    GetLocations,
    DeleteLocation(String),
    BeWithMe,
    ConstraintBeWith,
    FollowMe,
    StopMovement,
    SkidJoy { x: f32, y: f32 },
    TiltAngle(i32),
    TurnBy(i32),
    TiltBy(i32),
    StartTelepresence { display_name: String, peer_id: String },
    UserInfo,
    GetContacts,
    GetRecentCalls,
    Wakeup,
    ShowAppList,
    ToggleWakeup { disable: bool },
    ToggleNavigationBillboard { hide: bool },
    KioskMode,
    Repose,
}

impl Command {
    /// Every command name on the wire.  The spelling (including
    /// `temi_finishe_conversation` and `temi_turnKoiskMode`) is part of the
    /// client compatibility contract.
    pub const NAMES: [&'static str; 31] = [
        "temi_serial_number",
        "temi_privacy_mode",
        "temi_set_privacy_mode",
        "temi_battery_data",
        "temi_show_top_bar",
        "temi_hide_top_bar",
        "temi_speak",
        "temi_speak_force",
        "temi_finishe_conversation",
        "temi_goto",
        "temi_save_location",
        "temi_get_locations",
        "temi_delete_location",
        "temi_be_with_me",
        "temi_constraint_be_with",
        "temi_follow_me",
        "temi_stop_movement",
        "temi_skid_joy",
        "temi_tilt_angle",
        "temi_turn_by",
        "temi_tilt_by",
        "temi_start_telepresence",
        "temi_user_info",
        "temi_get_contacts",
        "temi_get_recent_calls",
        "temi_wakeup",
        "temi_showAppList",
        "temi_toggle_wakeup",
        "temi_toggle_navigation_billboard",
        "temi_turnKoiskMode",
        "temi_repose",
    ];

    /// Parse a command received from the transport.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Unrecognized`] – `name` is not in [`Command::NAMES`].
    /// - [`BridgeError::InvalidArgument`] – `args` does not have the shape
    ///   the command requires.
    pub fn parse(name: &str, args: &Value) -> Result<Self, BridgeError> {
        let command = match name {
            "temi_serial_number" => Command::SerialNumber,
            "temi_privacy_mode" => Command::PrivacyMode,
            "temi_set_privacy_mode" => Command::SetPrivacyMode(bool_arg(name, args)?),
            "temi_battery_data" => Command::BatteryData,
            "temi_show_top_bar" => Command::ShowTopBar,
            "temi_hide_top_bar" => Command::HideTopBar,
            "temi_speak" => Command::Speak {
                speech: string_arg(name, args)?,
                interruptible: true,
            },
            "temi_speak_force" => Command::Speak {
                speech: string_arg(name, args)?,
                interruptible: false,
            },
            "temi_finishe_conversation" => Command::FinishConversation,
            "temi_goto" => Command::GoTo(location_arg(name, args)?),
            "temi_save_location" => Command::SaveLocation(location_arg(name, args)?),
            "temi_get_locations" => Command::GetLocations,
            "temi_delete_location" => Command::DeleteLocation(location_arg(name, args)?),
            "temi_be_with_me" => Command::BeWithMe,
            "temi_constraint_be_with" => Command::ConstraintBeWith,
            "temi_follow_me" => Command::FollowMe,
            "temi_stop_movement" => Command::StopMovement,
            "temi_skid_joy" => {
                let (x, y) = joystick_args(name, args)?;
                Command::SkidJoy { x, y }
            }
            "temi_tilt_angle" => Command::TiltAngle(int_arg(name, args)?),
            "temi_turn_by" => Command::TurnBy(int_arg(name, args)?),
            "temi_tilt_by" => Command::TiltBy(int_arg(name, args)?),
            "temi_start_telepresence" => {
                let (display_name, peer_id) = string_pair(name, args)?;
                Command::StartTelepresence {
                    display_name,
                    peer_id,
                }
            }
            "temi_user_info" => Command::UserInfo,
            "temi_get_contacts" => Command::GetContacts,
            "temi_get_recent_calls" => Command::GetRecentCalls,
            "temi_wakeup" => Command::Wakeup,
            "temi_showAppList" => Command::ShowAppList,
            "temi_toggle_wakeup" => Command::ToggleWakeup {
                disable: bool_arg(name, args)?,
            },
            "temi_toggle_navigation_billboard" => Command::ToggleNavigationBillboard {
                hide: bool_arg(name, args)?,
            },
            "temi_turnKoiskMode" => Command::KioskMode,
            "temi_repose" => Command::Repose,
            other => return Err(BridgeError::Unrecognized(other.to_string())),
        };
        Ok(command)
    }

    /// Wire name of this command.  `Speak` maps to `temi_speak` or
    /// `temi_speak_force` depending on its flag.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SerialNumber => "temi_serial_number",
            Command::PrivacyMode => "temi_privacy_mode",
            Command::SetPrivacyMode(_) => "temi_set_privacy_mode",
            Command::BatteryData => "temi_battery_data",
            Command::ShowTopBar => "temi_show_top_bar",
            Command::HideTopBar => "temi_hide_top_bar",
            Command::Speak {
                interruptible: true,
                ..
            } => "temi_speak",
            Command::Speak {
                interruptible: false,
                ..
            } => "temi_speak_force",
            Command::FinishConversation => "temi_finishe_conversation",
            Command::GoTo(_) => "temi_goto",
            Command::SaveLocation(_) => "temi_save_location",
            Command::GetLocations => "temi_get_locations",
            Command::DeleteLocation(_) => "temi_delete_location",
            Command::BeWithMe => "temi_be_with_me",
            Command::ConstraintBeWith => "temi_constraint_be_with",
            Command::FollowMe => "temi_follow_me",
            Command::StopMovement => "temi_stop_movement",
            Command::SkidJoy { .. } => "temi_skid_joy",
            Command::TiltAngle(_) => "temi_tilt_angle",
            Command::TurnBy(_) => "temi_turn_by",
            Command::TiltBy(_) => "temi_tilt_by",
            Command::StartTelepresence { .. } => "temi_start_telepresence",
            Command::UserInfo => "temi_user_info",
            Command::GetContacts => "temi_get_contacts",
            Command::GetRecentCalls => "temi_get_recent_calls",
            Command::Wakeup => "temi_wakeup",
            Command::ShowAppList => "temi_showAppList",
            Command::ToggleWakeup { .. } => "temi_toggle_wakeup",
            Command::ToggleNavigationBillboard { .. } => "temi_toggle_navigation_billboard",
            Command::KioskMode => "temi_turnKoiskMode",
            Command::Repose => "temi_repose",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coercion helpers
// ─────────────────────────────────────────────────────────────────────────────

fn invalid(command: &str, field: &str, details: impl std::fmt::Display) -> BridgeError {
    BridgeError::invalid_argument(field, format!("{command}: {details}"))
}

fn required<'a>(command: &str, args: &'a Value) -> Result<&'a Value, BridgeError> {
    if args.is_null() {
        Err(invalid(command, "args", "missing required argument"))
    } else {
        Ok(args)
    }
}

fn bool_arg(command: &str, args: &Value) -> Result<bool, BridgeError> {
    let v = required(command, args)?;
    v.as_bool()
        .ok_or_else(|| invalid(command, "args", format!("expected bool, got {}", v.kind())))
}

fn string_arg(command: &str, args: &Value) -> Result<String, BridgeError> {
    let v = required(command, args)?;
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(command, "args", format!("expected string, got {}", v.kind())))
}

fn location_arg(command: &str, args: &Value) -> Result<String, BridgeError> {
    let location = string_arg(command, args)?;
    if location.trim().is_empty() {
        return Err(invalid(command, "args", "location name must not be empty"));
    }
    Ok(location)
}

fn int_arg(command: &str, args: &Value) -> Result<i32, BridgeError> {
    let v = required(command, args)?;
    let raw = v
        .as_i64()
        .ok_or_else(|| invalid(command, "args", format!("expected int, got {}", v.kind())))?;
    i32::try_from(raw).map_err(|_| invalid(command, "args", format!("{raw} does not fit in 32 bits")))
}

fn pair<'a>(command: &str, args: &'a Value) -> Result<(&'a Value, &'a Value), BridgeError> {
    let v = required(command, args)?;
    match v.as_list() {
        Some([a, b]) => Ok((a, b)),
        Some(items) => Err(invalid(
            command,
            "args",
            format!("expected 2 elements, got {}", items.len()),
        )),
        None => Err(invalid(command, "args", format!("expected list, got {}", v.kind()))),
    }
}

fn joystick_args(command: &str, args: &Value) -> Result<(f32, f32), BridgeError> {
    let (a, b) = pair(command, args)?;
    let axis = |index: usize, v: &Value| -> Result<f32, BridgeError> {
        let field = format!("args[{index}]");
        let n = v
            .as_f64()
            .ok_or_else(|| invalid(command, &field, format!("expected number, got {}", v.kind())))?;
        if !n.is_finite() || !(-1.0..=1.0).contains(&n) {
            return Err(invalid(command, &field, format!("{n} is outside [-1, 1]")));
        }
        Ok(n as f32)
    };
    Ok((axis(0, a)?, axis(1, b)?))
}

fn string_pair(command: &str, args: &Value) -> Result<(String, String), BridgeError> {
    let (a, b) = pair(command, args)?;
    let text = |index: usize, v: &Value| -> Result<String, BridgeError> {
        v.as_str().map(str::to_string).ok_or_else(|| {
            invalid(
                command,
                &format!("args[{index}]"),
                format!("expected string, got {}", v.kind()),
            )
        })
    };
    Ok((text(0, a)?, text(1, b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: BridgeError) -> String {
        match err {
            BridgeError::InvalidArgument { field, .. } => field,
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn every_name_parses_back_to_itself() {
        let sample = |name: &str| -> Value {
            match name {
                "temi_set_privacy_mode" | "temi_toggle_wakeup" | "temi_toggle_navigation_billboard" => {
                    Value::Bool(true)
                }
                "temi_speak" | "temi_speak_force" | "temi_goto" | "temi_save_location"
                | "temi_delete_location" => Value::from("kitchen"),
                "temi_skid_joy" => Value::from(vec![0.5, -0.5]),
                "temi_tilt_angle" | "temi_turn_by" | "temi_tilt_by" => Value::Int(10),
                "temi_start_telepresence" => Value::from(vec!["Ada", "peer-1"]),
                _ => Value::Null,
            }
        };
        for name in Command::NAMES {
            let command = Command::parse(name, &sample(name))
                .unwrap_or_else(|e| panic!("{name} failed to parse: {e}"));
            assert_eq!(command.name(), name);
        }
    }

    #[test]
    fn unknown_name_is_unrecognized_for_any_payload() {
        for args in [Value::Null, Value::Bool(true), Value::from(vec![1, 2]), Value::from("x")] {
            let err = Command::parse("temi_fly", &args).unwrap_err();
            assert_eq!(err, BridgeError::Unrecognized("temi_fly".into()));
        }
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!(matches!(
            Command::parse("temi_showapplist", &Value::Null),
            Err(BridgeError::Unrecognized(_))
        ));
    }

    #[test]
    fn missing_argument_is_invalid() {
        for name in ["temi_set_privacy_mode", "temi_speak", "temi_goto", "temi_toggle_wakeup"] {
            let err = Command::parse(name, &Value::Null).unwrap_err();
            assert_eq!(field_of(err), "args");
        }
    }

    #[test]
    fn no_argument_commands_ignore_payload() {
        assert_eq!(
            Command::parse("temi_privacy_mode", &Value::from("junk")).unwrap(),
            Command::PrivacyMode
        );
    }

    #[test]
    fn speak_flags_interruptibility() {
        assert_eq!(
            Command::parse("temi_speak_force", &Value::from("hi")).unwrap(),
            Command::Speak {
                speech: "hi".into(),
                interruptible: false
            }
        );
    }

    #[test]
    fn skid_joy_accepts_ints_and_rejects_out_of_range() {
        assert_eq!(
            Command::parse("temi_skid_joy", &Value::from(vec![Value::Int(1), Value::Double(-0.25)]))
                .unwrap(),
            Command::SkidJoy { x: 1.0, y: -0.25 }
        );

        let err = Command::parse("temi_skid_joy", &Value::from(vec![0.0, 1.5])).unwrap_err();
        assert_eq!(field_of(err), "args[1]");

        let err = Command::parse("temi_skid_joy", &Value::from(vec![Value::from("a"), Value::Int(0)]))
            .unwrap_err();
        assert_eq!(field_of(err), "args[0]");
    }

    #[test]
    fn skid_joy_wrong_arity() {
        let err = Command::parse("temi_skid_joy", &Value::from(vec![0.1])).unwrap_err();
        assert!(err.to_string().contains("expected 2 elements"));
    }

    #[test]
    fn int_commands_reject_doubles_and_overflow() {
        assert!(Command::parse("temi_turn_by", &Value::Double(1.5)).is_err());
        assert!(Command::parse("temi_tilt_by", &Value::Int(i64::from(i32::MAX) + 1)).is_err());
        assert_eq!(
            Command::parse("temi_turn_by", &Value::Int(-90)).unwrap(),
            Command::TurnBy(-90)
        );
    }

    #[test]
    fn telepresence_requires_two_strings() {
        let err = Command::parse("temi_start_telepresence", &Value::from(vec![Value::from("Ada"), Value::Int(3)]))
            .unwrap_err();
        assert_eq!(field_of(err), "args[1]");
    }

    #[test]
    fn empty_location_is_invalid() {
        assert!(Command::parse("temi_goto", &Value::from("   ")).is_err());
    }
}
