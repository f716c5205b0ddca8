//! `temi-hal` – the robot side of the bridge.
//!
//! # Modules
//!
//! - [`robot`] – [`RobotSdk`][robot::RobotSdk]: the capability surface the
//!   bridge drives, plus the [`RobotListener`][robot::RobotListener] callback
//!   trait and the [`PackageResolver`][robot::PackageResolver] used for kiosk
//!   mode.
//! - [`command`] – [`Command`][command::Command]: the closed command
//!   vocabulary and the coercion of loosely-typed arguments into it.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   executes commands against a `RobotSdk` and produces replies.
//! - [`host`] – [`HostContext`][host::HostContext]: the host's current
//!   foreground activity.
//! - [`sim`] – [`SimRobot`][sim::SimRobot]: an in-memory robot for tests and
//!   headless runs.

pub mod command;
pub mod dispatcher;
pub mod host;
pub mod robot;
pub mod sim;

pub use command::Command;
pub use dispatcher::CommandDispatcher;
pub use host::HostContext;
pub use robot::{ListenerId, PackageResolver, RobotListener, RobotSdk};
pub use sim::SimRobot;
