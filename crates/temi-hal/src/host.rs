//! [`HostContext`] – the host's current foreground activity.
//!
//! Written only by host lifecycle transitions, read by the kiosk-mode command.

use parking_lot::RwLock;
use temi_types::{ActivityRef, BridgeError};
use tracing::info;

#[derive(Debug, Default)]
pub struct HostContext {
    current: RwLock<Option<ActivityRef>>,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// First attach, or reattach after a configuration change.
    pub fn attach(&self, activity: ActivityRef) {
        info!(package = %activity.package_name, class = %activity.class_name, "host activity attached");
        *self.current.write() = Some(activity);
    }

    /// Final detach.  Subsequent reads fail until the next attach.
    pub fn detach(&self) {
        if self.current.write().take().is_some() {
            info!("host activity detached");
        }
    }

    /// The current foreground activity.
    ///
    /// # Errors
    ///
    /// [`BridgeError::PreconditionUnmet`] when no activity is attached.
    pub fn current(&self) -> Result<ActivityRef, BridgeError> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| BridgeError::PreconditionUnmet("no foreground activity attached".into()))
    }

    pub fn is_attached(&self) -> bool {
        self.current.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_before_attach_is_precondition_unmet() {
        let host = HostContext::new();
        assert!(matches!(host.current(), Err(BridgeError::PreconditionUnmet(_))));
        assert!(!host.is_attached());
    }

    #[test]
    fn reattach_replaces_and_detach_clears() {
        let host = HostContext::new();
        host.attach(ActivityRef::new("com.example.app", "MainActivity"));
        host.attach(ActivityRef::new("com.example.app", "SecondActivity"));
        assert_eq!(host.current().unwrap().class_name, "SecondActivity");

        host.detach();
        assert!(host.current().is_err());
        // Detaching twice is harmless.
        host.detach();
    }
}
