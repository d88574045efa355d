//! The caller's control surface for a running player.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::context::{MessageValue, ModuleHandle, RuntimeExports, StartupPhase};

const SEND_MESSAGE_NOT_LOADED: &str = "Failed to execute SendMessage: Player not loaded yet.";
const SET_FULLSCREEN_NOT_LOADED: &str = "Failed to set Fullscreen mode: Player not loaded yet.";

/// Handle returned once startup resolves.
///
/// Calls made before the player has loaded, or after it quit, print a
/// "not loaded yet" message and do nothing.
#[derive(Clone, Debug)]
pub struct RuntimeHandle {
    module: ModuleHandle,
}

impl RuntimeHandle {
    pub(crate) fn new(module: ModuleHandle) -> Self {
        Self { module }
    }

    /// The instance's runtime context
    pub fn module(&self) -> &ModuleHandle {
        &self.module
    }

    fn loaded_exports(&self) -> Option<Arc<dyn RuntimeExports>> {
        if self.module.startup_phase() != StartupPhase::Resolved || self.module.is_terminated() {
            return None;
        }
        self.module.exports()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_exports().is_some()
    }

    /// Call `method` on the player object named `object`.
    pub fn send_message(&self, object: &str, method: &str, value: Option<MessageValue>) {
        match self.loaded_exports() {
            Some(exports) => exports.send_message(object, method, value.as_ref()),
            None => self.module.print(SEND_MESSAGE_NOT_LOADED),
        }
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        match self.loaded_exports() {
            Some(exports) => exports.set_fullscreen(fullscreen),
            None => self.module.print(SET_FULLSCREEN_NOT_LOADED),
        }
    }

    /// Ask the runtime to stop and wait until it has torn the instance down.
    ///
    /// Concurrent calls all complete on the same teardown.
    pub async fn quit(&self) {
        let (tx, rx) = oneshot::channel();
        self.module.tracker().add_quit_listener(tx);
        self.module.request_quit();
        if rx.await.is_err() {
            debug!(instance = %self.module.id(), "Quit listener dropped without teardown");
        }
    }
}
