//! Login handshake bookkeeping.

use tracing::info;

/// One login packet awaiting its acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginHandshake {
    login_index: i32,
    handled: bool,
}

impl LoginHandshake {
    pub fn new(login_index: i32) -> Self {
        Self {
            login_index,
            handled: false,
        }
    }

    pub fn login_index(&self) -> i32 {
        self.login_index
    }

    pub fn handled(&self) -> bool {
        self.handled
    }

    /// Record the client's acknowledgment. Never retried or rejected.
    pub fn handle(&mut self) {
        info!("Received acknowledgment for login packet with id {}", self.login_index);
        self.handled = true;
    }
}
