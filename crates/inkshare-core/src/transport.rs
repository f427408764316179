//! Outgoing side of the connection to the relay server.
//!
//! The session never opens sockets itself. The embedding application owns
//! the connection, feeds incoming text frames to
//! [`Session::handle_message`](crate::session::Session::handle_message) and
//! hands a [`Transport`] to [`Session::flush`](crate::session::Session::flush).

use crate::error::SyncResult;

/// A channel that accepts serialized protocol messages.
pub trait Transport {
    /// Send one JSON message. Failures are reported as
    /// [`SyncError::Transport`](crate::error::SyncError::Transport).
    fn send(&mut self, message: &str) -> SyncResult<()>;
}

/// Collects messages in memory. Useful for tests and for hosts that batch
/// frames themselves.
impl Transport for Vec<String> {
    fn send(&mut self, message: &str) -> SyncResult<()> {
        self.push(message.to_string());
        Ok(())
    }
}
