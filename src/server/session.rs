//! Per-client session state and protocol line reassembly.

use crate::server::connection::Connection;
use bytes::BytesMut;

/// Protocol state machine for one client.
///
/// The nickname is fixed once chosen; a session never transitions
/// back to `AwaitingNickname`.
#[derive(Debug)]
pub enum SessionState {
    /// Connected, nickname not yet chosen. Receives no broadcasts.
    AwaitingNickname,
    /// Registered under a nickname and participating in chat.
    Chatting { nickname: String },
}

/// Server-side identity and buffering state for one connected client.
#[derive(Debug)]
pub struct Session {
    pub connection: Connection,
    pub state: SessionState,
    input: BytesMut,
}

impl Session {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            state: SessionState::AwaitingNickname,
            input: BytesMut::new(),
        }
    }

    /// Whether this session has completed nickname registration.
    pub fn is_chatting(&self) -> bool {
        matches!(self.state, SessionState::Chatting { .. })
    }

    /// Append freshly read bytes to the pending-input buffer.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }

    /// Extract the next complete line from the pending-input buffer.
    ///
    /// Consumes up to and including the first `\n`; one trailing `\r`
    /// is stripped. Returns `None` when no terminated line remains,
    /// leaving any partial tail buffered for the next read.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.input.iter().position(|&b| b == b'\n')?;
        let mut line = self.input.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}
