//! Wire protocol message formatting.
//!
//! Plain text over TCP, one message per `\n`-terminated line. System
//! notices carry a `[system]:` prefix; chat lines carry the sender's
//! nickname in brackets.

/// Sent to a client immediately after its connection is accepted.
pub const WELCOME: &[u8] = b"[system]: welcome, please enter nickname\n";

/// Sent when a client submits an empty line as its nickname.
pub const EMPTY_NICKNAME: &[u8] = b"[system]: nickname cannot be empty, retry\n";

/// Sent to a client once its nickname has been accepted.
pub const NICKNAME_SET: &[u8] = b"[system]: nickname set, start chatting\n";

/// Join announcement broadcast to the other chatting clients.
pub fn joined(nickname: &str) -> Vec<u8> {
    format!("[system]: {nickname} joined\n").into_bytes()
}

/// Leave announcement broadcast to the other chatting clients.
pub fn left(nickname: &str) -> Vec<u8> {
    format!("[system]: {nickname} left\n").into_bytes()
}

/// A chat line broadcast to the other chatting clients.
pub fn chat(nickname: &str, text: &str) -> Vec<u8> {
    format!("[{nickname}]: {text}\n").into_bytes()
}
