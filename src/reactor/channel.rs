//! Readiness channel: the binding of one socket to its interest mask.
//!
//! A channel does not own the socket. Registration transfers the
//! channel into the event loop's table; the handler owning the socket
//! finds it again by token at dispatch time.

use mio::event::Event;
use mio::{Interest, Token};

/// Outcome of one handler invocation during a drain cycle.
///
/// Under edge-triggered notification a single readiness event may
/// cover many bytes of availability, so the dispatcher keeps invoking
/// the handler until it reports that the socket would block or that
/// the descriptor is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// Work was done and more may be immediately available.
    Continue,
    /// The socket has no more data right now; stop draining.
    WouldBlock,
    /// The descriptor was closed or removed; stop draining.
    Closed,
}

/// One registered socket: token plus readiness interest.
#[derive(Debug)]
pub struct Channel {
    token: Token,
    interest: Interest,
}

impl Channel {
    /// Create a channel interested in readable readiness.
    pub fn readable(token: Token) -> Self {
        Self {
            token,
            interest: Interest::READABLE,
        }
    }

    /// Token this channel was registered under.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Interest mask used when registering with the multiplexer.
    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Whether an observed event should trigger this channel.
    ///
    /// Error and hangup conditions are dispatched like readable ones:
    /// the handler's read attempt is what observes the peer teardown.
    pub fn accepts(&self, event: &Event) -> bool {
        if !self.interest.is_readable() {
            return false;
        }
        event.is_readable() || event.is_read_closed() || event.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_channel() {
        let channel = Channel::readable(Token(7));
        assert_eq!(channel.token(), Token(7));
        assert!(channel.interest().is_readable());
        assert!(!channel.interest().is_writable());
    }
}
