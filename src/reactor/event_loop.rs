//! mio-based event loop.
//!
//! Readiness model: poll tells us when sockets are ready, then the
//! handler performs non-blocking syscalls until they would block.
//! mio registers sockets edge-triggered, so failing to drain a ready
//! socket means the multiplexer will not re-signal it until new data
//! arrives.

use crate::reactor::channel::{Channel, DrainStatus};
use mio::event::Source;
use mio::{Events, Poll, Token};
use std::collections::HashMap;
use std::io;
use tracing::{debug, error, warn};

/// Ready events drained per poll wakeup.
const EVENT_CAPACITY: usize = 128;

/// Dispatch target for ready channels.
///
/// `on_readable` performs one unit of non-blocking work (one accept
/// attempt, one read attempt) for the socket registered under `token`
/// and reports whether the drain cycle should continue. Handlers own
/// their sockets and sessions; the token is the only thing captured
/// at registration time.
pub trait EventHandler {
    fn on_readable(&mut self, event_loop: &mut EventLoop, token: Token) -> DrainStatus;
}

/// Owner of the readiness multiplexer and the channel table.
///
/// Created once at startup and run for the life of the process; there
/// is no stop API, shutdown is process termination.
pub struct EventLoop {
    poll: Poll,
    channels: HashMap<Token, Channel>,
}

impl EventLoop {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            channels: HashMap::new(),
        })
    }

    /// Register a socket with the multiplexer and store its channel.
    ///
    /// Rejection by the multiplexer is reported and the channel is
    /// dropped; the caller degrades that one socket, not the process.
    pub fn add_channel<S: Source>(&mut self, source: &mut S, channel: Channel) -> io::Result<()> {
        let token = channel.token();
        if let Err(e) = self
            .poll
            .registry()
            .register(source, token, channel.interest())
        {
            warn!(token = token.0, error = %e, "Multiplexer rejected descriptor");
            return Err(e);
        }
        self.channels.insert(token, channel);
        Ok(())
    }

    /// Deregister a socket and erase its channel.
    ///
    /// A deregistration failure is benign (the descriptor may already
    /// be gone from the multiplexer) and only logged.
    pub fn remove_channel<S: Source>(&mut self, source: &mut S, token: Token) {
        if let Err(e) = self.poll.registry().deregister(source) {
            debug!(token = token.0, error = %e, "Deregister ignored");
        }
        self.channels.remove(&token);
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Block on the multiplexer and dispatch ready channels, forever.
    ///
    /// An interrupted wait is retried transparently; any other wait
    /// failure is fatal and terminates the loop (dropping the `Poll`
    /// closes the multiplexer handle).
    pub fn run<H: EventHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %e, "Multiplexer wait failed");
                return Err(e);
            }

            for event in events.iter() {
                let token = event.token();
                match self.channels.get(&token) {
                    Some(channel) if channel.accepts(event) => {}
                    // Stale token or readiness the channel is not
                    // interested in.
                    _ => continue,
                }

                // Drain until the handler reports would-block or the
                // channel disappears (removal mid-drain, e.g. /quit).
                loop {
                    match handler.on_readable(self, token) {
                        DrainStatus::Continue => {
                            if !self.channels.contains_key(&token) {
                                break;
                            }
                        }
                        DrainStatus::WouldBlock | DrainStatus::Closed => break,
                    }
                }
            }
        }
    }
}
