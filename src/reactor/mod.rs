//! Readiness-driven reactor core.
//!
//! One `mio::Poll` multiplexes every socket in the process. Each
//! registered socket is described by a [`Channel`] (token + readiness
//! interest); ready tokens are dispatched to an [`EventHandler`] which
//! looks up its own state by token. Single-threaded, no locks.

mod channel;
mod event_loop;

pub use channel::{Channel, DrainStatus};
pub use event_loop::{EventHandler, EventLoop};
