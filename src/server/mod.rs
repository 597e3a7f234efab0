//! Session registry and chat protocol engine.
//!
//! Owns the listening socket and the map of client tokens to sessions.
//! Accepts connections, reassembles newline-delimited lines, drives
//! the per-client nickname state machine, and relays chat lines to
//! every other registered client. All of it runs inside event loop
//! dispatch on one thread.

mod connection;
mod session;

pub use connection::{Connection, ReadOutcome};
pub use session::{Session, SessionState};

use crate::config::Config;
use crate::protocol;
use crate::reactor::{Channel, DrainStatus, EventHandler, EventLoop};
use mio::net::TcpListener;
use mio::Token;
use slab::Slab;
use std::io;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

/// Sentinel token for the listening socket; client tokens are slab keys.
const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Scratch buffer for one read attempt.
const READ_BUF_SIZE: usize = 4096;

/// Pending-accept queue length; the accept loop drains it on every
/// listener readiness event.
const LISTEN_BACKLOG: i32 = 16;

/// Bind the relay and run its event loop. Never returns under normal
/// operation; an error is a fatal multiplexer or setup failure.
pub fn run(config: Config) -> io::Result<()> {
    let mut event_loop = EventLoop::new()?;
    let mut server = ChatServer::bind(&config)?;
    let addr = server.local_addr()?;
    server.register(&mut event_loop)?;

    info!(
        addr = %addr,
        max_connections = config.max_connections,
        "Chat relay listening"
    );

    event_loop.run(&mut server)
}

/// The server proper: listening socket plus per-client sessions.
pub struct ChatServer {
    listener: TcpListener,
    sessions: Slab<Session>,
    max_connections: usize,
}

impl ChatServer {
    /// Bind the listening socket. Any failure here is a setup failure
    /// and aborts startup.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = create_listener(addr)?;

        Ok(Self {
            listener: TcpListener::from_std(listener),
            sessions: Slab::with_capacity(config.max_connections.min(1024)),
            max_connections: config.max_connections,
        })
    }

    /// Address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Register the listening socket with the event loop.
    pub fn register(&mut self, event_loop: &mut EventLoop) -> io::Result<()> {
        event_loop.add_channel(&mut self.listener, Channel::readable(LISTENER_TOKEN))
    }

    /// One accept attempt. Per-connection failures drop only the
    /// affected socket; the listener keeps serving.
    fn accept_one(&mut self, event_loop: &mut EventLoop) -> DrainStatus {
        match self.listener.accept() {
            Ok((stream, peer_addr)) => {
                if self.sessions.len() >= self.max_connections {
                    warn!(peer = %peer_addr, "Connection limit reached, dropping");
                    return DrainStatus::Continue;
                }

                // mio-accepted sockets are already non-blocking.
                let mut connection = Connection::new(stream);
                let entry = self.sessions.vacant_entry();
                let token = Token(entry.key());

                if event_loop
                    .add_channel(connection.source_mut(), Channel::readable(token))
                    .is_err()
                {
                    // Already reported by the event loop; only this
                    // connection degrades. Dropping it closes the socket.
                    return DrainStatus::Continue;
                }

                connection.send(protocol::WELCOME);
                entry.insert(Session::new(connection));
                debug!(token = token.0, peer = %peer_addr, "New client");
                DrainStatus::Continue
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => DrainStatus::WouldBlock,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => DrainStatus::Continue,
            Err(e) => {
                error!(error = %e, "Accept failed");
                DrainStatus::WouldBlock
            }
        }
    }

    /// One read attempt for a client, followed by a full drain of the
    /// complete lines it produced. Lines are processed FIFO; if a line
    /// removes the session (`/quit`), processing stops immediately.
    fn read_one(&mut self, event_loop: &mut EventLoop, token: Token) -> DrainStatus {
        let key = token.0;
        let Some(session) = self.sessions.get_mut(key) else {
            return DrainStatus::Closed;
        };

        let mut buf = [0u8; READ_BUF_SIZE];
        match session.connection.read_into(&mut buf) {
            ReadOutcome::Data(n) => {
                session.push_bytes(&buf[..n]);
                loop {
                    let Some(session) = self.sessions.get_mut(key) else {
                        return DrainStatus::Closed;
                    };
                    let Some(line) = session.next_line() else {
                        break;
                    };
                    self.process_line(event_loop, key, line);
                }
                DrainStatus::Continue
            }
            ReadOutcome::WouldBlock => DrainStatus::WouldBlock,
            ReadOutcome::Closed => {
                self.disconnect(event_loop, key);
                DrainStatus::Closed
            }
            ReadOutcome::Error(kind) => {
                debug!(token = key, error = ?kind, "Read failed");
                self.disconnect(event_loop, key);
                DrainStatus::Closed
            }
        }
    }

    /// Per-client state machine: awaiting-nickname, then chatting.
    fn process_line(&mut self, event_loop: &mut EventLoop, key: usize, line: String) {
        let Some(session) = self.sessions.get_mut(key) else {
            return;
        };

        match &session.state {
            SessionState::AwaitingNickname => {
                if line.is_empty() {
                    session.connection.send(protocol::EMPTY_NICKNAME);
                    return;
                }
                session.state = SessionState::Chatting {
                    nickname: line.clone(),
                };
                session.connection.send(protocol::NICKNAME_SET);
                info!(token = key, nickname = %line, "Nickname registered");
                self.broadcast_to_others(key, &protocol::joined(&line));
            }
            SessionState::Chatting { nickname } => {
                let nickname = nickname.clone();
                if line == "/quit" {
                    self.broadcast_to_others(key, &protocol::left(&nickname));
                    self.remove_session(event_loop, key);
                } else if !line.is_empty() {
                    self.broadcast_to_others(key, &protocol::chat(&nickname, &line));
                }
            }
        }
    }

    /// Deliver a message to every chatting client except the sender.
    /// Slab iteration is ascending by key, so delivery order is
    /// deterministic.
    fn broadcast_to_others(&mut self, sender: usize, message: &[u8]) {
        for (key, session) in self.sessions.iter_mut() {
            if key == sender || !session.is_chatting() {
                continue;
            }
            session.connection.send(message);
        }
    }

    /// Abrupt closure (peer hangup or read error). A chatting client
    /// gets the same leave announcement as a voluntary `/quit`.
    fn disconnect(&mut self, event_loop: &mut EventLoop, key: usize) {
        let nickname = match self.sessions.get(key) {
            Some(session) => match &session.state {
                SessionState::Chatting { nickname } => Some(nickname.clone()),
                SessionState::AwaitingNickname => None,
            },
            None => return,
        };
        if let Some(nickname) = &nickname {
            self.broadcast_to_others(key, &protocol::left(nickname));
        }
        self.remove_session(event_loop, key);
    }

    /// Unregister, close, and erase one client. The descriptor is
    /// released when the session drops.
    fn remove_session(&mut self, event_loop: &mut EventLoop, key: usize) {
        if let Some(mut session) = self.sessions.try_remove(key) {
            event_loop.remove_channel(session.connection.source_mut(), Token(key));
            session.connection.close();
            debug!(token = key, "Client disconnected");
        }
    }
}

impl EventHandler for ChatServer {
    fn on_readable(&mut self, event_loop: &mut EventLoop, token: Token) -> DrainStatus {
        if token == LISTENER_TOKEN {
            self.accept_one(event_loop)
        } else {
            self.read_one(event_loop, token)
        }
    }
}

/// Create the listening socket: explicit socket so the reuse flag and
/// backlog are under our control, handed to mio as non-blocking.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
