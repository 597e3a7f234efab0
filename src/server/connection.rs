//! Non-blocking connection wrapper for one accepted client socket.

use mio::net::TcpStream;
use std::io::{self, Read, Write};
use tracing::trace;

/// Result of one non-blocking read attempt.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes were read into the caller's buffer; more may be
    /// immediately available (caller decides whether to drain on).
    Data(usize),
    /// No data right now; stop reading for this readiness cycle.
    WouldBlock,
    /// Peer closed the connection. Terminal, not retryable.
    Closed,
    /// Read failed. Terminal; the connection is marked closed.
    Error(io::ErrorKind),
}

/// One accepted client socket.
///
/// Sockets accepted through mio are already in non-blocking mode.
/// A connection marked closed refuses further I/O; the descriptor is
/// released exactly once, when the connection is dropped.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    closed: bool,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// The underlying socket, for multiplexer (de)registration.
    pub fn source_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// One non-blocking read attempt into `buf`.
    pub fn read_into(&mut self, buf: &mut [u8]) -> ReadOutcome {
        if self.closed {
            return ReadOutcome::Closed;
        }
        loop {
            match self.stream.read(buf) {
                Ok(0) => {
                    self.closed = true;
                    return ReadOutcome::Closed;
                }
                Ok(n) => return ReadOutcome::Data(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return ReadOutcome::WouldBlock;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.closed = true;
                    return ReadOutcome::Error(e.kind());
                }
            }
        }
    }

    /// Best-effort non-blocking write.
    ///
    /// No write buffering is kept: a short or failed write drops the
    /// remainder rather than blocking the loop.
    pub fn send(&mut self, msg: &[u8]) {
        if self.closed {
            return;
        }
        let mut written = 0;
        while written < msg.len() {
            match self.stream.write(&msg[written..]) {
                Ok(0) => {
                    trace!("Write returned zero, dropping remainder");
                    return;
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    trace!(error = %e, "Best-effort write dropped");
                    return;
                }
            }
        }
    }

    /// Mark the connection closed. Idempotent; the descriptor itself
    /// is released when the connection is dropped.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Accept one mio-side connection from a std client.
    fn socket_pair() -> (Connection, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (Connection::new(TcpStream::from_std(server)), client)
    }

    /// Retry a non-blocking read until data or closure shows up.
    fn read_eventually(conn: &mut Connection, buf: &mut [u8]) -> ReadOutcome {
        for _ in 0..100 {
            match conn.read_into(buf) {
                ReadOutcome::WouldBlock => thread::sleep(Duration::from_millis(10)),
                other => return other,
            }
        }
        panic!("no data within timeout");
    }

    #[test]
    fn test_read_data_then_would_block() {
        let (mut conn, client) = socket_pair();
        use std::io::Write as _;
        (&client).write_all(b"hello").unwrap();

        let mut buf = [0u8; 64];
        match read_eventually(&mut conn, &mut buf) {
            ReadOutcome::Data(n) => assert_eq!(&buf[..n], b"hello"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(conn.read_into(&mut buf), ReadOutcome::WouldBlock));
        assert!(!conn.is_closed());
    }

    #[test]
    fn test_peer_close_is_terminal() {
        let (mut conn, client) = socket_pair();
        drop(client);

        let mut buf = [0u8; 64];
        match read_eventually(&mut conn, &mut buf) {
            ReadOutcome::Closed => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(conn.is_closed());
        // Further reads report closure without touching the socket.
        assert!(matches!(conn.read_into(&mut buf), ReadOutcome::Closed));
    }

    #[test]
    fn test_send_and_close_idempotent() {
        let (mut conn, client) = socket_pair();
        conn.send(b"ping\n");

        use std::io::Read as _;
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut buf = [0u8; 8];
        let n = (&client).read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping\n");

        conn.close();
        conn.close();
        assert!(conn.is_closed());
        // Writes after close are silently dropped.
        conn.send(b"late\n");
    }
}
