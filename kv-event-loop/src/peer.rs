//! One client connection and its read life cycle.

use std::{fmt, io, net::SocketAddr};

use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    net::TcpStream,
    sync::mpsc,
};
use tracing::trace;

use crate::config::DEFAULT_MAX_LINE_BYTES;

/// Identity of a connected peer, unique for the lifetime of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// One protocol line, without its delimiter, tagged with its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub peer: PeerId,
    pub bytes: Vec<u8>,
}

/// Why a peer's read life cycle ended.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("connection closed by peer")]
    Disconnected,

    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("coordinator is no longer accepting messages")]
    CoordinatorClosed,
}

/// A connected client. Owns its connection exclusively and only ever writes
/// into the coordinator's message channel.
pub struct Peer<S = TcpStream> {
    id: PeerId,
    addr: SocketAddr,
    reader: BufReader<S>,
    messages: mpsc::Sender<RawMessage>,
    max_line_bytes: usize,
}

impl<S> Peer<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        connection: S,
        messages: mpsc::Sender<RawMessage>,
    ) -> Self {
        Self {
            id,
            addr,
            reader: BufReader::new(connection),
            messages,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Reads lines until the connection ends, forwarding each one to the
    /// coordinator in read order.
    ///
    /// Always returns an error: [`PeerError::Disconnected`] is the normal
    /// ending when the remote side closes the connection.
    pub async fn run_read_loop(mut self) -> Result<(), PeerError> {
        let mut line = Vec::new();
        loop {
            if !self.read_line(&mut line).await? {
                return Err(PeerError::Disconnected);
            }

            trace!(peer = %self.id, bytes = line.len(), "forwarding line");
            let message = RawMessage {
                peer: self.id,
                bytes: std::mem::take(&mut line),
            };
            self.messages
                .send(message)
                .await
                .map_err(|_| PeerError::CoordinatorClosed)?;
        }
    }

    /// Fills `line` with the next line minus its `\n` or `\r\n` delimiter.
    /// Returns `false` once the connection has no more data.
    async fn read_line(&mut self, line: &mut Vec<u8>) -> Result<bool, PeerError> {
        line.clear();

        // Room for the content plus a two byte delimiter; anything that
        // fills the whole window without a newline is oversized.
        let window = (self.max_line_bytes as u64).saturating_add(2);
        let read = (&mut self.reader)
            .take(window)
            .read_until(b'\n', line)
            .await?;
        if read == 0 {
            return Ok(false);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        } else if read as u64 == window {
            return Err(PeerError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }

        if line.len() > self.max_line_bytes {
            return Err(PeerError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncWriteExt, duplex};

    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:4000".parse().expect("valid address")
    }

    async fn collect(rx: &mut mpsc::Receiver<RawMessage>) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        while let Some(message) = rx.recv().await {
            lines.push(message.bytes);
        }
        lines
    }

    #[tokio::test]
    async fn forwards_lines_in_read_order() {
        let (mut client, server) = duplex(1024);
        let (tx, mut rx) = mpsc::channel(16);
        let peer = Peer::new(PeerId::new(7), test_addr(), server, tx);

        client
            .write_all(b"SET a 1\nSET a 2\r\n\nlast")
            .await
            .expect("write lines");
        drop(client);

        let result = peer.run_read_loop().await;
        assert!(matches!(result, Err(PeerError::Disconnected)));

        let lines = collect(&mut rx).await;
        assert_eq!(
            lines,
            vec![
                b"SET a 1".to_vec(),
                b"SET a 2".to_vec(),
                Vec::new(),
                b"last".to_vec()
            ]
        );
    }

    #[tokio::test]
    async fn messages_carry_the_peer_identity() {
        let (mut client, server) = duplex(64);
        let (tx, mut rx) = mpsc::channel(4);
        let peer = Peer::new(PeerId::new(3), test_addr(), server, tx);
        let task = tokio::spawn(peer.run_read_loop());

        client.write_all(b"SET k v\n").await.expect("write line");
        let message = rx.recv().await.expect("message forwarded");
        assert_eq!(message.peer, PeerId::new(3));

        drop(client);
        let result = task.await.expect("peer task");
        assert!(matches!(result, Err(PeerError::Disconnected)));
    }

    #[tokio::test]
    async fn oversized_lines_end_the_peer() {
        let (mut client, server) = duplex(1024);
        let (tx, mut rx) = mpsc::channel(4);
        let peer = Peer::new(PeerId::new(1), test_addr(), server, tx).with_max_line_bytes(8);

        client
            .write_all(b"SET ok 1\nSET way too long\n")
            .await
            .expect("write lines");

        let result = peer.run_read_loop().await;
        assert!(matches!(result, Err(PeerError::LineTooLong { limit: 8 })));
        assert_eq!(collect(&mut rx).await, vec![b"SET ok 1".to_vec()]);
    }

    #[tokio::test]
    async fn unbounded_line_limit_still_forwards() {
        let (mut client, server) = duplex(64);
        let (tx, mut rx) = mpsc::channel(4);
        let peer =
            Peer::new(PeerId::new(1), test_addr(), server, tx).with_max_line_bytes(usize::MAX);

        client.write_all(b"SET a b\n").await.expect("write line");
        drop(client);

        let result = tokio::spawn(peer.run_read_loop())
            .await
            .expect("read loop does not panic");
        assert!(matches!(result, Err(PeerError::Disconnected)));
        assert_eq!(collect(&mut rx).await, vec![b"SET a b".to_vec()]);
    }

    #[tokio::test]
    async fn stops_when_coordinator_is_gone() {
        let (mut client, server) = duplex(64);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let peer = Peer::new(PeerId::new(1), test_addr(), server, tx);

        client.write_all(b"SET a b\n").await.expect("write line");
        let result = peer.run_read_loop().await;
        assert!(matches!(result, Err(PeerError::CoordinatorClosed)));
    }

    #[test]
    fn peer_ids_display_with_prefix() {
        assert_eq!(PeerId::new(42).to_string(), "peer-42");
    }
}
