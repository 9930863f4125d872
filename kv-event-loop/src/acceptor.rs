//! Connection admission.
//!
//! The acceptor owns the listening socket. Every accepted connection becomes
//! a [`Peer`]: the acceptor registers it with the coordinator, waits for the
//! registration to be applied, then moves the peer's read loop onto its own
//! task and goes straight back to accepting.

use std::{io, net::SocketAddr, time::Duration};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::DEFAULT_MAX_LINE_BYTES,
    coordinator::{CoordinatorChannels, Registration},
    error::{Result, ServerError},
    peer::{Peer, PeerError, PeerId},
};

/// Pause after an accept error that is not tied to a single connection,
/// e.g. running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Acceptor {
    listener: TcpListener,
    channels: CoordinatorChannels,
    next_id: u64,
    max_line_bytes: usize,
}

impl Acceptor {
    /// Binds the listening socket. Failure here is fatal for the server.
    pub async fn bind(addr: &str, channels: CoordinatorChannels) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self::from_listener(listener, channels))
    }

    pub fn from_listener(listener: TcpListener, channels: CoordinatorChannels) -> Self {
        Self {
            listener,
            channels,
            next_id: 1,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections for as long as the listener is usable.
    ///
    /// Only returns on a listener-level failure or once the coordinator has
    /// stopped taking registrations.
    pub async fn accept_forever(mut self) -> Result<()> {
        loop {
            let accepted = self.listener.accept().await;
            self.handle_accept_result(accepted).await?;
        }
    }

    async fn handle_accept_result(
        &mut self,
        result: io::Result<(TcpStream, SocketAddr)>,
    ) -> Result<()> {
        match result {
            Ok((stream, addr)) => self.admit(stream, addr).await,
            Err(err) if is_connection_error(&err) => {
                warn!(error = ?err, "failed to accept connection");
                Ok(())
            }
            Err(err) if is_listener_error(&err) => {
                error!(error = ?err, "listener failed");
                Err(ServerError::Accept(err))
            }
            Err(err) => {
                warn!(error = ?err, "accept error, backing off");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                Ok(())
            }
        }
    }

    async fn admit(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let id = self.allocate_id();
        let peer = Peer::new(id, addr, stream, self.channels.messages.clone())
            .with_max_line_bytes(self.max_line_bytes);

        let (ack, acked) = oneshot::channel();
        self.channels
            .registrations
            .send(Registration { id, addr, ack })
            .await
            .map_err(|_| ServerError::CoordinatorClosed)?;
        acked.await.map_err(|_| ServerError::CoordinatorClosed)?;

        info!(peer = %id, remote = %addr, "new peer connected");
        spawn_read_loop(peer);
        Ok(())
    }

    fn allocate_id(&mut self) -> PeerId {
        let id = PeerId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

fn spawn_read_loop(peer: Peer) {
    let (id, addr) = (peer.id(), peer.addr());
    tokio::spawn(async move {
        match peer.run_read_loop().await {
            Ok(()) | Err(PeerError::Disconnected) => {
                debug!(peer = %id, remote = %addr, "peer disconnected");
            }
            Err(err) => {
                warn!(peer = %id, remote = %addr, error = %err, "peer read error");
            }
        }
    });
}

/// Errors tied to one incoming connection, such as a reset mid-handshake or
/// a firewall rule rejecting it (EPERM on Linux).
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Errors that mean the listening socket itself is unusable.
fn is_listener_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput
            | io::ErrorKind::NotConnected
            | io::ErrorKind::Unsupported
    )
}
