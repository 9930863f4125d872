//! The single event loop that owns shared state.
//!
//! Peers and the acceptor never touch the [`PeerRegistry`] directly. They
//! send [`RawMessage`]s and [`Registration`]s over channels and the
//! coordinator applies them one at a time from its own task, which is what
//! lets the registry live without a lock.

use std::{future::Future, net::SocketAddr};

use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, info, warn};

use crate::{
    command::{Command, ParseError},
    peer::{PeerId, RawMessage},
    registry::PeerRegistry,
};

/// Receives every successfully parsed command.
///
/// Runs inline on the coordinator task, so implementations must return
/// quickly. Handlers that need to do slow work should hand it off over
/// their own channel.
pub trait CommandHandler: Send + 'static {
    fn handle(&mut self, command: Command);

    /// Called for every line that failed to parse. The coordinator has
    /// already logged the error.
    fn on_parse_error(&mut self, _peer: PeerId, _error: &ParseError) {}
}

impl<F> CommandHandler for F
where
    F: FnMut(Command) + Send + 'static,
{
    fn handle(&mut self, command: Command) {
        self(command)
    }
}

/// Default handler: observes commands in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl CommandHandler for LoggingHandler {
    fn handle(&mut self, command: Command) {
        match command {
            Command::Set { key, value } => {
                info!(key = %key, value = %value, "set command received");
            }
        }
    }
}

/// Announces a newly accepted peer. `ack` fires once the registry has been
/// updated.
#[derive(Debug)]
pub struct Registration {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub ack: oneshot::Sender<()>,
}

/// Sending halves of the coordinator's event channels.
#[derive(Debug, Clone)]
pub struct CoordinatorChannels {
    pub messages: mpsc::Sender<RawMessage>,
    pub registrations: mpsc::Sender<Registration>,
}

/// Counters kept by the event loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub messages: u64,
    pub commands: u64,
    pub parse_errors: u64,
    pub registrations: u64,
}

/// State handed back once the coordinator has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub peers: usize,
    pub stats: LoopStats,
}

pub struct Coordinator<H> {
    registry: PeerRegistry,
    handler: H,
    messages: mpsc::Receiver<RawMessage>,
    registrations: mpsc::Receiver<Registration>,
    stats: LoopStats,
}

impl<H> Coordinator<H>
where
    H: CommandHandler,
{
    /// Builds a coordinator and the channels that feed it.
    ///
    /// Registrations use a single slot so the acceptor waits whenever the
    /// coordinator is behind.
    pub fn new(handler: H, message_capacity: usize) -> (Self, CoordinatorChannels) {
        let (message_tx, message_rx) = mpsc::channel(message_capacity.max(1));
        let (registration_tx, registration_rx) = mpsc::channel(1);

        let coordinator = Self {
            registry: PeerRegistry::new(),
            handler,
            messages: message_rx,
            registrations: registration_rx,
            stats: LoopStats::default(),
        };
        let channels = CoordinatorChannels {
            messages: message_tx,
            registrations: registration_tx,
        };
        (coordinator, channels)
    }

    /// Processes events until `shutdown` resolves.
    ///
    /// `select!` is unbiased here: when several sources are ready at once,
    /// tokio starts from a random branch each iteration. A closed channel
    /// disables its branch and the loop keeps waiting for shutdown.
    pub async fn run_until<F>(mut self, shutdown: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        debug!("coordinator running");

        loop {
            select! {
                _ = &mut shutdown => {
                    info!(peers = self.registry.len(), "coordinator shutting down");
                    break;
                }
                Some(message) = self.messages.recv() => {
                    self.handle_raw_message(message);
                }
                Some(registration) = self.registrations.recv() => {
                    self.handle_registration(registration);
                }
            }
        }

        self.report()
    }

    fn handle_raw_message(&mut self, message: RawMessage) {
        self.stats.messages += 1;
        if !self.registry.contains(message.peer) {
            debug!(peer = %message.peer, "message from unregistered peer");
        }

        match Command::parse_bytes(&message.bytes) {
            Ok(command) => {
                self.stats.commands += 1;
                self.handler.handle(command);
            }
            Err(error) => {
                self.stats.parse_errors += 1;
                warn!(peer = %message.peer, %error, "rejected command");
                self.handler.on_parse_error(message.peer, &error);
            }
        }
    }

    fn handle_registration(&mut self, registration: Registration) {
        let Registration { id, addr, ack } = registration;
        self.stats.registrations += 1;

        if self.registry.register(id, addr) {
            debug!(peer = %id, %addr, total = self.registry.len(), "peer registered");
        } else {
            debug!(peer = %id, %addr, "peer already registered");
        }

        // The acceptor may have given up waiting; nothing to do then.
        let _ = ack.send(());
    }

    fn report(&self) -> ShutdownReport {
        ShutdownReport {
            peers: self.registry.len(),
            stats: self.stats,
        }
    }
}
