use std::{future::Future, net::SocketAddr};

use tokio::{select, sync::oneshot};
use tracing::{info, warn};

use crate::{
    acceptor::Acceptor,
    config::Config,
    coordinator::{CommandHandler, Coordinator, ShutdownReport},
    error::{Result, ServerError},
};

/// A bound server: the acceptor plus the coordinator it feeds.
pub struct Server<H> {
    acceptor: Acceptor,
    coordinator: Coordinator<H>,
    local_addr: SocketAddr,
}

impl<H> Server<H>
where
    H: CommandHandler,
{
    /// Binds the listening socket. A bind failure is the only error that
    /// stops the server from starting.
    pub async fn bind(config: Config, handler: H) -> Result<Self> {
        let config = config.normalized();
        let (coordinator, channels) = Coordinator::new(handler, config.message_capacity);
        let acceptor = Acceptor::bind(&config.listen_addr, channels)
            .await?
            .with_max_line_bytes(config.max_line_bytes);
        let local_addr = acceptor.local_addr().map_err(ServerError::Accept)?;

        Ok(Self {
            acceptor,
            coordinator,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs until `shutdown` resolves or the listener fails, then stops the
    /// coordinator and returns what it saw.
    ///
    /// Peer connections still open at that point are left to end on their
    /// own; their next forward fails once the coordinator is gone.
    pub async fn run_until<F>(self, shutdown: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            acceptor,
            coordinator,
            local_addr,
        } = self;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let coordinator = tokio::spawn(coordinator.run_until(async move {
            let _ = stop_rx.await;
        }));

        tokio::pin!(shutdown);
        let accept_result = select! {
            _ = &mut shutdown => {
                info!(addr = %local_addr, "server shutting down");
                Ok(())
            }
            result = acceptor.accept_forever() => result,
        };

        let _ = stop_tx.send(());
        let report = coordinator.await?;
        accept_result.map(|()| report)
    }

    pub async fn run_until_ctrl_c(self) -> Result<ShutdownReport> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}
