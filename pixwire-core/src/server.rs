//! TCP accept loop in front of the worker pool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PixwireError;
use crate::format::RasterCodec;
use crate::handler::{ConnectionHandler, HandlerConfig};
use crate::pool::{PoolStats, WORKER_COUNT, WorkerPool};

/// Port of the reference deployment.
pub const DEFAULT_PORT: u16 = 8080;

/// Pause after a failed `accept()`.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ── Server ───────────────────────────────────────────────────────

/// Owns the listener and the worker pool.
///
/// The accept loop only ever waits on `accept()`; handing a connection
/// to the pool is a non-blocking enqueue.
pub struct Server {
    listener: TcpListener,
    pool: WorkerPool<TcpStream>,
    shutdown: CancellationToken,
}

impl Server {
    /// Bind `addr` and start the workers.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        handler: ConnectionHandler,
    ) -> Result<Self, PixwireError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            pool: WorkerPool::start(handler),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PixwireError> {
        Ok(self.listener.local_addr()?)
    }

    /// Cancelling this token stops the accept loop. Connections already
    /// queued are still served before [`run`](Self::run) returns.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        self.pool.stats()
    }

    /// Accept connections until the shutdown token fires.
    pub async fn run(self) -> Result<(), PixwireError> {
        let addr = self.local_addr()?;
        info!(%addr, workers = WORKER_COUNT, "pixwire server listening");

        loop {
            let accepted = tokio::select! {
                result = self.listener.accept() => result,
                _ = self.shutdown.cancelled() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    self.pool.dispatch(stream, peer)?;
                }
                Err(e) => {
                    warn!("accept error: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!("shutting down; draining queued connections");
        drop(self.listener);
        self.pool.shutdown().await;
        info!("pixwire server stopped");
        Ok(())
    }
}

/// Serve on `0.0.0.0:port` with default settings until the process dies.
pub async fn run_server(port: u16) -> Result<(), PixwireError> {
    let handler = ConnectionHandler::new(Arc::new(RasterCodec::default()), HandlerConfig::default());
    Server::bind(("0.0.0.0", port), handler).await?.run().await
}
