//! Server service lifecycle.
//!
//! Builds the connection handler and listener from a [`ServerConfig`],
//! runs the accept loop, and stops it on Ctrl-C.

use std::sync::Arc;

use tracing::info;

use pixwire_core::{ConnectionHandler, PixwireError, RasterCodec, Server};

use crate::config::ServerConfig;

pub struct ImageService {
    config: ServerConfig,
}

impl ImageService {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The handler every worker will run.
    pub fn handler(&self) -> ConnectionHandler {
        let codec = RasterCodec::new(self.config.codec.jpeg_quality);
        ConnectionHandler::new(Arc::new(codec), self.config.to_handler_config())
    }

    /// Bind the listener without starting the accept loop.
    pub async fn bind(&self) -> Result<Server, PixwireError> {
        Server::bind(self.config.listen_address(), self.handler()).await
    }

    /// Run until Ctrl-C, then drain queued connections.
    pub async fn run(self) -> Result<(), PixwireError> {
        let server = self.bind().await?;
        let stop = server.shutdown_token();

        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Ctrl-C received, shutting down");
            stop.cancel();
        });

        server.run().await
    }
}

// ── Tests ────────────────────────────────────────────────────────
