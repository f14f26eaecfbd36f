//! HTTP server for the login flow.

pub mod routes;

use std::net::SocketAddr;

use axum::Router;

use crate::config::Config;
use crate::registry::ProviderRegistry;

/// The login web server.
pub struct LoginServer {
    router: Router,
    providers: Vec<String>,
}

impl LoginServer {
    /// Build the server from a frozen provider registry.
    ///
    /// # Errors
    ///
    /// Returns error if the outbound HTTP client cannot be built.
    pub fn new(config: &Config, registry: ProviderRegistry) -> anyhow::Result<Self> {
        let providers = registry.names().map(str::to_owned).collect();
        let router = routes::create_router(config, registry)?;
        Ok(Self { router, providers })
    }

    /// The router, for driving the server without a socket.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Listen on `port` until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!(providers = ?self.providers, "Serving login routes");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on http://{}", addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("Server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for LoginServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginServer").field("providers", &self.providers).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
