//! SSE server listener
//!
//! Binds the TCP listener and serves the stream and trigger routes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::dispatch::StreamDispatcher;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::registry::ConnectionRegistry;
use crate::server::config::ServerConfig;
use crate::server::routes::{build_router, AppState};
use crate::stats::{DeliveryStats, StatsSnapshot};

/// SSE push server
///
/// Owns the connection registry; nothing is process-global, so several
/// servers can run side by side.
pub struct SseServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    publisher: Publisher,
    stats: Arc<DeliveryStats>,
    state: Arc<AppState>,
}

impl SseServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(DeliveryStats::new());
        let dispatcher = StreamDispatcher::new(config.dispatch.clone(), Arc::clone(&stats));
        let publisher = Publisher::new(Arc::clone(&registry), Arc::clone(&stats))
            .with_timeout(config.publish_timeout);

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let state = Arc::new(AppState {
            registry: Arc::clone(&registry),
            dispatcher,
            publisher: publisher.clone(),
            stream_buffer_size: config.stream_buffer_size,
            connection_semaphore,
        });

        Ok(Self {
            config,
            registry,
            publisher,
            stats,
            state,
        })
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get a publisher for delivering messages outside the HTTP triggers
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Get current delivery statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state), &self.config)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown every open stream is closed, so in-flight responses end
    /// cleanly instead of holding the server open.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "SSE server listening");

        let registry = Arc::clone(&self.registry);
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                registry.close_all();
            })
            .await?;

        tracing::info!("SSE server stopped");
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
