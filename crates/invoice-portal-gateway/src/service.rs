//! Portal gateway service: wires the upstream clients, the routes and the
//! middleware stack, then serves HTTP until shutdown.

use crate::adapters::{HttpDocumentStorage, HttpInvoiceAuthority};
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::{cleanup_task, GatewayMetrics, MiddlewareStack};
use crate::portal::PortalService;
use crate::ports::{DocumentStorage, InvoiceAuthority};
use crate::router::{build_router, AppState};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// How often idle rate limit buckets are swept.
const BUCKET_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Invoice portal gateway service
pub struct GatewayService {
    config: GatewayConfig,
    portal: PortalService,
    metrics: Arc<GatewayMetrics>,
}

impl GatewayService {
    /// Create the service with HTTP clients for both upstream authorities.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let authority: Arc<dyn InvoiceAuthority> =
            Arc::new(HttpInvoiceAuthority::new(&config.upstream)?);
        let storage: Arc<dyn DocumentStorage> =
            Arc::new(HttpDocumentStorage::new(&config.upstream)?);

        Ok(Self::with_ports(config, authority, storage))
    }

    /// Create the service over arbitrary upstream ports.
    pub fn with_ports(
        config: GatewayConfig,
        authority: Arc<dyn InvoiceAuthority>,
        storage: Arc<dyn DocumentStorage>,
    ) -> Self {
        let metrics = Arc::new(GatewayMetrics::new());
        let portal = PortalService::new(authority, storage, &config.limits, Arc::clone(&metrics));
        Self {
            config,
            portal,
            metrics,
        }
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Routes wrapped in the full middleware stack. Spawns the rate limit
    /// sweeper, so this must run inside a Tokio runtime.
    pub fn app(&self) -> Router {
        let stack = MiddlewareStack::from_config(&self.config, Arc::clone(&self.metrics));

        if self.config.rate_limit.enabled {
            let state = stack.rate_limit_state();
            let max_age = self.config.rate_limit.idle_bucket_ttl;
            tokio::spawn(cleanup_task(state, BUCKET_SWEEP_INTERVAL, max_age));
        }

        let router = build_router(AppState {
            portal: self.portal.clone(),
            metrics: Arc::clone(&self.metrics),
        });
        stack.apply(router)
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), GatewayError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        let app = self.app();

        info!(
            addr = %local_addr,
            authority = %self.config.upstream.authority_url,
            storage = %self.config.upstream.storage_url,
            "Invoice portal listening"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Serve(e.to_string()))?;

        info!("Invoice portal stopped");
        Ok(())
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
