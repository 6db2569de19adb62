// Sync REST API module
// Exposes the shipment sync engine and the reconciler over HTTP

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::engine::batch::ShipmentSync;
use crate::engine::reconcile::Reconciler;
use crate::logging::VerboseLogging;
use handlers::{
    create_shipments, get_shipments, health_check, logging_status, not_found, run_sync, sync_status,
    toggle_logging, update_shipments, SyncApiState,
};

/// Sync API server configuration
#[derive(Clone, Debug)]
pub struct SyncApiConfig {
    pub port: u16,
    pub host: String,
    pub cors_enabled: bool,
}

impl Default for SyncApiConfig {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            port: api.port,
            host: api.host,
            cors_enabled: true,
        }
    }
}

/// Sync API Server
pub struct SyncApiServer {
    config: SyncApiConfig,
    state: SyncApiState,
}

impl SyncApiServer {
    pub fn new(config: SyncApiConfig, sync: Arc<ShipmentSync>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            config,
            state: SyncApiState::new(sync, reconciler, VerboseLogging::default()),
        }
    }

    /// Share a verbosity switch with the engine so the toggle endpoint reaches it
    pub fn with_verbose_logging(mut self, verbose: VerboseLogging) -> Self {
        self.state.verbose = verbose;
        self
    }

    /// Create the Axum router with all sync routes
    pub fn create_router(&self) -> Router {
        let api_v1 = Router::new()
            // Bulk sync
            .route("/create-shipment", post(create_shipments))
            .route("/update-shipment", put(update_shipments))
            .route("/get-shipment", post(get_shipments))
            // Runtime log verbosity
            .route("/logging/toggle", post(toggle_logging))
            .route("/logging/status", get(logging_status))
            // Reconciliation
            .route("/sync/run", post(run_sync))
            .route("/sync/status", get(sync_status));

        let router = Router::new()
            .nest("/api/v1", api_v1)
            .route("/health", get(health_check))
            .fallback(not_found)
            .with_state(self.state.clone());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.create_router();
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!("📦 LEX ⇄ Zoho sync server starting");
        info!("📡 Server address: http://{}", addr);
        info!("🔗 API endpoints:");
        info!("   POST http://{}/api/v1/create-shipment", addr);
        info!("   PUT  http://{}/api/v1/update-shipment", addr);
        info!("   POST http://{}/api/v1/get-shipment", addr);
        info!("   POST http://{}/api/v1/logging/toggle", addr);
        info!("   POST http://{}/api/v1/sync/run", addr);
        info!("   GET  http://{}/api/v1/sync/status", addr);
        info!("   GET  http://{}/health", addr);
        info!("📋 Configuration:");
        info!("   CORS enabled: {}", self.config.cors_enabled);
        info!("   Verbose payload logging: {}", self.state.verbose.status());

        axum::Server::bind(&addr.parse()?)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }
}

/// Builder pattern for the sync API server
pub struct SyncApiServerBuilder {
    config: SyncApiConfig,
    sync: Arc<ShipmentSync>,
    reconciler: Arc<Reconciler>,
    verbose: Option<VerboseLogging>,
}

impl SyncApiServerBuilder {
    pub fn new(sync: Arc<ShipmentSync>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            config: SyncApiConfig::default(),
            sync,
            reconciler,
            verbose: None,
        }
    }

    pub fn with_api_config(mut self, api: &ApiConfig) -> Self {
        self.config.host = api.host.clone();
        self.config.port = api.port;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.config.host = host;
        self
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.config.cors_enabled = enabled;
        self
    }

    pub fn with_verbose_logging(mut self, verbose: VerboseLogging) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn build(self) -> SyncApiServer {
        let server = SyncApiServer::new(self.config, self.sync, self.reconciler);
        match self.verbose {
            Some(verbose) => server.with_verbose_logging(verbose),
            None => server,
        }
    }
}
