// LEX ⇄ Zoho Sync - Main Server
// Run with: cargo run --bin server

//! # Sync Server Binary
//!
//! Wires the library together and serves it:
//!
//! ```text
//! main()
//!   ↓ loads
//! SyncConfig (environment / .env)
//!   ↓ builds
//! LexClient + ZohoClient (+ token provider)
//!   ↓ shared by
//! ShipmentSync ──► Reconciler ──► JobScheduler (daily cron)
//!   ↓ served by
//! SyncApiServer (axum)
//! ```
//!
//! A missing endpoint or credential stops the process here, before the listener
//! is bound.
//!
//! ## Rust Learning Notes:
//!
//! ### `anyhow` in binaries
//! The library returns its own `SyncError`; the binary only needs to report
//! failures, so `anyhow::Result` plus `?` is enough and `.context(..)` adds the
//! step that failed.
//!
//! ### Keeping the scheduler alive
//! `JobScheduler` stops when dropped, so it is bound to a variable that lives
//! for the whole of `main`.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use dotenv::dotenv;
use lex_zoho_sync::clients::token::OAuthTokenManager;
use lex_zoho_sync::logging::init_tracing;
use lex_zoho_sync::{
    build_scheduler, LexClient, Reconciler, ShipmentSync, SyncApiServerBuilder, SyncConfig,
    VerboseLogging, ZohoClient,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real deployments set the variables directly
    if let Err(e) = dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    init_tracing();

    info!("🚀 Starting LEX ⇄ Zoho Sync Server...");
    info!("=====================================");

    let config = SyncConfig::from_env().context("loading configuration")?;

    info!("Server: {}:{}", config.api.host, config.api.port);
    info!(
        "Batch size: {}, concurrency: {}, inter-batch delay: {:?}",
        config.tuning.batch_size, config.tuning.concurrency, config.tuning.batch_delay
    );

    let tokens = OAuthTokenManager::provider_for(&config.zoho).context("building Zoho token provider")?;
    let lex = LexClient::new(config.lex.clone()).context("building LEX client")?;
    let zoho = ZohoClient::new(config.zoho.clone(), tokens).context("building Zoho client")?;

    let verbose = VerboseLogging::default();
    let sync = Arc::new(
        ShipmentSync::new(Arc::new(lex), Arc::new(zoho), config.tuning.clone())
            .with_verbose_logging(verbose.clone()),
    );
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&sync),
        config.reconcile.utc_offset_minutes,
    ));

    let scheduler = build_scheduler(Arc::clone(&reconciler), &config.reconcile)
        .await
        .context("building reconciliation scheduler")?;
    match &scheduler {
        Some(scheduler) => {
            scheduler
                .start()
                .await
                .map_err(|e| anyhow!("starting reconciliation scheduler: {e:?}"))?;
            info!("✅ Daily reconciliation scheduled ({})", config.reconcile.cron);
        }
        None => warn!("Daily reconciliation is disabled"),
    }

    SyncApiServerBuilder::new(sync, reconciler)
        .with_api_config(&config.api)
        .with_verbose_logging(verbose)
        .build()
        .run()
        .await
        .map_err(|e| anyhow!(e))?;

    drop(scheduler);
    Ok(())
}
