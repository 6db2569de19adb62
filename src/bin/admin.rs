//! LEX ⇄ Zoho Sync Admin CLI
//!
//! Runs the same engine as the server, once, from a terminal: a manual
//! reconciliation, ad-hoc creates and updates, and a configuration check.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenv::dotenv;
use lex_zoho_sync::clients::token::OAuthTokenManager;
use lex_zoho_sync::config::ZohoAuthConfig;
use lex_zoho_sync::{
    ItemResult, LexClient, ReconcileReport, Reconciler, ShipmentSync, SyncConfig, SyncMode, SyncReport,
    VerboseLogging, ZohoClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lex-zoho-admin")]
#[command(about = "LEX ⇄ Zoho Sync Admin CLI - run syncs by hand and check configuration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (includes mapped payloads)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one day of LEX shipments into Zoho and exit
    RunSync {
        /// Day to reconcile (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Create Zoho shipments for the given AWBs
    Create {
        #[arg(required = true)]
        awbs: Vec<String>,
    },

    /// Overwrite the given Zoho shipments from LEX
    Update {
        #[arg(required = true)]
        shipment_ids: Vec<String>,
    },

    /// Load the configuration and print what would be used
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let config = SyncConfig::from_env().context("loading configuration")?;

    if let Commands::CheckConfig = cli.command {
        print_config(&config);
        return Ok(());
    }

    let sync = Arc::new(build_sync(&config, cli.verbose)?);

    match cli.command {
        Commands::RunSync { date } => {
            let reconciler = Reconciler::new(Arc::clone(&sync), config.reconcile.utc_offset_minutes);
            let report = reconciler.run(date).await?;
            print_reconcile_report(&report);
            let failed = [&report.create, &report.update]
                .into_iter()
                .flatten()
                .map(|r| r.summary.failed)
                .sum::<usize>();
            if failed > 0 {
                bail!("{failed} shipment(s) failed to sync");
            }
        }
        Commands::Create { awbs } => {
            let report = sync.run_job(awbs, SyncMode::Create).await?;
            print_sync_report(&report);
            ensure_all_succeeded(&report)?;
        }
        Commands::Update { shipment_ids } => {
            let report = sync.run_job(shipment_ids, SyncMode::Update).await?;
            print_sync_report(&report);
            ensure_all_succeeded(&report)?;
        }
        Commands::CheckConfig => {}
    }

    Ok(())
}

fn build_sync(config: &SyncConfig, verbose: bool) -> Result<ShipmentSync> {
    let tokens = OAuthTokenManager::provider_for(&config.zoho).context("building Zoho token provider")?;
    let lex = LexClient::new(config.lex.clone()).context("building LEX client")?;
    let zoho = ZohoClient::new(config.zoho.clone(), tokens).context("building Zoho client")?;
    Ok(ShipmentSync::new(Arc::new(lex), Arc::new(zoho), config.tuning.clone())
        .with_verbose_logging(VerboseLogging::new(verbose)))
}

fn ensure_all_succeeded(report: &SyncReport) -> Result<()> {
    if report.summary.failed > 0 {
        bail!("{} of {} shipment(s) failed", report.summary.failed, report.summary.total);
    }
    Ok(())
}

fn print_item(item: &ItemResult) {
    if item.is_success() {
        let recovered = if item.recovered { " (recovered in drain)" } else { "" };
        println!(
            "  {} {} → {}{}",
            "✔".green(),
            item.id,
            item.target_id.as_deref().unwrap_or("-"),
            recovered
        );
    } else {
        let stage = item.stage.map(|s| format!("{s:?}")).unwrap_or_default();
        println!(
            "  {} {} [{}] {}",
            "✘".red(),
            item.id,
            stage,
            item.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn print_sync_report(report: &SyncReport) {
    println!("\n{} {}", "📦".bold(), format!("{} results", report.mode).bold());
    println!("=====================================");
    for item in &report.results {
        print_item(item);
    }
    println!(
        "\nTotal: {}  Processed: {}  Successful: {}  Failed: {}",
        report.summary.total,
        report.summary.processed,
        report.summary.successful.to_string().green(),
        report.summary.failed.to_string().red()
    );
    if report.drain.attempted > 0 {
        println!(
            "Drain pass: {} queued, {} recovered, {} still failing",
            report.drain.attempted, report.drain.recovered, report.drain.still_failing
        );
    }
}

fn print_reconcile_report(report: &ReconcileReport) {
    println!("\n{}", format!("🔄 Reconciliation for {}", report.date).bold());
    println!("=====================================");
    println!("Listed in LEX: {}", report.listed);
    println!("To create: {}", report.to_create.len());
    println!("To update: {}", report.to_update.len());
    if !report.skipped.is_empty() {
        println!("{}", format!("Skipped: {}", report.skipped.len()).yellow());
        for skipped in &report.skipped {
            println!("  {} {}: {}", "⚠".yellow(), skipped.awb, skipped.error);
        }
    }
    for sync_report in [&report.create, &report.update].into_iter().flatten() {
        print_sync_report(sync_report);
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}…")
}

fn print_config(config: &SyncConfig) {
    println!("\n{}", "⚙️  Configuration".bold());
    println!("=====================================");
    println!("Listen: {}:{}", config.api.host, config.api.port);
    println!("LEX shipment API: {}", config.lex.shipment_api);
    println!("LEX write-back API: {}", config.lex.update_shipment_api);
    println!("LEX customer API: {}", config.lex.customer_detail_api);
    println!("LEX listing API: {}", config.lex.shipment_list_api);
    println!("LEX token: {}", mask(&config.lex.shipment_token));
    println!("Zoho shipments API: {}", config.zoho.shipments_api);
    println!("Zoho deals API: {}", config.zoho.deals_api);
    println!("Zoho accounts API: {}", config.zoho.accounts_api);
    match &config.zoho.auth {
        ZohoAuthConfig::RefreshToken { client_id, token_url, .. } => {
            println!("Zoho auth: refresh token (client {}, {})", mask(client_id), token_url)
        }
        ZohoAuthConfig::Static(token) => println!("Zoho auth: static token {}", mask(token)),
    }
    println!(
        "Batches: {} items, {} concurrent, {:?} apart",
        config.tuning.batch_size, config.tuning.concurrency, config.tuning.batch_delay
    );
    println!(
        "Retries: submit {}×{:?}, write-back {} from {:?}, drain {}×{:?}",
        config.tuning.submit_attempts,
        config.tuning.submit_delay,
        config.tuning.writeback_attempts,
        config.tuning.writeback_base_delay,
        config.tuning.drain_attempts,
        config.tuning.drain_delay
    );
    if config.reconcile.enabled {
        println!(
            "Reconciliation: '{}' (UTC), offset {} min",
            config.reconcile.cron, config.reconcile.utc_offset_minutes
        );
    } else {
        println!("Reconciliation: {}", "disabled".yellow());
    }
    println!("\n{}", "✅ Configuration is complete".green());
}
