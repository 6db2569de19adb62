//! Runtime configuration
//!
//! Everything is read from flat environment variables (optionally seeded from a
//! `.env` file by the binaries) through the `config` crate. Endpoint URLs and
//! credentials are required; a missing one is a fatal [`SyncError::Config`] raised
//! before the server accepts any request. Batch sizes, delays and retry budgets
//! are tunables with defaults.

use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::{Result, SyncError};

/// Flat view of the environment, one field per variable (lower-cased by `config`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvSettings {
    host: Option<String>,
    port: Option<u16>,

    lex_shipment_api: Option<String>,
    lex_update_shipment_api: Option<String>,
    lex_customer_detail_api: Option<String>,
    lex_shipment_list_api: Option<String>,
    shipment_bearer_token: Option<String>,
    bearer_token: Option<String>,

    zoho_shipments_api: Option<String>,
    zoho_deal_api: Option<String>,
    zoho_accounts_api: Option<String>,
    zoho_oauth_token: Option<String>,
    zoho_client_id: Option<String>,
    zoho_client_secret: Option<String>,
    zoho_refresh_token: Option<String>,
    zoho_token_url: Option<String>,

    http_timeout_secs: Option<u64>,

    sync_batch_size: Option<usize>,
    sync_concurrency: Option<usize>,
    sync_batch_delay_ms: Option<u64>,
    sync_lookup_delay_ms: Option<u64>,
    sync_submit_attempts: Option<u32>,
    sync_submit_delay_ms: Option<u64>,
    sync_writeback_attempts: Option<u32>,
    sync_writeback_base_delay_ms: Option<u64>,
    sync_drain_attempts: Option<u32>,
    sync_drain_delay_ms: Option<u64>,

    sync_scheduler_enabled: Option<bool>,
    sync_cron: Option<String>,
    sync_utc_offset_minutes: Option<i32>,
}

/// LEX endpoints and credentials
#[derive(Debug, Clone)]
pub struct LexConfig {
    /// `GET ?AWB=` shipment details
    pub shipment_api: String,
    /// `GET ?AWB=&Zoho_Shipment_Id=` write-back
    pub update_shipment_api: String,
    /// `GET ?Customer_Id=` customer details
    pub customer_detail_api: String,
    /// `GET` with `{fromdate, todate}` body, lists AWBs created in a window
    pub shipment_list_api: String,
    /// Bearer token for the shipment endpoints
    pub shipment_token: String,
    /// Bearer token for the customer endpoint
    pub customer_token: String,
    pub timeout: Duration,
}

/// How the Zoho access token is obtained
#[derive(Debug, Clone)]
pub enum ZohoAuthConfig {
    /// Refresh-token grant against the Zoho accounts server
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_url: String,
    },
    /// Pre-issued token used as-is
    Static(String),
}

/// Zoho CRM endpoints and credentials
#[derive(Debug, Clone)]
pub struct ZohoConfig {
    pub shipments_api: String,
    pub deals_api: String,
    pub accounts_api: String,
    pub auth: ZohoAuthConfig,
    pub timeout: Duration,
}

/// Batch sizes, pacing and retry budgets for the sync engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTuning {
    pub batch_size: usize,
    /// Items of one batch in flight at once
    pub concurrency: usize,
    pub batch_delay: Duration,
    /// Pause between per-AWB classification lookups during reconciliation
    pub lookup_delay: Duration,
    /// Total attempts for fetch and submit calls
    pub submit_attempts: u32,
    pub submit_delay: Duration,
    /// Total attempts for the LEX write-back call
    pub writeback_attempts: u32,
    pub writeback_base_delay: Duration,
    /// Total attempts per queued operation during the drain pass
    pub drain_attempts: u32,
    pub drain_delay: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            batch_size: 80,
            concurrency: 80,
            batch_delay: Duration::from_millis(1500),
            lookup_delay: Duration::from_millis(200),
            submit_attempts: 3,
            submit_delay: Duration::from_millis(2000),
            writeback_attempts: 3,
            writeback_base_delay: Duration::from_millis(1000),
            drain_attempts: 3,
            drain_delay: Duration::from_millis(2000),
        }
    }
}

/// Daily reconciliation schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first), evaluated in UTC
    pub cron: String,
    /// Offset used to decide what "yesterday" means
    pub utc_offset_minutes: i32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 0 4 * * *".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api: ApiConfig,
    pub lex: LexConfig,
    pub zoho: ZohoConfig,
    pub tuning: SyncTuning,
    pub reconcile: ReconcileConfig,
}

impl SyncConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::default().try_parsing(true))
    }

    /// Load from an explicit `config` environment source (used by tests)
    pub fn from_environment(source: Environment) -> Result<Self> {
        let settings: EnvSettings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Self::from_settings(settings)
    }

    fn from_settings(env: EnvSettings) -> Result<Self> {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, name: &'static str| -> String {
            match value.filter(|v| !v.trim().is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let timeout = Duration::from_secs(env.http_timeout_secs.unwrap_or(30));

        let shipment_token = require(env.shipment_bearer_token, "SHIPMENT_BEARER_TOKEN");
        let lex = LexConfig {
            shipment_api: require(env.lex_shipment_api, "LEX_SHIPMENT_API"),
            update_shipment_api: require(env.lex_update_shipment_api, "LEX_UPDATE_SHIPMENT_API"),
            customer_detail_api: require(env.lex_customer_detail_api, "LEX_CUSTOMER_DETAIL_API"),
            shipment_list_api: require(env.lex_shipment_list_api, "LEX_SHIPMENT_LIST_API"),
            customer_token: env
                .bearer_token
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| shipment_token.clone()),
            shipment_token,
            timeout,
        };

        let shipments_api = require(env.zoho_shipments_api, "ZOHO_SHIPMENTS_API");
        let deals_api = require(env.zoho_deal_api, "ZOHO_DEAL_API");
        let accounts_api = require(env.zoho_accounts_api, "ZOHO_ACCOUNTS_API");

        let auth = match (
            env.zoho_client_id,
            env.zoho_client_secret,
            env.zoho_refresh_token,
            env.zoho_token_url,
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token), Some(token_url)) => {
                ZohoAuthConfig::RefreshToken {
                    client_id,
                    client_secret,
                    refresh_token,
                    token_url,
                }
            }
            _ => match env.zoho_oauth_token.filter(|v| !v.trim().is_empty()) {
                Some(token) => ZohoAuthConfig::Static(token),
                None => {
                    missing.push(
                        "ZOHO_CLIENT_ID/ZOHO_CLIENT_SECRET/ZOHO_REFRESH_TOKEN/ZOHO_TOKEN_URL or ZOHO_OAUTH_TOKEN",
                    );
                    ZohoAuthConfig::Static(String::new())
                }
            },
        };

        if !missing.is_empty() {
            return Err(SyncError::Config(format!(
                "API configuration is missing: {}",
                missing.join(", ")
            )));
        }

        let defaults = SyncTuning::default();
        let batch_size = env.sync_batch_size.unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            return Err(SyncError::Config("SYNC_BATCH_SIZE must be at least 1".to_string()));
        }
        let ms = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };
        let tuning = SyncTuning {
            batch_size,
            concurrency: env.sync_concurrency.unwrap_or(batch_size).max(1),
            batch_delay: ms(env.sync_batch_delay_ms, defaults.batch_delay),
            lookup_delay: ms(env.sync_lookup_delay_ms, defaults.lookup_delay),
            submit_attempts: env.sync_submit_attempts.unwrap_or(defaults.submit_attempts).max(1),
            submit_delay: ms(env.sync_submit_delay_ms, defaults.submit_delay),
            writeback_attempts: env
                .sync_writeback_attempts
                .unwrap_or(defaults.writeback_attempts)
                .max(1),
            writeback_base_delay: ms(env.sync_writeback_base_delay_ms, defaults.writeback_base_delay),
            drain_attempts: env.sync_drain_attempts.unwrap_or(defaults.drain_attempts).max(1),
            drain_delay: ms(env.sync_drain_delay_ms, defaults.drain_delay),
        };

        let reconcile_defaults = ReconcileConfig::default();
        let reconcile = ReconcileConfig {
            enabled: env.sync_scheduler_enabled.unwrap_or(reconcile_defaults.enabled),
            cron: env.sync_cron.unwrap_or(reconcile_defaults.cron),
            utc_offset_minutes: env
                .sync_utc_offset_minutes
                .unwrap_or(reconcile_defaults.utc_offset_minutes),
        };
        if reconcile.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(SyncError::Config(
                "SYNC_UTC_OFFSET_MINUTES must be within one day".to_string(),
            ));
        }

        let api_defaults = ApiConfig::default();
        let api = ApiConfig {
            host: env.host.unwrap_or(api_defaults.host),
            port: env.port.unwrap_or(api_defaults.port),
        };

        Ok(Self {
            api,
            lex,
            zoho: ZohoConfig {
                shipments_api,
                deals_api,
                accounts_api,
                auth,
                timeout,
            },
            tuning,
            reconcile,
        })
    }
}
