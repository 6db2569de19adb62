// Logging setup and the runtime verbosity switch

//! Structured logs go through `tracing`. Log level comes from `RUST_LOG` (default
//! `info`). On top of that, operators can flip **verbose payload logging** at
//! runtime through `POST /api/v1/logging/toggle`: while it is on, the fetched LEX
//! record, the mapped payload and the Zoho write reply (the confirmed record ID)
//! are logged at `info` instead of `debug`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Shared on/off switch; clones observe the same flag
#[derive(Debug, Clone, Default)]
pub struct VerboseLogging {
    enabled: Arc<AtomicBool>,
}

impl VerboseLogging {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// `"enabled"` / `"disabled"`
    pub fn status(&self) -> &'static str {
        if self.is_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    }
}

/// Install the global fmt subscriber; later calls are no-ops
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Log `$payload` as JSON at `info` when verbose logging is on, else at `debug`
#[macro_export]
macro_rules! log_payload {
    ($verbose:expr, $payload:expr, $($field:tt)*) => {{
        if $verbose.is_enabled() {
            ::tracing::info!(payload = %::serde_json::to_string(&$payload).unwrap_or_default(), $($field)*);
        } else {
            ::tracing::debug!(payload = %::serde_json::to_string(&$payload).unwrap_or_default(), $($field)*);
        }
    }};
}
