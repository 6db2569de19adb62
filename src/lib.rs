// LEX ⇄ Zoho Sync - Rust Edition
// Keeps LEX shipments and Zoho CRM shipment records in step

//! # LEX ⇄ Zoho Sync Library
//!
//! This is the library root for the shipment synchronization service. The
//! binaries (`server`, `admin`) are thin wrappers around the types exported here.
//!
//! ## Core Components
//!
//! ### Domain Models
//! - [`ShipmentRecord`]: a raw, loosely-typed shipment as LEX returns it
//! - [`ShipmentPayload`]: the strict Zoho shipment contract produced by the mapper
//! - [`ItemResult`] / [`FailedOperation`]: per-item outcomes and deferred retries
//!
//! ### Sync Engine
//!
//! #### [`ShipmentSync`] - Batched create/update pipeline
//!
//! Splits ID lists into batches, runs fetch → enrich → map → submit → write-back
//! for every item with bounded concurrency, retries transient failures and drains
//! the [`FailedOperationQueue`] once the batches are done.
//!
//! #### [`Reconciler`] - Daily create-vs-update pass
//!
//! Lists yesterday's LEX shipments, checks each for an existing Zoho
//! cross-reference and hands the two lists to [`ShipmentSync`].
//!
//! ### Clients
//! [`LexClient`] and [`ZohoClient`] implement the [`SourceSystem`] and
//! [`TargetSystem`] traits. The engine only sees the traits, which is what lets
//! the tests drive it with in-memory fakes.
//!
//! ### HTTP API
//! [`SyncApiServer`] exposes the engine over REST (axum).

// Runtime configuration assembled from the environment
pub mod config;

// Domain models for both systems and for sync bookkeeping
pub mod models;

// Pure LEX → Zoho field mapping
pub mod mapper;

// Upstream HTTP clients and the token provider
pub mod clients;

// Batch processor, retry, queue, enrichment and reconciliation
pub mod engine;

// REST API
pub mod api;

// Runtime log verbosity toggle and subscriber setup
pub mod logging;

pub use config::{ApiConfig, LexConfig, ReconcileConfig, SyncConfig, SyncTuning, ZohoConfig};

pub use models::{
    AccountRecord, BatchSummary, CustomerRecord, DealRecord, DrainStatus, DrainSummary,
    FailedOperation, FailedStage, ItemResult, ItemStatus, RecordRef, ShipmentPayload,
    ShipmentRecord, SyncMode,
};

pub use mapper::{map_shipment, normalize_date};

pub use clients::{
    lex::LexClient,
    token::{OAuthTokenManager, StaticToken, TokenProvider},
    zoho::ZohoClient,
    SourceSystem, TargetSystem,
};

pub use engine::{
    batch::{ShipmentSync, SyncReport},
    enrich::{Enrichment, EnrichmentResolver},
    pacing::{NoopSleeper, Pacer, Sleeper, TokioSleeper},
    queue::FailedOperationQueue,
    reconcile::{ReconcileReport, ReconcileState, Reconciler},
    retry::RetryPolicy,
    scheduler::build_scheduler,
};

pub use api::{SyncApiConfig, SyncApiServer, SyncApiServerBuilder};

pub use logging::VerboseLogging;

use thiserror::Error;

/// Upstream system a request was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum System {
    Lex,
    Zoho,
}

impl std::fmt::Display for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            System::Lex => write!(f, "lex"),
            System::Zoho => write!(f, "zoho"),
        }
    }
}

/// Error type shared by the clients, the engine and the API layer
///
/// Only [`SyncError::is_transient`] errors are worth retrying; everything else
/// ends a retry loop on the first occurrence.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Caller supplied a malformed request (empty ID list, bad date, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Required configuration missing or unparseable at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream answered 404 for an entity
    #[error("{system} {entity} not found: {id}")]
    NotFound {
        system: System,
        entity: String,
        id: String,
    },

    /// Upstream answered with a non-success status
    #[error("{system} returned HTTP {status}: {body}")]
    Upstream {
        system: System,
        status: u16,
        body: String,
    },

    /// Zoho accepted the request but rejected the record itself
    #[error("{system} rejected record: {message}")]
    Rejected { system: System, message: String },

    /// Connection, timeout or other transport failure
    #[error("Transport error talking to {system}: {message}")]
    Transport { system: System, message: String },

    /// Upstream body did not have the expected shape
    #[error("Unexpected response from {system}: {message}")]
    Decode { system: System, message: String },

    /// Access token could not be obtained; `retryable` when the token endpoint
    /// was unreachable or answered 5xx rather than refusing the grant
    #[error("Token error: {message}")]
    Token { message: String, retryable: bool },

    /// Request collides with work already in progress
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A whole batch was aborted by a fault outside the per-item pipeline
    #[error("Batch aborted: {0}")]
    BatchAborted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Network failures, 429 and 5xx responses, a Zoho 401 (the client has
    /// already dropped the stale token) and an unreachable token endpoint
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport { .. } => true,
            SyncError::Upstream {
                system: System::Zoho,
                status: 401,
                ..
            } => true,
            SyncError::Upstream { status, .. } => *status == 429 || *status >= 500,
            SyncError::Token { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub(crate) fn token(message: impl Into<String>, retryable: bool) -> Self {
        SyncError::Token {
            message: message.into(),
            retryable,
        }
    }

    pub(crate) fn transport(system: System, err: reqwest::Error) -> Self {
        SyncError::Transport {
            system,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(system: System, message: impl Into<String>) -> Self {
        SyncError::Decode {
            system,
            message: message.into(),
        }
    }
}

impl From<::config::ConfigError> for SyncError {
    fn from(err: ::config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

/// Type alias for Results that use our error type
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server_error = SyncError::Upstream {
            system: System::Zoho,
            status: 503,
            body: "unavailable".to_string(),
        };
        let throttled = SyncError::Upstream {
            system: System::Zoho,
            status: 429,
            body: String::new(),
        };
        let bad_request = SyncError::Upstream {
            system: System::Zoho,
            status: 400,
            body: "INVALID_DATA".to_string(),
        };

        assert!(server_error.is_transient());
        assert!(throttled.is_transient());
        assert!(!bad_request.is_transient());
        assert!(SyncError::Transport {
            system: System::Lex,
            message: "connection reset".to_string()
        }
        .is_transient());
        assert!(!SyncError::Validation("empty".to_string()).is_transient());
    }

    #[test]
    fn test_auth_failures_worth_retrying() {
        let zoho_unauthorized = SyncError::Upstream {
            system: System::Zoho,
            status: 401,
            body: "INVALID_TOKEN".to_string(),
        };
        let lex_unauthorized = SyncError::Upstream {
            system: System::Lex,
            status: 401,
            body: "bad token".to_string(),
        };

        assert!(zoho_unauthorized.is_transient());
        assert!(!lex_unauthorized.is_transient());
        assert!(SyncError::token("token endpoint returned HTTP 503", true).is_transient());
        assert!(!SyncError::token("token refresh rejected: invalid_code", false).is_transient());
    }

    #[test]
    fn test_config_error_converts() {
        let err: SyncError = ::config::ConfigError::Message("missing LEX_SHIPMENT_API".to_string()).into();
        assert!(matches!(err, SyncError::Config(ref m) if m.contains("LEX_SHIPMENT_API")));
    }

    #[test]
    fn test_error_display_names_system() {
        let err = SyncError::NotFound {
            system: System::Zoho,
            entity: "deal".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "zoho deal not found: 42");
    }
}
