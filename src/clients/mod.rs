// Upstream clients for LEX (source) and Zoho CRM (target)

//! # Clients Module
//!
//! The sync engine never talks HTTP directly. It sees two traits:
//!
//! ```text
//! ShipmentSync / Reconciler / EnrichmentResolver
//!        ↓ trait calls
//! SourceSystem (LEX)        TargetSystem (Zoho)
//!        ↓                         ↓
//! LexClient (reqwest)       ZohoClient (reqwest + TokenProvider)
//! ```
//!
//! The real clients attach credentials per call and turn non-success statuses
//! into typed [`SyncError`](crate::SyncError)s carrying the status and body. They
//! never retry; retry policy belongs to the engine.
//!
//! "Nothing there" is not a failure: lookups that legitimately come back empty
//! return `Ok(None)`.

pub mod lex;
pub mod token;
pub mod zoho;

use async_trait::async_trait;
use chrono::NaiveDate;
use url::Url;

use crate::models::{AccountRecord, CustomerRecord, DealRecord, ShipmentPayload, ShipmentRecord};
use crate::{Result, SyncError, System};

/// The logistics platform holding shipment ground truth
#[async_trait]
pub trait SourceSystem: Send + Sync {
    /// Shipment details for an AWB
    async fn shipment_details(&self, awb: &str) -> Result<ShipmentRecord>;

    /// Customer record, `None` when LEX has no such customer
    async fn customer_details(&self, customer_id: &str) -> Result<Option<CustomerRecord>>;

    /// Store the Zoho shipment ID on the LEX shipment
    async fn write_back_shipment_id(&self, awb: &str, target_id: &str) -> Result<()>;

    /// AWBs of shipments created in the inclusive date window
    async fn shipments_created_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<String>>;
}

/// The CRM receiving shipments
#[async_trait]
pub trait TargetSystem: Send + Sync {
    /// Create a shipment, returning the ID Zoho assigned
    async fn create_shipment(&self, payload: &ShipmentPayload) -> Result<String>;

    /// Overwrite a shipment, returning the confirmed ID
    async fn update_shipment(&self, id: &str, payload: &ShipmentPayload) -> Result<String>;

    /// Raw Zoho shipment record
    async fn get_shipment(&self, id: &str) -> Result<Option<ShipmentRecord>>;

    async fn get_deal(&self, id: &str) -> Result<Option<DealRecord>>;

    async fn get_account(&self, id: &str) -> Result<Option<AccountRecord>>;
}

/// Kinds of records the clients can fetch by ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Shipment,
    Customer,
    Deal,
    Account,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Shipment => write!(f, "shipment"),
            EntityKind::Customer => write!(f, "customer"),
            EntityKind::Deal => write!(f, "deal"),
            EntityKind::Account => write!(f, "account"),
        }
    }
}

/// `base` with `id` appended as one escaped path segment
pub(crate) fn record_url(system: System, base: &str, id: &str) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| SyncError::Config(format!("invalid {system} endpoint {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| SyncError::Config(format!("{system} endpoint cannot take a path: {base}")))?
        .pop_if_empty()
        .push(id);
    Ok(url)
}

/// Turn a non-success response into [`SyncError`]
pub(crate) async fn error_for_status(
    system: System,
    entity: EntityKind,
    id: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SyncError::NotFound {
            system,
            entity: entity.to_string(),
            id: id.to_string(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Upstream {
        system,
        status: status.as_u16(),
        body,
    })
}
