// Domain models for the LEX ⇄ Zoho sync
// Raw upstream records, the strict Zoho payload and sync bookkeeping

//! # Domain Models Module
//!
//! Two kinds of data live here:
//!
//! - **Upstream records** (`shipment`, `customer`, `crm`): what LEX and Zoho hand
//!   back. LEX is loose about types (numbers arrive as strings and vice versa), so
//!   its records are kept as JSON maps with typed accessors.
//! - **Sync bookkeeping** (`sync`): per-item results, failed operations waiting
//!   for the drain pass, and the summaries returned to callers.
//!
//! ## Rust Learning Notes:
//!
//! ### Re-exports for Clean APIs
//! The `pub use` statements at the bottom let callers write
//! `use lex_zoho_sync::models::ShipmentRecord` instead of reaching into the
//! submodule.

// LEX shipment record and the Zoho shipment payload
pub mod shipment;

// LEX customer record (carries the Zoho cross-references)
pub mod customer;

// Zoho deal/account records and `{name, id}` references
pub mod crm;

// Item results, failed operations, summaries
pub mod sync;

pub use crm::{AccountRecord, DealRecord, RecordRef};
pub use customer::CustomerRecord;
pub use shipment::{ShipmentPayload, ShipmentRecord};
pub use sync::{
    BatchSummary, DrainOutcome, DrainStatus, DrainSummary, FailedOperation, FailedStage,
    ItemResult, ItemStatus, PendingWork, SyncMode,
};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a scalar JSON value as a string; `null`, empty strings and containers give `None`
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Deserialize an ID that may arrive as a string, a number or `null`
pub(crate) fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}
