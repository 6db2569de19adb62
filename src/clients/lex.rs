// LEX logistics API client

//! # LEX Client
//!
//! Four read-mostly endpoints, each configured as a full URL without query
//! string. Shipment endpoints and the customer endpoint may use different bearer
//! tokens.
//!
//! The listing endpoint is an oddity worth knowing about: it is a `GET` that
//! carries a JSON body (`{"fromdate": "DD-MM-YYYY", "todate": "DD-MM-YYYY"}`) and
//! its response may be prefixed with a `Customer Shipment Count N` banner before
//! the JSON array.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{error_for_status, EntityKind, SourceSystem};
use crate::config::LexConfig;
use crate::models::{value_to_string, CustomerRecord, ShipmentRecord};
use crate::{Result, SyncError, System};

const COUNT_BANNER: &str = "Customer Shipment Count";
const LIST_DATE_FORMAT: &str = "%d-%m-%Y";

/// reqwest client for the LEX API
#[derive(Clone)]
pub struct LexClient {
    http_client: Client,
    config: LexConfig,
}

impl LexClient {
    pub fn new(config: LexConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build LEX HTTP client: {e}")))?;
        Ok(Self { http_client, config })
    }

    async fn get_json(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        entity: EntityKind,
        id: &str,
    ) -> Result<Value> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| SyncError::transport(System::Lex, e))?;

        let response = error_for_status(System::Lex, entity, id, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(System::Lex, e))?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| SyncError::decode(System::Lex, format!("{entity} {id}: {e}")))
    }
}

#[async_trait]
impl SourceSystem for LexClient {
    async fn shipment_details(&self, awb: &str) -> Result<ShipmentRecord> {
        let body = self
            .get_json(
                &self.config.shipment_api,
                &self.config.shipment_token,
                &[("AWB", awb)],
                EntityKind::Shipment,
                awb,
            )
            .await?;

        match ShipmentRecord::from_value(body) {
            Some(record) if !record.0.is_empty() => {
                debug!(awb, fields = record.0.len(), "Fetched LEX shipment");
                Ok(record)
            }
            _ => Err(SyncError::NotFound {
                system: System::Lex,
                entity: EntityKind::Shipment.to_string(),
                id: awb.to_string(),
            }),
        }
    }

    async fn customer_details(&self, customer_id: &str) -> Result<Option<CustomerRecord>> {
        let body = self
            .get_json(
                &self.config.customer_detail_api,
                &self.config.customer_token,
                &[("Customer_Id", customer_id)],
                EntityKind::Customer,
                customer_id,
            )
            .await?;

        let first = match body {
            Value::Array(items) => items.into_iter().next(),
            Value::Object(map) if !map.is_empty() => Some(Value::Object(map)),
            _ => None,
        };

        first
            .map(|value| {
                serde_json::from_value::<CustomerRecord>(value)
                    .map_err(|e| SyncError::decode(System::Lex, format!("customer {customer_id}: {e}")))
            })
            .transpose()
    }

    async fn write_back_shipment_id(&self, awb: &str, target_id: &str) -> Result<()> {
        let response = self
            .http_client
            .get(&self.config.update_shipment_api)
            .bearer_auth(&self.config.shipment_token)
            .query(&[("AWB", awb), ("Zoho_Shipment_Id", target_id)])
            .send()
            .await
            .map_err(|e| SyncError::transport(System::Lex, e))?;

        error_for_status(System::Lex, EntityKind::Shipment, awb, response).await?;
        debug!(awb, target_id, "Wrote Zoho shipment ID back to LEX");
        Ok(())
    }

    async fn shipments_created_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<String>> {
        let window = json!({
            "fromdate": from.format(LIST_DATE_FORMAT).to_string(),
            "todate": to.format(LIST_DATE_FORMAT).to_string(),
        });
        let window_id = format!("{from}..{to}");

        let response = self
            .http_client
            .get(&self.config.shipment_list_api)
            .bearer_auth(&self.config.shipment_token)
            .json(&window)
            .send()
            .await
            .map_err(|e| SyncError::transport(System::Lex, e))?;

        let response = error_for_status(System::Lex, EntityKind::Shipment, &window_id, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(System::Lex, e))?;

        let awbs = parse_awb_listing(&body)?;
        debug!(from = %from, to = %to, count = awbs.len(), "Listed LEX shipments");
        Ok(awbs)
    }
}

/// Extract AWBs from a listing body, tolerating the count banner
///
/// The body is sometimes delivered as a JSON string wrapping the banner and the
/// array, so one level of string unwrapping is attempted as well.
pub(crate) fn parse_awb_listing(body: &str) -> Result<Vec<String>> {
    let value = parse_listing_value(body)?;
    let value = match value {
        Value::String(inner) => parse_listing_value(&inner)?,
        other => other,
    };

    match value {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| item.get("full_awb_number").and_then(value_to_string))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(SyncError::decode(
            System::Lex,
            format!("shipment listing is not an array: {other}"),
        )),
    }
}

fn parse_listing_value(body: &str) -> Result<Value> {
    let trimmed = body.trim();
    let json_part = match trimmed.strip_prefix(COUNT_BANNER) {
        Some(rest) => rest
            .trim_start()
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start(),
        None => trimmed,
    };

    if json_part.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(json_part)
        .map_err(|e| SyncError::decode(System::Lex, format!("unreadable shipment listing: {e}")))
}
