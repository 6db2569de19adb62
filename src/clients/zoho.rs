// Zoho CRM v2 client

//! # Zoho Client
//!
//! Every call carries `Authorization: Zoho-oauthtoken <token>` from the
//! [`TokenProvider`]. Zoho wraps records in a `data` array both ways:
//!
//! ```text
//! write:  {"data": [ {..payload..} ]}
//! reply:  {"data": [ {"status": "success", "details": {"id": "..."}, "code": "SUCCESS"} ]}
//! read:   {"data": [ {..record..} ]}      (204 / empty body when nothing matches)
//! ```
//!
//! A `401` drops the cached token so the next call (usually the engine's retry)
//! authenticates again.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::token::TokenProvider;
use super::{error_for_status, record_url, EntityKind, TargetSystem};
use crate::config::ZohoConfig;
use crate::models::{AccountRecord, DealRecord, ShipmentPayload, ShipmentRecord};
use crate::{Result, SyncError, System};

/// `{"data": [...]}` envelope used by every Zoho CRM endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Per-record status returned for writes
#[derive(Debug, Deserialize)]
struct WriteStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

impl WriteStatus {
    fn into_id(self) -> Result<String> {
        let succeeded = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("success"))
            .unwrap_or(false);
        let id = self
            .details
            .as_ref()
            .and_then(|d| d.get("id"))
            .and_then(crate::models::value_to_string);

        match (succeeded, id) {
            (true, Some(id)) => Ok(id),
            (true, None) => Err(SyncError::decode(System::Zoho, "success reply without details.id")),
            (false, _) => Err(SyncError::Rejected {
                system: System::Zoho,
                message: format!(
                    "{}: {}",
                    self.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                    self.message.unwrap_or_default()
                ),
            }),
        }
    }
}

/// reqwest client for the Zoho CRM REST API
#[derive(Clone)]
pub struct ZohoClient {
    http_client: Client,
    config: ZohoConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl ZohoClient {
    pub fn new(config: ZohoConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build Zoho HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            config,
            tokens,
        })
    }

    async fn authorized(&self, method: Method, url: reqwest::Url) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http_client
            .request(method, url)
            .header("Authorization", format!("Zoho-oauthtoken {token}")))
    }

    async fn send(
        &self,
        request: RequestBuilder,
        entity: EntityKind,
        id: &str,
    ) -> Result<Option<reqwest::Response>> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(System::Zoho, e))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                warn!(entity = %entity, id, "Zoho rejected the access token");
                self.tokens.invalidate().await;
            }
            StatusCode::NO_CONTENT => return Ok(None),
            _ => {}
        }

        error_for_status(System::Zoho, entity, id, response).await.map(Some)
    }

    /// Read one record, `None` when Zoho has nothing for the ID
    async fn get_record<T: DeserializeOwned>(&self, base: &str, entity: EntityKind, id: &str) -> Result<Option<T>> {
        let url = record_url(System::Zoho, base, id)?;
        let request = self.authorized(Method::GET, url).await?;

        let Some(response) = self.send(request, entity, id).await? else {
            return Ok(None);
        };
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(System::Zoho, e))?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| SyncError::decode(System::Zoho, format!("{entity} {id}: {e}")))?;
        Ok(envelope.data.into_iter().next())
    }

    /// Submit one payload and return the ID from the write status
    async fn write_record(
        &self,
        method: Method,
        url: reqwest::Url,
        payload: &ShipmentPayload,
        id: &str,
    ) -> Result<String> {
        let request = self
            .authorized(method, url)
            .await?
            .json(&json!({ "data": [payload] }));

        let response = self
            .send(request, EntityKind::Shipment, id)
            .await?
            .ok_or_else(|| SyncError::decode(System::Zoho, "empty reply to shipment write"))?;

        let envelope: Envelope<WriteStatus> = response
            .json()
            .await
            .map_err(|e| SyncError::decode(System::Zoho, format!("shipment write reply: {e}")))?;

        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::decode(System::Zoho, "shipment write reply has no data"))?
            .into_id()
    }
}

#[async_trait]
impl TargetSystem for ZohoClient {
    async fn create_shipment(&self, payload: &ShipmentPayload) -> Result<String> {
        let url = reqwest::Url::parse(&self.config.shipments_api).map_err(|e| {
            SyncError::Config(format!("invalid zoho endpoint {}: {e}", self.config.shipments_api))
        })?;
        let id = self.write_record(Method::POST, url, payload, &payload.name).await?;
        debug!(awb = %payload.name, zoho_id = %id, "Created Zoho shipment");
        Ok(id)
    }

    async fn update_shipment(&self, id: &str, payload: &ShipmentPayload) -> Result<String> {
        let url = record_url(System::Zoho, &self.config.shipments_api, id)?;
        let confirmed = self.write_record(Method::PUT, url, payload, id).await?;
        debug!(zoho_id = %confirmed, "Updated Zoho shipment");
        Ok(confirmed)
    }

    async fn get_shipment(&self, id: &str) -> Result<Option<ShipmentRecord>> {
        self.get_record(&self.config.shipments_api, EntityKind::Shipment, id).await
    }

    async fn get_deal(&self, id: &str) -> Result<Option<DealRecord>> {
        self.get_record(&self.config.deals_api, EntityKind::Deal, id).await
    }

    async fn get_account(&self, id: &str) -> Result<Option<AccountRecord>> {
        self.get_record(&self.config.accounts_api, EntityKind::Account, id).await
    }
}
