//! Shared fixtures for the HTTP-level tests
//!
//! Every test gets its own wiremock `MockServer`; both upstreams are mounted on
//! it under different path prefixes so one server stands in for LEX and Zoho.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lex_zoho_sync::config::ZohoAuthConfig;
use lex_zoho_sync::{
    LexClient, LexConfig, OAuthTokenManager, ShipmentSync, StaticToken, SyncTuning, TokenProvider, ZohoClient,
    ZohoConfig,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LEX_DETAILS: &str = "/lex/details";
pub const LEX_UPDATE: &str = "/lex/update";
pub const LEX_CUSTOMER: &str = "/lex/customer";
pub const LEX_LIST: &str = "/lex/list";
pub const ZOHO_SHIPMENTS: &str = "/crm/v2/Shipments";
pub const ZOHO_DEALS: &str = "/crm/v2/Deals";
pub const ZOHO_ACCOUNTS: &str = "/crm/v2/Accounts";
pub const ZOHO_TOKEN_URL: &str = "/oauth/v2/token";

pub const SHIPMENT_TOKEN: &str = "ship-token";
pub const CUSTOMER_TOKEN: &str = "cust-token";
pub const ZOHO_TOKEN: &str = "1000.test";

pub fn lex_config(server: &MockServer) -> LexConfig {
    LexConfig {
        shipment_api: format!("{}{}", server.uri(), LEX_DETAILS),
        update_shipment_api: format!("{}{}", server.uri(), LEX_UPDATE),
        customer_detail_api: format!("{}{}", server.uri(), LEX_CUSTOMER),
        shipment_list_api: format!("{}{}", server.uri(), LEX_LIST),
        shipment_token: SHIPMENT_TOKEN.to_string(),
        customer_token: CUSTOMER_TOKEN.to_string(),
        timeout: Duration::from_secs(5),
    }
}

pub fn zoho_config(server: &MockServer) -> ZohoConfig {
    ZohoConfig {
        shipments_api: format!("{}{}", server.uri(), ZOHO_SHIPMENTS),
        deals_api: format!("{}{}", server.uri(), ZOHO_DEALS),
        accounts_api: format!("{}{}", server.uri(), ZOHO_ACCOUNTS),
        auth: ZohoAuthConfig::Static(ZOHO_TOKEN.to_string()),
        timeout: Duration::from_secs(5),
    }
}

pub fn lex_client(server: &MockServer) -> LexClient {
    LexClient::new(lex_config(server)).unwrap()
}

pub fn zoho_client(server: &MockServer) -> ZohoClient {
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(ZOHO_TOKEN));
    ZohoClient::new(zoho_config(server), tokens).unwrap()
}

/// Default retry budgets with every delay removed
pub fn fast_tuning() -> SyncTuning {
    SyncTuning {
        batch_size: 10,
        concurrency: 10,
        batch_delay: Duration::ZERO,
        lookup_delay: Duration::ZERO,
        submit_delay: Duration::ZERO,
        writeback_base_delay: Duration::ZERO,
        drain_delay: Duration::ZERO,
        ..SyncTuning::default()
    }
}

pub fn sync_engine(server: &MockServer) -> Arc<ShipmentSync> {
    Arc::new(ShipmentSync::new(
        Arc::new(lex_client(server)),
        Arc::new(zoho_client(server)),
        fast_tuning(),
    ))
}

/// Engine whose Zoho client refreshes tokens against the mocked accounts server
pub fn oauth_sync_engine(server: &MockServer) -> Arc<ShipmentSync> {
    let tokens: Arc<dyn TokenProvider> = Arc::new(
        OAuthTokenManager::new(
            "client-id",
            "client-secret",
            "refresh-token",
            format!("{}{}", server.uri(), ZOHO_TOKEN_URL),
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let zoho = ZohoClient::new(zoho_config(server), tokens).unwrap();
    Arc::new(ShipmentSync::new(
        Arc::new(lex_client(server)),
        Arc::new(zoho),
        fast_tuning(),
    ))
}

/// A LEX shipment as the details endpoint returns it
pub fn lex_shipment(awb: &str) -> Value {
    json!([{
        "Name": awb,
        "Customer_ID": 1021,
        "Booked_Date": "05-03-2024",
        "Package_Value": "1499.6",
        "Billed_Weight": 2.5,
        "Description": "Handicrafts"
    }])
}

pub fn lex_customer() -> Value {
    json!([{
        "Customer_Id": 1021,
        "Zoho_Deal_ID": "D1",
        "Zoho_Cust_ID": "A1"
    }])
}

pub fn zoho_deal() -> Value {
    json!({"data": [{"id": "D1", "Deal_Name": "Acme Exports"}]})
}

pub fn zoho_account() -> Value {
    json!({"data": [{"id": "A1", "Account_Name": "Acme Pvt Ltd"}]})
}

pub fn zoho_written(id: &str) -> Value {
    json!({"data": [{
        "code": "SUCCESS",
        "details": {"id": id},
        "message": "record added",
        "status": "success"
    }]})
}

/// Customer, deal and account lookups used by every enrichment
pub async fn mount_enrichment(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LEX_CUSTOMER))
        .respond_with(ResponseTemplate::new(200).set_body_json(lex_customer()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ZOHO_DEALS}/D1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(zoho_deal()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ZOHO_ACCOUNTS}/A1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(zoho_account()))
        .mount(server)
        .await;
}

/// LEX details for `awb`
pub async fn mount_lex_shipment(server: &MockServer, awb: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(LEX_DETAILS))
        .and(query_param("AWB", awb))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
