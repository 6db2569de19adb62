//! In-memory LEX and Zoho doubles for engine tests
//!
//! Both fakes script their failures up front (fail N times, then succeed) and
//! keep enough state to assert on afterwards: write-backs recorded on LEX,
//! created and updated shipments stored on Zoho.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::clients::{SourceSystem, TargetSystem};
use crate::models::{AccountRecord, CustomerRecord, DealRecord, ShipmentPayload, ShipmentRecord};
use crate::{Result, SyncError, System};

fn unavailable(system: System) -> SyncError {
    SyncError::Upstream {
        system,
        status: 503,
        body: "service unavailable".to_string(),
    }
}

/// Decrement a scripted failure counter; true while failures remain
fn take_failure(failures: &Mutex<HashMap<String, u32>>, key: &str) -> bool {
    let mut failures = failures.lock().unwrap();
    match failures.get_mut(key) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

#[derive(Default)]
pub struct FakeLex {
    shipments: Mutex<HashMap<String, ShipmentRecord>>,
    customers: HashMap<String, CustomerRecord>,
    listing: Vec<String>,
    customer_lookups_fail: bool,
    listing_fails: bool,
    listing_panics: bool,
    fetch_failures: Mutex<HashMap<String, u32>>,
    write_back_failures: Mutex<HashMap<String, u32>>,
    write_backs: Mutex<Vec<(String, String)>>,
    fetches: AtomicUsize,
}

impl FakeLex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shipment(self, awb: &str, record: Value) -> Self {
        let record = ShipmentRecord::from_value(record).unwrap();
        self.shipments.lock().unwrap().insert(awb.to_string(), record);
        self
    }

    /// Minimal shipment owned by customer 1021
    pub fn with_basic_shipment(self, awb: &str) -> Self {
        self.with_shipment(
            awb,
            serde_json::json!({"Name": awb, "Customer_ID": "1021", "Booked_Date": "05-03-2024"}),
        )
    }

    pub fn with_customer(mut self, id: &str, customer: CustomerRecord) -> Self {
        self.customers.insert(id.to_string(), customer);
        self
    }

    pub fn with_listing(mut self, awbs: &[&str]) -> Self {
        self.listing = awbs.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn failing_customer_lookups(mut self) -> Self {
        self.customer_lookups_fail = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn panicking_listing(mut self) -> Self {
        self.listing_panics = true;
        self
    }

    pub fn failing_fetch(self, awb: &str, times: u32) -> Self {
        self.fetch_failures.lock().unwrap().insert(awb.to_string(), times);
        self
    }

    pub fn failing_write_back(self, awb: &str, times: u32) -> Self {
        self.write_back_failures.lock().unwrap().insert(awb.to_string(), times);
        self
    }

    pub fn write_backs(&self) -> Vec<(String, String)> {
        self.write_backs.lock().unwrap().clone()
    }

    pub fn shipment(&self, awb: &str) -> Option<ShipmentRecord> {
        self.shipments.lock().unwrap().get(awb).cloned()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceSystem for FakeLex {
    async fn shipment_details(&self, awb: &str) -> Result<ShipmentRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fetch_failures, awb) {
            return Err(unavailable(System::Lex));
        }
        self.shipment(awb).ok_or_else(|| SyncError::NotFound {
            system: System::Lex,
            entity: "shipment".to_string(),
            id: awb.to_string(),
        })
    }

    async fn customer_details(&self, customer_id: &str) -> Result<Option<CustomerRecord>> {
        if self.customer_lookups_fail {
            return Err(SyncError::Transport {
                system: System::Lex,
                message: "connection reset".to_string(),
            });
        }
        Ok(self.customers.get(customer_id).cloned())
    }

    async fn write_back_shipment_id(&self, awb: &str, target_id: &str) -> Result<()> {
        if take_failure(&self.write_back_failures, awb) {
            return Err(unavailable(System::Lex));
        }
        self.write_backs
            .lock()
            .unwrap()
            .push((awb.to_string(), target_id.to_string()));
        if let Some(record) = self.shipments.lock().unwrap().get_mut(awb) {
            record.0.insert("id".to_string(), Value::String(target_id.to_string()));
        }
        Ok(())
    }

    async fn shipments_created_between(&self, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<String>> {
        if self.listing_panics {
            panic!("listing exploded");
        }
        if self.listing_fails {
            return Err(unavailable(System::Lex));
        }
        Ok(self.listing.clone())
    }
}

#[derive(Default)]
pub struct FakeZoho {
    records: Mutex<HashMap<String, ShipmentPayload>>,
    next_id: AtomicU64,
    deals: HashMap<String, DealRecord>,
    accounts: HashMap<String, AccountRecord>,
    deal_lookups_fail: bool,
    submit_failures: Mutex<HashMap<String, u32>>,
    rejected: HashSet<String>,
    panic_on: Option<String>,
    jitter: bool,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl FakeZoho {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deal(mut self, id: &str, name: &str) -> Self {
        self.deals.insert(
            id.to_string(),
            DealRecord {
                id: Some(id.to_string()),
                deal_name: Some(name.to_string()),
            },
        );
        self
    }

    pub fn with_account(mut self, id: &str, name: &str) -> Self {
        self.accounts.insert(
            id.to_string(),
            AccountRecord {
                id: Some(id.to_string()),
                account_name: Some(name.to_string()),
            },
        );
        self
    }

    /// Existing shipment `id` whose `Name` is `awb`
    pub fn with_shipment(self, id: &str, awb: &str) -> Self {
        let payload = ShipmentPayload {
            name: awb.to_string(),
            ..ShipmentPayload::default()
        };
        self.records.lock().unwrap().insert(id.to_string(), payload);
        self
    }

    pub fn failing_deal_lookups(mut self) -> Self {
        self.deal_lookups_fail = true;
        self
    }

    /// Submits for `awb` fail transiently `times` times
    pub fn failing_submit(self, awb: &str, times: u32) -> Self {
        self.submit_failures.lock().unwrap().insert(awb.to_string(), times);
        self
    }

    /// Submits for `awb` are rejected as invalid data
    pub fn rejecting(mut self, awb: &str) -> Self {
        self.rejected.insert(awb.to_string());
        self
    }

    pub fn panicking_on(mut self, awb: &str) -> Self {
        self.panic_on = Some(awb.to_string());
        self
    }

    /// Vary call latency per AWB so completion order differs from input order
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn payload(&self, id: &str) -> Option<ShipmentPayload> {
        self.records.lock().unwrap().get(id).cloned()
    }

    /// Number of stored shipments whose `Name` is `awb`
    pub fn shipments_named(&self, awb: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|payload| payload.name == awb)
            .count()
    }

    async fn before_submit(&self, payload: &ShipmentPayload) -> Result<()> {
        if self.jitter {
            let spread: u64 = payload.name.bytes().map(u64::from).sum::<u64>() % 7;
            tokio::time::sleep(Duration::from_millis(spread)).await;
        }
        if self.panic_on.as_deref() == Some(payload.name.as_str()) {
            panic!("fake zoho exploded on {}", payload.name);
        }
        if take_failure(&self.submit_failures, &payload.name) {
            return Err(unavailable(System::Zoho));
        }
        if self.rejected.contains(&payload.name) {
            return Err(SyncError::Rejected {
                system: System::Zoho,
                message: "INVALID_DATA: invalid data".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TargetSystem for FakeZoho {
    async fn create_shipment(&self, payload: &ShipmentPayload) -> Result<String> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.before_submit(payload).await?;
        let id = format!("ZS{:04}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.records.lock().unwrap().insert(id.clone(), payload.clone());
        Ok(id)
    }

    async fn update_shipment(&self, id: &str, payload: &ShipmentPayload) -> Result<String> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.before_submit(payload).await?;
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(id) {
            return Err(SyncError::NotFound {
                system: System::Zoho,
                entity: "shipment".to_string(),
                id: id.to_string(),
            });
        }
        records.insert(id.to_string(), payload.clone());
        Ok(id.to_string())
    }

    async fn get_shipment(&self, id: &str) -> Result<Option<ShipmentRecord>> {
        let Some(payload) = self.payload(id) else {
            return Ok(None);
        };
        let mut record = ShipmentRecord::from_value(serde_json::to_value(payload).unwrap()).unwrap();
        record.0.insert("id".to_string(), Value::String(id.to_string()));
        Ok(Some(record))
    }

    async fn get_deal(&self, id: &str) -> Result<Option<DealRecord>> {
        if self.deal_lookups_fail {
            return Err(unavailable(System::Zoho));
        }
        Ok(self.deals.get(id).cloned())
    }

    async fn get_account(&self, id: &str) -> Result<Option<AccountRecord>> {
        Ok(self.accounts.get(id).cloned())
    }
}
