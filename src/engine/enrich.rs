//! Deal/account enrichment
//!
//! The LEX customer record carries the two Zoho cross-references. The resolver
//! looks the customer up once, then fetches the deal and the account side by
//! side. Every failure degrades to `None` for the affected side; enrichment never
//! fails an item.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::{SourceSystem, TargetSystem};
use crate::models::{AccountRecord, DealRecord};

/// Resolved references for one shipment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub deal: Option<DealRecord>,
    pub account: Option<AccountRecord>,
}

#[derive(Clone)]
pub struct EnrichmentResolver {
    source: Arc<dyn SourceSystem>,
    target: Arc<dyn TargetSystem>,
}

impl EnrichmentResolver {
    pub fn new(source: Arc<dyn SourceSystem>, target: Arc<dyn TargetSystem>) -> Self {
        Self { source, target }
    }

    pub async fn enrich(&self, customer_id: Option<&str>) -> Enrichment {
        let Some(customer_id) = customer_id else {
            debug!("Shipment has no customer, skipping enrichment");
            return Enrichment::default();
        };

        let customer = match self.source.customer_details(customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                debug!(customer_id, "LEX has no such customer");
                return Enrichment::default();
            }
            Err(err) => {
                warn!(customer_id, error = %err, "Customer lookup failed, enrichment skipped");
                return Enrichment::default();
            }
        };

        let (deal, account) = tokio::join!(
            self.resolve_deal(customer_id, customer.zoho_deal_id.as_deref()),
            self.resolve_account(customer_id, customer.zoho_account_id.as_deref()),
        );
        Enrichment { deal, account }
    }

    async fn resolve_deal(&self, customer_id: &str, deal_id: Option<&str>) -> Option<DealRecord> {
        let deal_id = deal_id?;
        match self.target.get_deal(deal_id).await {
            Ok(deal) => deal,
            Err(err) => {
                warn!(customer_id, deal_id, error = %err, "Deal lookup failed");
                None
            }
        }
    }

    async fn resolve_account(&self, customer_id: &str, account_id: Option<&str>) -> Option<AccountRecord> {
        let account_id = account_id?;
        match self.target.get_account(account_id).await {
            Ok(account) => account,
            Err(err) => {
                warn!(customer_id, account_id, error = %err, "Account lookup failed");
                None
            }
        }
    }
}
