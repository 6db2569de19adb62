//! LEX customer record

use serde::{Deserialize, Serialize};

use super::loose_string;

/// Customer as returned by the LEX customer-detail endpoint
///
/// Only the fields the sync needs are typed; the two Zoho cross-references are
/// the join keys used by the enrichment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(rename = "Customer_Id", alias = "Customer_ID", default, deserialize_with = "loose_string")]
    pub customer_id: Option<String>,

    #[serde(rename = "Zoho_Deal_ID", default, deserialize_with = "loose_string")]
    pub zoho_deal_id: Option<String>,

    #[serde(rename = "Zoho_Cust_ID", default, deserialize_with = "loose_string")]
    pub zoho_account_id: Option<String>,
}
