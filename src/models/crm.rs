//! Zoho CRM records read during enrichment

use serde::{Deserialize, Serialize};

use super::loose_string;

/// Lookup reference as Zoho expects it in a lookup field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub name: String,
    pub id: String,
}

/// Zoho deal ("prospect"), linked to a LEX customer through `Zoho_Deal_ID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(rename = "Deal_Name", default, deserialize_with = "loose_string")]
    pub deal_name: Option<String>,
}

impl DealRecord {
    pub fn as_ref_pair(&self) -> RecordRef {
        RecordRef {
            name: self.deal_name.clone().unwrap_or_default(),
            id: self.id.clone().unwrap_or_default(),
        }
    }
}

/// Zoho account, linked to a LEX customer through `Zoho_Cust_ID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(rename = "Account_Name", default, deserialize_with = "loose_string")]
    pub account_name: Option<String>,
}

impl AccountRecord {
    pub fn as_ref_pair(&self) -> RecordRef {
        RecordRef {
            name: self.account_name.clone().unwrap_or_default(),
            id: self.id.clone().unwrap_or_default(),
        }
    }
}
