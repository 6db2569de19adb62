// Shipment models - the LEX source record and the Zoho target payload

//! # Shipment Models
//!
//! - [`ShipmentRecord`]: whatever LEX returns for an AWB, kept as a JSON map.
//!   LEX mixes strings and numbers freely, so the mapper reads it through the
//!   lenient accessors below instead of a rigid struct.
//! - [`ShipmentPayload`]: the Zoho `Shipments` module contract. Every field is
//!   always serialized; optional values serialize as `null`, never disappear.
//!
//! ## Rust Learning Notes:
//!
//! ### `#[serde(transparent)]`
//! A newtype marked transparent (de)serializes exactly like its single field, so
//! `ShipmentRecord` reads and writes as a plain JSON object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{value_to_string, RecordRef};

/// Raw LEX shipment keyed by AWB
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentRecord(pub Map<String, Value>);

impl ShipmentRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse an upstream body: either the record object or a one-element array
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Array(items) => items.into_iter().find_map(|item| match item {
                Value::Object(map) => Some(Self(map)),
                _ => None,
            }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field rendered as text; numbers and booleans are stringified
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    /// Field parsed as a finite float, from a number or a numeric string
    pub fn number(&self, key: &str) -> Option<f64> {
        let parsed = match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        parsed.is_finite().then_some(parsed)
    }

    /// The air waybill number
    pub fn awb(&self) -> Option<String> {
        self.text("Name")
            .or_else(|| self.text("AWB"))
            .or_else(|| self.text("full_awb_number"))
    }

    pub fn customer_id(&self) -> Option<String> {
        self.text("Customer_ID")
    }

    /// Zoho shipment ID already written back to LEX, if any
    ///
    /// LEX reports "no cross-reference" as a missing key, `null`, `""` or `0`.
    pub fn target_id(&self) -> Option<String> {
        ["id", "Zoho_Shipment_Id"]
            .iter()
            .filter_map(|key| self.text(key))
            .find(|id| id != "0" && !id.eq_ignore_ascii_case("null"))
    }
}

/// Zoho shipment record as submitted on create and update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPayload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Weight_Slab")]
    pub weight_slab: String,
    #[serde(rename = "Destination_State")]
    pub destination_state: String,
    #[serde(rename = "MIS_Status")]
    pub mis_status: String,
    #[serde(rename = "Customer_ID")]
    pub customer_id: String,
    #[serde(rename = "Destination_Country")]
    pub destination_country: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Final_Inv_No")]
    pub final_inv_no: String,
    #[serde(rename = "Package_Value")]
    pub package_value: Option<i64>,
    #[serde(rename = "Cust_ID_11")]
    pub cust_id_11: String,
    #[serde(rename = "Proforma_Value")]
    pub proforma_value: Option<i64>,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Billed_Weight")]
    pub billed_weight: Option<String>,
    #[serde(rename = "Proforma_No")]
    pub proforma_no: String,
    #[serde(rename = "IOSS_EORI")]
    pub ioss_eori: String,
    #[serde(rename = "Date_of_Creation")]
    pub date_of_creation: String,
    #[serde(rename = "Final_Inv_Date")]
    pub final_inv_date: String,
    #[serde(rename = "MIS_Weight")]
    pub mis_weight: String,
    #[serde(rename = "Record_Status__s")]
    pub record_status: String,
    #[serde(rename = "Customer_Types")]
    pub customer_types: String,
    #[serde(rename = "Seller_Name")]
    pub seller_name: Option<RecordRef>,
    #[serde(rename = "Seller_ID")]
    pub seller_id: String,
    #[serde(rename = "Service_Type")]
    pub service_type: String,
    #[serde(rename = "Billed_Wt")]
    pub billed_wt: Option<String>,
    #[serde(rename = "Product_Type")]
    pub product_type: String,
    #[serde(rename = "MAWB")]
    pub mawb: String,
    #[serde(rename = "Value_Currency")]
    pub value_currency: String,
    #[serde(rename = "Blue_Dart_Delivered_Date")]
    pub blue_dart_delivered_date: String,
    #[serde(rename = "Booked_Date")]
    pub booked_date: String,
    #[serde(rename = "Created_Time")]
    pub created_time: String,
    #[serde(rename = "Picked_Date")]
    pub picked_date: String,
    #[serde(rename = "Create_Pick_Up_Date")]
    pub create_pick_up_date: String,
    #[serde(rename = "Receival_Scan_Date")]
    pub receival_scan_date: String,
    #[serde(rename = "Bagged_Date")]
    pub bagged_date: String,
    #[serde(rename = "Sent_for_Customs_Clearance")]
    pub sent_for_customs_clearance: String,
    #[serde(rename = "Customs_Cleared")]
    pub customs_cleared: String,
    #[serde(rename = "Uplifted")]
    pub uplifted: String,
    #[serde(rename = "Arrived_at_International_Hub_Date")]
    pub arrived_at_international_hub_date: String,
    #[serde(rename = "Delivered_Date")]
    pub delivered_date: String,
    #[serde(rename = "Held_at_Customs")]
    pub held_at_customs: String,
    #[serde(rename = "Date_of_Cancellation")]
    pub date_of_cancellation: String,
    #[serde(rename = "Sales_Person_Name")]
    pub sales_person_name: String,
    #[serde(rename = "Prospect_Name")]
    pub prospect_name: Option<RecordRef>,
    #[serde(rename = "Cust_ID_s")]
    pub cust_id_s: Option<RecordRef>,
    #[serde(rename = "HS_Code")]
    pub hs_code: String,
}
