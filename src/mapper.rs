//! LEX → Zoho shipment mapping
//!
//! Pure and deterministic: no I/O, no clock, no randomness. Mapping the same
//! record twice gives byte-identical payloads, which is what makes updates safe
//! to replay.
//!
//! Fallback policy, applied uniformly:
//!
//! | field kind | missing / unparseable |
//! |------------|-----------------------|
//! | text       | `""`                  |
//! | date       | `""`                  |
//! | numeric    | `null`                |
//! | reference  | `null`                |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::models::{AccountRecord, DealRecord, ShipmentPayload, ShipmentRecord};

/// Zoho rejects longer descriptions
pub const DESCRIPTION_MAX_CHARS: usize = 255;
/// Zoho rejects longer tariff codes
pub const HS_CODE_MAX_CHARS: usize = 9;
/// Value written to `Seller_ID` when LEX does not send one
pub const DEFAULT_SELLER_ID: &str = "LEX";

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Build the Zoho payload for a LEX shipment and its resolved references
pub fn map_shipment(
    record: &ShipmentRecord,
    deal: Option<&DealRecord>,
    account: Option<&AccountRecord>,
) -> ShipmentPayload {
    let text = |key: &str| record.text(key).unwrap_or_default();
    let date = |key: &str| record.text(key).map(|raw| normalize_date(&raw)).unwrap_or_default();
    let whole = |key: &str| record.number(key).map(round_whole);
    let decimal = |key: &str| record.number(key).map(|v| format!("{v:.2}"));

    let deal_ref = deal.map(DealRecord::as_ref_pair);

    ShipmentPayload {
        name: text("Name"),
        currency: text("Currency"),
        weight_slab: text("Weight_Slab"),
        destination_state: text("Destination_State"),
        mis_status: text("MIS_Status"),
        customer_id: text("Customer_ID"),
        destination_country: text("Destination_Country"),
        country: text("Country"),
        final_inv_no: text("Final_Inv_No"),
        package_value: whole("Package_Value"),
        cust_id_11: text("Cust_ID_11"),
        proforma_value: whole("Proforma_Value"),
        description: truncate_chars(&text("Description"), DESCRIPTION_MAX_CHARS),
        billed_weight: decimal("Billed_Weight"),
        proforma_no: text("Proforma_No"),
        ioss_eori: text("IOSS_EORI"),
        date_of_creation: date("Date_of_Creation"),
        final_inv_date: date("Final_Inv_Date"),
        mis_weight: text("MIS_Weight"),
        record_status: text("Record_Status__s"),
        customer_types: text("Customer_Types"),
        seller_name: deal_ref.clone(),
        seller_id: record
            .text("Seller_ID")
            .unwrap_or_else(|| DEFAULT_SELLER_ID.to_string()),
        service_type: text("Service_Type"),
        billed_wt: decimal("Billed_Wt"),
        product_type: text("Product_Type"),
        mawb: text("MAWB"),
        value_currency: text("Value_Currency"),
        blue_dart_delivered_date: date("Blue_Dart_Delivered_Date"),
        booked_date: date("Booked_Date"),
        created_time: date("Created_Time"),
        picked_date: date("Picked_Date"),
        create_pick_up_date: date("Create_Pick_Up_Date"),
        receival_scan_date: date("Receival_Scan_Date"),
        bagged_date: date("Bagged_Date"),
        sent_for_customs_clearance: date("Sent_for_Customs_Clearance"),
        customs_cleared: date("Customs_Cleared"),
        uplifted: date("Uplifted"),
        arrived_at_international_hub_date: date("Arrived_at_International_Hub_Date"),
        delivered_date: date("Delivered_Date"),
        held_at_customs: date("Held_at_Customs"),
        date_of_cancellation: date("Date_of_Cancellation"),
        sales_person_name: text("Sales_Person_Name"),
        prospect_name: deal_ref,
        cust_id_s: account.map(AccountRecord::as_ref_pair),
        hs_code: truncate_chars(
            &record.text("HS_CODE").or_else(|| record.text("HS_Code")).unwrap_or_default(),
            HS_CODE_MAX_CHARS,
        ),
    }
}

/// Normalize an upstream date to `YYYY-MM-DD`
///
/// Accepts RFC 3339 / ISO 8601 timestamps (converted to UTC first), bare ISO
/// dates, `DD-MM-YYYY` and `DD/MM/YYYY`. Anything else yields an empty string.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => {
            if !raw.trim().is_empty() {
                debug!(raw, "unparseable date mapped to empty string");
            }
            String::new()
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        })
}

fn round_whole(value: f64) -> i64 {
    value.round() as i64
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
