// REST API request and response types
// Wire shapes for the /api/v1 endpoints

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::batch::SyncReport;
use crate::models::{BatchSummary, DrainStatus, FailedStage, ItemResult, ShipmentRecord};
use crate::SyncError;

/// `POST /api/v1/create-shipment`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    /// AWBs to create in Zoho; a missing key is reported as a 400, not a 422
    #[serde(rename = "AWB", default)]
    pub awb: Option<Vec<String>>,
}

/// `PUT /api/v1/update-shipment` and `POST /api/v1/get-shipment`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentIdsRequest {
    #[serde(rename = "shipmentIds", default)]
    pub shipment_ids: Option<Vec<String>>,
}

/// `POST /api/v1/logging/toggle`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleLoggingRequest {
    pub enable: bool,
}

/// `POST /api/v1/sync/run`; an absent body reconciles "yesterday"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSyncRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// One entry of `failedUpdates`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpdate {
    pub stage: FailedStage,
    pub last_error: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
    pub drain_status: DrainStatus,
}

/// Response of the bulk create and update endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncResponse {
    pub message: String,
    pub summary: BatchSummary,
    pub results: Vec<ItemResult>,
    /// Keyed by input ID; only items that went through the drain pass
    pub failed_updates: BTreeMap<String, FailedUpdate>,
}

impl BulkSyncResponse {
    pub fn from_report(message: impl Into<String>, report: SyncReport) -> Self {
        let failed_updates = report
            .drain
            .outcomes
            .into_iter()
            .map(|outcome| {
                (
                    outcome.record_id,
                    FailedUpdate {
                        stage: outcome.stage,
                        last_error: outcome.last_error,
                        retry_count: outcome.retry_count,
                        timestamp: outcome.timestamp,
                        drain_status: outcome.status,
                    },
                )
            })
            .collect();

        Self {
            message: message.into(),
            summary: report.summary,
            results: report.results,
            failed_updates,
        }
    }
}

/// Zoho shipment plus the LEX details behind it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentInspection {
    pub shipment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awb: Option<String>,
    pub zoho: Option<ShipmentRecord>,
    pub lex: Option<ShipmentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionResponse {
    pub results: Vec<ShipmentInspection>,
}

/// `{message, status}` for the logging endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,

    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,

    /// Request field that caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>, param: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: error_type.into(),
                param,
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>, param: &str) -> Self {
        Self::new(message, "invalid_request_error", Some(param.to_string()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.error_type.as_str() {
            "invalid_request_error" => StatusCode::BAD_REQUEST,
            "not_found_error" => StatusCode::NOT_FOUND,
            "conflict_error" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SyncError> for ErrorResponse {
    fn from(err: SyncError) -> Self {
        let error_type = match &err {
            SyncError::Validation(_) => "invalid_request_error",
            SyncError::Conflict(_) => "conflict_error",
            SyncError::NotFound { .. } => "not_found_error",
            SyncError::Upstream { .. }
            | SyncError::Rejected { .. }
            | SyncError::Transport { .. }
            | SyncError::Decode { .. }
            | SyncError::Token { .. } => "upstream_error",
            SyncError::Config(_) | SyncError::BatchAborted(_) | SyncError::Internal(_) => "internal_error",
        };
        Self::new(err.to_string(), error_type, None)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
