// REST API handlers
// Thin adapters between HTTP and the sync engine

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::types::{
    BulkSyncResponse, CreateShipmentRequest, ErrorResponse, HealthResponse, InspectionResponse,
    LoggingResponse, RunSyncRequest, ShipmentIdsRequest, ShipmentInspection, ToggleLoggingRequest,
};
use crate::engine::batch::{ShipmentSync, SyncReport};
use crate::engine::reconcile::{ReconcileReport, ReconcileStatus, Reconciler};
use crate::logging::VerboseLogging;
use crate::models::SyncMode;
use crate::SyncError;

/// Shared application state for the sync API
#[derive(Clone)]
pub struct SyncApiState {
    pub sync: Arc<ShipmentSync>,
    pub reconciler: Arc<Reconciler>,
    pub verbose: VerboseLogging,
}

impl SyncApiState {
    pub fn new(sync: Arc<ShipmentSync>, reconciler: Arc<Reconciler>, verbose: VerboseLogging) -> Self {
        Self {
            sync,
            reconciler,
            verbose,
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ErrorResponse>;

/// Turn a body rejection into our 400 shape instead of axum's plain-text reply
fn bad_body(rejection: JsonRejection) -> ErrorResponse {
    ErrorResponse::invalid_request(rejection.body_text(), "body")
}

/// Run a bulk job on its own task so a dropped connection cannot cancel it
async fn spawn_job(sync: Arc<ShipmentSync>, ids: Vec<String>, mode: SyncMode) -> Result<SyncReport, ErrorResponse> {
    let job_id = Uuid::new_v4();
    let total = ids.len();
    info!(job_id = %job_id, mode = %mode, total, "Bulk sync requested");

    match tokio::spawn(async move { sync.process(ids, mode).await }).await {
        Ok(report) => {
            info!(
                job_id = %job_id,
                mode = %mode,
                total = report.summary.total,
                successful = report.summary.successful,
                failed = report.summary.failed,
                recovered = report.drain.recovered,
                "Bulk sync finished"
            );
            Ok(report)
        }
        Err(join_error) => {
            error!(job_id = %job_id, mode = %mode, error = %join_error, "Bulk sync crashed");
            Err(SyncError::Internal(format!("sync job crashed: {join_error}")).into())
        }
    }
}

/// `POST /api/v1/create-shipment`
pub async fn create_shipments(
    State(state): State<SyncApiState>,
    payload: Result<Json<CreateShipmentRequest>, JsonRejection>,
) -> ApiResult<BulkSyncResponse> {
    let Json(request) = payload.map_err(bad_body)?;
    let awbs = request
        .awb
        .ok_or_else(|| ErrorResponse::invalid_request("AWB array is required", "AWB"))?;
    let awbs = ShipmentSync::validate_ids(awbs)
        .map_err(|e| ErrorResponse::invalid_request(e.to_string(), "AWB"))?;

    let report = spawn_job(Arc::clone(&state.sync), awbs, SyncMode::Create).await?;
    Ok(Json(BulkSyncResponse::from_report("Shipment creation completed", report)))
}

/// `PUT /api/v1/update-shipment`
pub async fn update_shipments(
    State(state): State<SyncApiState>,
    payload: Result<Json<ShipmentIdsRequest>, JsonRejection>,
) -> ApiResult<BulkSyncResponse> {
    let Json(request) = payload.map_err(bad_body)?;
    let ids = request
        .shipment_ids
        .ok_or_else(|| ErrorResponse::invalid_request("shipmentIds array is required", "shipmentIds"))?;
    let ids = ShipmentSync::validate_ids(ids)
        .map_err(|e| ErrorResponse::invalid_request(e.to_string(), "shipmentIds"))?;

    let report = spawn_job(Arc::clone(&state.sync), ids, SyncMode::Update).await?;
    Ok(Json(BulkSyncResponse::from_report("Shipment update completed", report)))
}

/// `POST /api/v1/get-shipment`
///
/// Read-only: per ID the Zoho record and the LEX record behind its AWB. Lookup
/// failures are reported per item.
pub async fn get_shipments(
    State(state): State<SyncApiState>,
    payload: Result<Json<ShipmentIdsRequest>, JsonRejection>,
) -> ApiResult<InspectionResponse> {
    let Json(request) = payload.map_err(bad_body)?;
    let ids = request
        .shipment_ids
        .ok_or_else(|| ErrorResponse::invalid_request("shipmentIds array is required", "shipmentIds"))?;
    let ids = ShipmentSync::validate_ids(ids)
        .map_err(|e| ErrorResponse::invalid_request(e.to_string(), "shipmentIds"))?;

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        results.push(inspect(&state.sync, id).await);
    }
    Ok(Json(InspectionResponse { results }))
}

async fn inspect(sync: &ShipmentSync, shipment_id: String) -> ShipmentInspection {
    let mut inspection = ShipmentInspection {
        shipment_id,
        awb: None,
        zoho: None,
        lex: None,
        error: None,
    };

    let zoho = match sync.target().get_shipment(&inspection.shipment_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            inspection.error = Some(format!("zoho shipment {} not found", inspection.shipment_id));
            return inspection;
        }
        Err(err) => {
            warn!(shipment_id = %inspection.shipment_id, error = %err, "Zoho lookup failed");
            inspection.error = Some(err.to_string());
            return inspection;
        }
    };

    inspection.awb = zoho.awb();
    inspection.zoho = Some(zoho);

    let Some(awb) = inspection.awb.clone() else {
        inspection.error = Some("zoho shipment has no AWB in Name".to_string());
        return inspection;
    };

    match sync.source().shipment_details(&awb).await {
        Ok(record) => inspection.lex = Some(record),
        Err(err) => {
            warn!(awb = %awb, error = %err, "LEX lookup failed");
            inspection.error = Some(err.to_string());
        }
    }
    inspection
}

/// `POST /api/v1/logging/toggle`
pub async fn toggle_logging(
    State(state): State<SyncApiState>,
    payload: Result<Json<ToggleLoggingRequest>, JsonRejection>,
) -> ApiResult<LoggingResponse> {
    let Json(request) = payload.map_err(bad_body)?;
    state.verbose.set(request.enable);
    info!(verbose = request.enable, "Verbose payload logging toggled");

    Ok(Json(LoggingResponse {
        message: format!("Verbose logging {}", state.verbose.status()),
        status: state.verbose.status().to_string(),
    }))
}

/// `GET /api/v1/logging/status`
pub async fn logging_status(State(state): State<SyncApiState>) -> Json<LoggingResponse> {
    Json(LoggingResponse {
        message: format!("Verbose logging is {}", state.verbose.status()),
        status: state.verbose.status().to_string(),
    })
}

/// `POST /api/v1/sync/run`
pub async fn run_sync(
    State(state): State<SyncApiState>,
    payload: Result<Json<RunSyncRequest>, JsonRejection>,
) -> ApiResult<ReconcileReport> {
    let request = match payload {
        Ok(Json(request)) => request,
        // No body at all means "yesterday"
        Err(JsonRejection::MissingJsonContentType(_)) => RunSyncRequest::default(),
        Err(rejection) => return Err(bad_body(rejection)),
    };

    let report = Arc::clone(&state.reconciler).run_isolated(request.date).await?;
    Ok(Json(report))
}

/// `GET /api/v1/sync/status`
pub async fn sync_status(State(state): State<SyncApiState>) -> Json<ReconcileStatus> {
    Json(state.reconciler.status().await)
}

/// `GET /health`
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    let error = ErrorResponse::new("The requested resource was not found", "not_found_error", None);
    (StatusCode::NOT_FOUND, Json(error))
}
