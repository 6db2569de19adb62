//! Sync bookkeeping: item results, failed operations and summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ShipmentPayload;

/// Which direction a batch job runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// IDs are AWBs; shipments are created in Zoho
    Create,
    /// IDs are Zoho shipment IDs; shipments are overwritten in Zoho
    Update,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Create => write!(f, "create"),
            SyncMode::Update => write!(f, "update"),
        }
    }
}

/// Pipeline stage an item failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStage {
    Fetch,
    Submit,
    WriteBack,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

/// Outcome for one input ID; `results[i]` always belongs to `ids[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub id: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<FailedStage>,
    /// Attempts spent on the stage that decided the outcome
    pub attempts: u32,
    /// Succeeded only during the drain pass
    pub recovered: bool,
}

impl ItemResult {
    pub fn success(id: impl Into<String>, awb: Option<String>, target_id: String, attempts: u32) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Success,
            awb,
            target_id: Some(target_id),
            error: None,
            stage: None,
            attempts,
            recovered: false,
        }
    }

    pub fn failure(
        id: impl Into<String>,
        awb: Option<String>,
        stage: FailedStage,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Error,
            awb,
            target_id: None,
            error: Some(error.into()),
            stage: Some(stage),
            attempts,
            recovered: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// Work left to do for an item whose immediate retries ran out
///
/// A write-back failure keeps only the Zoho ID: the shipment already exists, so
/// replaying the submit would create a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PendingWork {
    Submit {
        payload: Box<ShipmentPayload>,
        /// Known Zoho ID for updates, `None` for creates
        target_id: Option<String>,
    },
    WriteBack {
        target_id: String,
    },
}

/// An operation parked on the failed-operation queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOperation {
    /// Input ID of the item (AWB for creates, Zoho ID for updates)
    pub record_id: String,
    pub awb: String,
    pub mode: SyncMode,
    pub work: PendingWork,
    pub last_error: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl FailedOperation {
    pub fn stage(&self) -> FailedStage {
        match self.work {
            PendingWork::Submit { .. } => FailedStage::Submit,
            PendingWork::WriteBack { .. } => FailedStage::WriteBack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    Recovered,
    StillFailing,
}

/// What the drain pass did with one queued operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainOutcome {
    pub record_id: String,
    pub stage: FailedStage,
    pub status: DrainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub last_error: String,
    /// Attempts across the immediate loop and the drain pass
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    pub attempted: usize,
    pub recovered: usize,
    pub still_failing: usize,
    pub outcomes: Vec<DrainOutcome>,
}

/// Counters returned with every bulk response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Items that ran through the pipeline (excludes items of aborted batches)
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ItemResult]) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let aborted = results
            .iter()
            .filter(|r| r.stage == Some(FailedStage::Batch))
            .count();
        Self {
            total: results.len(),
            processed: results.len() - aborted,
            successful,
            failed: results.len() - successful,
        }
    }
}
