// Daily reconciliation - decides create vs update for yesterday's shipments

//! # Reconciler
//!
//! ```text
//! Idle → FetchingWindow → Classifying → RunningCreateBatch → RunningUpdateBatch → Idle
//!            │                 │                 │                    │
//!            └──── any error ──┴─────────────────┴────────────────────┴──► Idle (logged)
//! ```
//!
//! Classification is what keeps "one Zoho shipment per AWB": an AWB whose LEX
//! record already carries a Zoho ID goes to the update list (by that ID), all
//! others go to the create list. Because a successful create writes the new ID
//! back to LEX, running the same day again classifies the AWB as an update.
//!
//! Only one run is active at a time; a run requested meanwhile is refused with
//! [`SyncError::Conflict`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use super::batch::{ShipmentSync, SyncReport};
use super::pacing::Pacer;
use super::retry::RetryPolicy;
use crate::models::SyncMode;
use crate::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    Idle,
    FetchingWindow,
    Classifying,
    RunningCreateBatch,
    RunningUpdateBatch,
}

/// AWB that could not be classified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedShipment {
    pub awb: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub date: NaiveDate,
    pub listed: usize,
    /// AWBs without a Zoho shipment
    pub to_create: Vec<String>,
    /// Zoho shipment IDs already linked to a listed AWB
    pub to_update: Vec<String>,
    pub skipped: Vec<SkippedShipment>,
    pub create: Option<SyncReport>,
    pub update: Option<SyncReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStatus {
    pub state: ReconcileState,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<ReconcileReport>,
}

impl Default for ReconcileStatus {
    fn default() -> Self {
        Self {
            state: ReconcileState::Idle,
            last_run_at: None,
            last_error: None,
            last_report: None,
        }
    }
}

pub struct Reconciler {
    sync: Arc<ShipmentSync>,
    utc_offset: Duration,
    run_lock: Mutex<()>,
    status: RwLock<ReconcileStatus>,
}

impl Reconciler {
    pub fn new(sync: Arc<ShipmentSync>, utc_offset_minutes: i32) -> Self {
        Self {
            sync,
            utc_offset: Duration::minutes(i64::from(utc_offset_minutes)),
            run_lock: Mutex::new(()),
            status: RwLock::new(ReconcileStatus::default()),
        }
    }

    /// The day before `now`, as seen from the configured UTC offset
    pub fn target_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let local_today = (now + self.utc_offset).date_naive();
        local_today.pred_opt().unwrap_or(local_today)
    }

    pub async fn status(&self) -> ReconcileStatus {
        self.status.read().await.clone()
    }

    pub async fn state(&self) -> ReconcileState {
        self.status.read().await.state
    }

    /// Reconcile `date` (default: yesterday)
    pub async fn run(&self, date: Option<NaiveDate>) -> Result<ReconcileReport> {
        let Ok(_running) = self.run_lock.try_lock() else {
            warn!("Reconciliation already running, request skipped");
            return Err(SyncError::Conflict("reconciliation already running".to_string()));
        };

        let date = date.unwrap_or_else(|| self.target_date(Utc::now()));
        info!(date = %date, "Reconciliation started");

        let result = self.execute(date).await;

        let mut status = self.status.write().await;
        status.state = ReconcileState::Idle;
        status.last_run_at = Some(Utc::now());
        match &result {
            Ok(report) => {
                info!(
                    date = %date,
                    listed = report.listed,
                    created = report.to_create.len(),
                    updated = report.to_update.len(),
                    skipped = report.skipped.len(),
                    "Reconciliation finished"
                );
                status.last_error = None;
                status.last_report = Some(report.clone());
            }
            Err(err) => {
                error!(date = %date, error = %err, "Reconciliation aborted");
                status.last_error = Some(err.to_string());
            }
        }
        result
    }

    /// Run on a separate task; a panic puts the reconciler back to idle and
    /// comes back as [`SyncError::Internal`]
    pub async fn run_isolated(self: Arc<Self>, date: Option<NaiveDate>) -> Result<ReconcileReport> {
        let reconciler = Arc::clone(&self);
        match tokio::spawn(async move { reconciler.run(date).await }).await {
            Ok(result) => result,
            Err(join_error) => {
                error!(error = %join_error, "Reconciliation panicked");
                let message = format!("reconciliation crashed: {join_error}");
                let mut status = self.status.write().await;
                status.state = ReconcileState::Idle;
                status.last_run_at = Some(Utc::now());
                status.last_error = Some(message.clone());
                Err(SyncError::Internal(message))
            }
        }
    }

    /// Entry point for the cron job; never panics and never returns an error
    pub async fn run_scheduled(self: Arc<Self>) {
        match self.run_isolated(None).await {
            Ok(_) => {}
            Err(SyncError::Conflict(_)) => warn!("Scheduled reconciliation skipped, previous run still active"),
            Err(err) => error!(error = %err, "Scheduled reconciliation failed"),
        }
    }

    async fn transition(&self, next: ReconcileState) {
        let mut status = self.status.write().await;
        info!(from = ?status.state, to = ?next, "Reconciler state changed");
        status.state = next;
    }

    async fn execute(&self, date: NaiveDate) -> Result<ReconcileReport> {
        let started_at = Utc::now();

        self.transition(ReconcileState::FetchingWindow).await;
        let listed = self.sync.source().shipments_created_between(date, date).await?;
        info!(date = %date, count = listed.len(), "Fetched shipment window");

        self.transition(ReconcileState::Classifying).await;
        let (to_create, to_update, skipped) = self.classify(&listed).await;

        self.transition(ReconcileState::RunningCreateBatch).await;
        let create = if to_create.is_empty() {
            None
        } else {
            Some(self.sync.process(to_create.clone(), SyncMode::Create).await)
        };

        self.transition(ReconcileState::RunningUpdateBatch).await;
        let update = if to_update.is_empty() {
            None
        } else {
            Some(self.sync.process(to_update.clone(), SyncMode::Update).await)
        };

        Ok(ReconcileReport {
            date,
            listed: listed.len(),
            to_create,
            to_update,
            skipped,
            create,
            update,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Split listed AWBs by whether LEX already holds a Zoho shipment ID
    async fn classify(&self, awbs: &[String]) -> (Vec<String>, Vec<String>, Vec<SkippedShipment>) {
        let tuning = self.sync.tuning();
        let pacer = Pacer::new(Arc::clone(self.sync.sleeper()), tuning.lookup_delay);
        let policy = RetryPolicy::fixed(tuning.submit_attempts, tuning.submit_delay);

        let mut seen = HashSet::new();
        let mut seen_targets = HashSet::new();
        let mut to_create = Vec::new();
        let mut to_update = Vec::new();
        let mut skipped = Vec::new();

        for awb in awbs {
            if !seen.insert(awb.as_str()) {
                continue;
            }
            if seen.len() > 1 {
                pacer.pause().await;
            }

            let lookup = policy
                .run(self.sync.sleeper().as_ref(), "classify", || {
                    self.sync.source().shipment_details(awb)
                })
                .await;

            match lookup.result {
                Ok(record) => match record.target_id() {
                    Some(target_id) => {
                        if seen_targets.insert(target_id.clone()) {
                            to_update.push(target_id);
                        }
                    }
                    None => to_create.push(awb.clone()),
                },
                Err(err) => {
                    warn!(awb = %awb, error = %err, "Could not classify shipment");
                    skipped.push(SkippedShipment {
                        awb: awb.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            create = to_create.len(),
            update = to_update.len(),
            skipped = skipped.len(),
            "Classification finished"
        );
        (to_create, to_update, skipped)
    }
}
