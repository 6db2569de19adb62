// Batch Processor - the shipment create/update pipeline

//! # Shipment Sync
//!
//! [`ShipmentSync::process`] takes an ordered ID list and a [`SyncMode`]:
//!
//! ```text
//! ids ──chunks(B)──► batch 1 ──pause──► batch 2 ──pause──► ... ──► drain pass
//!                      │
//!                      └─ up to `concurrency` items at once:
//!                         fetch → enrich → map → submit → write-back
//! ```
//!
//! - `results[i]` always belongs to `ids[i]`, whatever order items finish in.
//! - A batch finishes completely before the next one starts.
//! - Fetch and submit retry on a fixed delay; write-back retries with
//!   exponential backoff. Only transient errors are retried.
//! - An item whose submit or write-back runs out of attempts is parked on the
//!   job's [`FailedOperationQueue`]. A write-back failure parks only the Zoho
//!   ID, so a later retry never creates the shipment a second time.
//! - A panic anywhere inside a batch fails every item of that batch with stage
//!   `batch`; the next batch still runs.
//! - Once all batches are done the queue is drained with its own budget.
//!
//! ## Rust Learning Notes:
//!
//! ### Ordered bounded concurrency
//! `stream::iter(..).map(..).buffered(n)` polls up to `n` futures at once but
//! yields their outputs in input order, which is exactly the index guarantee we
//! need without any sorting afterwards.
//!
//! ### `catch_unwind` on a future
//! `FutureExt::catch_unwind` turns a panic inside the batch future into an
//! `Err`. `AssertUnwindSafe` is required because the future borrows `&self`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::enrich::EnrichmentResolver;
use super::pacing::{Pacer, Sleeper, TokioSleeper};
use super::queue::FailedOperationQueue;
use super::retry::RetryPolicy;
use crate::clients::{SourceSystem, TargetSystem};
use crate::config::SyncTuning;
use crate::logging::VerboseLogging;
use crate::mapper::map_shipment;
use crate::models::{
    BatchSummary, DrainOutcome, DrainStatus, DrainSummary, FailedOperation, FailedStage,
    ItemResult, ItemStatus, PendingWork, ShipmentPayload, ShipmentRecord, SyncMode,
};
use crate::{Result, SyncError, System};

/// Everything a bulk job produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub mode: SyncMode,
    pub summary: BatchSummary,
    pub results: Vec<ItemResult>,
    pub drain: DrainSummary,
}

/// Result of the submit + write-back tail of the pipeline
enum Delivery {
    Done { target_id: String, attempts: u32 },
    Failed { item: ItemResult, operation: Option<FailedOperation> },
}

/// The create/update engine shared by the HTTP API, the scheduler and the CLI
#[derive(Clone)]
pub struct ShipmentSync {
    source: Arc<dyn SourceSystem>,
    target: Arc<dyn TargetSystem>,
    resolver: EnrichmentResolver,
    tuning: SyncTuning,
    sleeper: Arc<dyn Sleeper>,
    verbose: VerboseLogging,
}

impl ShipmentSync {
    pub fn new(source: Arc<dyn SourceSystem>, target: Arc<dyn TargetSystem>, tuning: SyncTuning) -> Self {
        Self {
            resolver: EnrichmentResolver::new(Arc::clone(&source), Arc::clone(&target)),
            source,
            target,
            tuning,
            sleeper: Arc::new(TokioSleeper),
            verbose: VerboseLogging::default(),
        }
    }

    /// Replace the timer used for pauses and retry delays
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_verbose_logging(mut self, verbose: VerboseLogging) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn tuning(&self) -> &SyncTuning {
        &self.tuning
    }

    pub fn source(&self) -> &Arc<dyn SourceSystem> {
        &self.source
    }

    pub fn target(&self) -> &Arc<dyn TargetSystem> {
        &self.target
    }

    pub(crate) fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Reject empty lists and blank IDs; returns the trimmed IDs
    pub fn validate_ids(ids: Vec<String>) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Err(SyncError::Validation("ID list must not be empty".to_string()));
        }
        let trimmed: Vec<String> = ids.into_iter().map(|id| id.trim().to_string()).collect();
        if let Some(position) = trimmed.iter().position(String::is_empty) {
            return Err(SyncError::Validation(format!("ID at position {position} is blank")));
        }
        Ok(trimmed)
    }

    /// Validate, then process
    pub async fn run_job(&self, ids: Vec<String>, mode: SyncMode) -> Result<SyncReport> {
        let ids = Self::validate_ids(ids)?;
        Ok(self.process(ids, mode).await)
    }

    /// Run the full pipeline over `ids`; never fails, every outcome is in the report
    pub async fn process(&self, ids: Vec<String>, mode: SyncMode) -> SyncReport {
        let queue = FailedOperationQueue::new();
        let pacer = Pacer::new(Arc::clone(&self.sleeper), self.tuning.batch_delay);
        let batch_size = self.tuning.batch_size.max(1);
        let concurrency = self.tuning.concurrency.max(1);
        let batch_count = ids.len().div_ceil(batch_size);

        info!(mode = %mode, items = ids.len(), batches = batch_count, batch_size, "Starting sync job");

        let mut results = Vec::with_capacity(ids.len());
        for (index, batch) in ids.chunks(batch_size).enumerate() {
            if index > 0 {
                pacer.pause().await;
            }
            debug!(batch = index + 1, of = batch_count, size = batch.len(), "Processing batch");

            let run = stream::iter(batch.iter().cloned())
                .map(|id| self.process_item(id, mode, &queue))
                .buffered(concurrency)
                .collect::<Vec<_>>();

            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(batch_results) => results.extend(batch_results),
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(batch = index + 1, reason = %reason, "Batch aborted, marking all items failed");
                    let error = SyncError::BatchAborted(reason).to_string();
                    results.extend(
                        batch
                            .iter()
                            .map(|id| ItemResult::failure(id.clone(), None, FailedStage::Batch, error.clone(), 0)),
                    );
                }
            }
        }

        let drain = self.drain(&queue, &mut results).await;
        let summary = BatchSummary::from_results(&results);

        info!(
            mode = %mode,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            recovered = drain.recovered,
            still_failing = drain.still_failing,
            "Sync job finished"
        );

        SyncReport {
            mode,
            summary,
            results,
            drain,
        }
    }

    async fn process_item(&self, id: String, mode: SyncMode, queue: &FailedOperationQueue) -> ItemResult {
        let (item, operation) = match mode {
            SyncMode::Create => self.create_item(id).await,
            SyncMode::Update => self.update_item(id).await,
        };
        if let Some(operation) = operation {
            queue.enqueue(operation).await;
        }
        item
    }

    async fn create_item(&self, awb: String) -> (ItemResult, Option<FailedOperation>) {
        let record = match self.fetch_lex(&awb).await {
            Ok(record) => record,
            Err(item) => return (*item, None),
        };
        let payload = self.build_payload(&awb, &record).await;

        match self.deliver(&awb, &awb, SyncMode::Create, payload, None).await {
            Delivery::Done { target_id, attempts } => {
                info!(awb = %awb, zoho_id = %target_id, "Shipment created");
                (ItemResult::success(awb.clone(), Some(awb), target_id, attempts), None)
            }
            Delivery::Failed { item, operation } => (item, operation),
        }
    }

    async fn update_item(&self, shipment_id: String) -> (ItemResult, Option<FailedOperation>) {
        let fetch = self.fetch_policy();
        let fetched = fetch
            .run(self.sleeper.as_ref(), "fetch_zoho_shipment", || self.target.get_shipment(&shipment_id))
            .await;

        let zoho_record = match fetched.result {
            Ok(Some(record)) => record,
            Ok(None) => {
                let err = SyncError::NotFound {
                    system: System::Zoho,
                    entity: "shipment".to_string(),
                    id: shipment_id.clone(),
                };
                return (
                    ItemResult::failure(shipment_id, None, FailedStage::Fetch, err.to_string(), fetched.attempts),
                    None,
                );
            }
            Err(err) => {
                warn!(shipment_id = %shipment_id, error = %err, "Zoho shipment fetch failed");
                return (
                    ItemResult::failure(shipment_id, None, FailedStage::Fetch, err.to_string(), fetched.attempts),
                    None,
                );
            }
        };

        let Some(awb) = zoho_record.awb() else {
            let message = format!("zoho shipment {shipment_id} has no AWB in Name");
            return (
                ItemResult::failure(shipment_id, None, FailedStage::Fetch, message, fetched.attempts),
                None,
            );
        };

        let record = match self.fetch_lex(&awb).await {
            Ok(record) => record,
            Err(mut item) => {
                item.id = shipment_id;
                return (*item, None);
            }
        };
        let payload = self.build_payload(&awb, &record).await;

        match self
            .deliver(&shipment_id, &awb, SyncMode::Update, payload, Some(shipment_id.clone()))
            .await
        {
            Delivery::Done { target_id, attempts } => {
                info!(awb = %awb, zoho_id = %target_id, "Shipment updated");
                (ItemResult::success(shipment_id, Some(awb), target_id, attempts), None)
            }
            Delivery::Failed { item, operation } => (item, operation),
        }
    }

    /// LEX details with the fixed retry policy; a failure is a finished item
    async fn fetch_lex(&self, awb: &str) -> std::result::Result<ShipmentRecord, Box<ItemResult>> {
        let fetched = self
            .fetch_policy()
            .run(self.sleeper.as_ref(), "fetch_lex_shipment", || self.source.shipment_details(awb))
            .await;

        fetched.result.map_err(|err| {
            warn!(awb, error = %err, "LEX shipment fetch failed");
            Box::new(ItemResult::failure(
                awb.to_string(),
                Some(awb.to_string()),
                FailedStage::Fetch,
                err.to_string(),
                fetched.attempts,
            ))
        })
    }

    async fn build_payload(&self, awb: &str, record: &ShipmentRecord) -> ShipmentPayload {
        crate::log_payload!(self.verbose, record, awb, "LEX shipment record");
        let customer_id = record.customer_id();
        let enrichment = self.resolver.enrich(customer_id.as_deref()).await;
        let mut payload = map_shipment(record, enrichment.deal.as_ref(), enrichment.account.as_ref());
        // Name carries the AWB, the only link from a Zoho shipment back to LEX
        if payload.name.trim().is_empty() {
            warn!(awb, "LEX record has no Name, using the requested AWB");
            payload.name = awb.to_string();
        }
        crate::log_payload!(self.verbose, payload, awb, "Mapped shipment payload");
        payload
    }

    async fn submit(&self, payload: &ShipmentPayload, target_id: Option<&str>) -> Result<String> {
        match target_id {
            Some(id) => self.target.update_shipment(id, payload).await,
            None => self.target.create_shipment(payload).await,
        }
    }

    async fn write_back(&self, awb: &str, target_id: &str, policy: RetryPolicy) -> super::retry::RetryOutcome<()> {
        policy
            .run(self.sleeper.as_ref(), "write_back", || {
                self.source.write_back_shipment_id(awb, target_id)
            })
            .await
    }

    /// Submit with retries, then write the Zoho ID back to LEX
    async fn deliver(
        &self,
        record_id: &str,
        awb: &str,
        mode: SyncMode,
        payload: ShipmentPayload,
        target_id: Option<String>,
    ) -> Delivery {
        let submitted = self
            .submit_policy()
            .run(self.sleeper.as_ref(), "submit", || self.submit(&payload, target_id.as_deref()))
            .await;

        let confirmed_id = match submitted.result {
            Ok(id) => {
                crate::log_payload!(self.verbose, serde_json::json!({ "id": &id }), awb, mode = %mode, "Zoho write reply");
                id
            }
            Err(err) => {
                error!(awb, mode = %mode, attempts = submitted.attempts, error = %err, "Shipment submit failed");
                let item = ItemResult::failure(
                    record_id,
                    Some(awb.to_string()),
                    FailedStage::Submit,
                    err.to_string(),
                    submitted.attempts,
                );
                let operation = err.is_transient().then(|| FailedOperation {
                    record_id: record_id.to_string(),
                    awb: awb.to_string(),
                    mode,
                    work: PendingWork::Submit {
                        payload: Box::new(payload),
                        target_id,
                    },
                    last_error: err.to_string(),
                    retry_count: submitted.attempts,
                    timestamp: Utc::now(),
                });
                return Delivery::Failed { item, operation };
            }
        };

        let written = self.write_back(awb, &confirmed_id, self.write_back_policy()).await;
        match written.result {
            Ok(()) => Delivery::Done {
                target_id: confirmed_id,
                attempts: submitted.attempts,
            },
            Err(err) => {
                error!(awb, zoho_id = %confirmed_id, attempts = written.attempts, error = %err, "Write-back to LEX failed");
                let mut item = ItemResult::failure(
                    record_id,
                    Some(awb.to_string()),
                    FailedStage::WriteBack,
                    err.to_string(),
                    written.attempts,
                );
                item.target_id = Some(confirmed_id.clone());
                let operation = FailedOperation {
                    record_id: record_id.to_string(),
                    awb: awb.to_string(),
                    mode,
                    work: PendingWork::WriteBack {
                        target_id: confirmed_id,
                    },
                    last_error: err.to_string(),
                    retry_count: written.attempts,
                    timestamp: Utc::now(),
                };
                Delivery::Failed {
                    item,
                    operation: Some(operation),
                }
            }
        }
    }

    /// Retry every parked operation once more and fold recoveries into `results`
    ///
    /// Operations that fail again go back on the live queue.
    async fn drain(&self, queue: &FailedOperationQueue, results: &mut [ItemResult]) -> DrainSummary {
        let pending = queue.take_all().await;
        if pending.is_empty() {
            return DrainSummary::default();
        }

        info!(operations = pending.len(), "Draining failed operations");
        let policy = self.drain_policy();
        let mut summary = DrainSummary {
            attempted: pending.len(),
            ..DrainSummary::default()
        };

        for operation in pending {
            let original_stage = operation.stage();
            let (outcome, requeue) = self.drain_one(operation, policy).await;

            if outcome.status == DrainStatus::Recovered {
                summary.recovered += 1;
                if let Some(item) = results
                    .iter_mut()
                    .find(|r| !r.is_success() && r.id == outcome.record_id && r.stage == Some(original_stage))
                {
                    item.status = ItemStatus::Success;
                    item.target_id = outcome.target_id.clone();
                    item.error = None;
                    item.stage = None;
                    item.attempts = outcome.retry_count;
                    item.recovered = true;
                }
            } else {
                summary.still_failing += 1;
            }

            if let Some(requeue) = requeue {
                queue.enqueue(requeue).await;
            }
            summary.outcomes.push(outcome);
        }

        info!(
            recovered = summary.recovered,
            still_failing = summary.still_failing,
            "Drain pass finished"
        );
        summary
    }

    async fn drain_one(
        &self,
        operation: FailedOperation,
        policy: RetryPolicy,
    ) -> (DrainOutcome, Option<FailedOperation>) {
        let stage = operation.stage();
        let mut retry_count = operation.retry_count;

        let target_id = match &operation.work {
            PendingWork::WriteBack { target_id } => target_id.clone(),
            PendingWork::Submit { payload, target_id } => {
                let submitted = policy
                    .run(self.sleeper.as_ref(), "drain_submit", || {
                        self.submit(payload, target_id.as_deref())
                    })
                    .await;
                retry_count += submitted.attempts;
                match submitted.result {
                    Ok(id) => id,
                    Err(err) => {
                        warn!(record_id = %operation.record_id, error = %err, "Submit still failing after drain");
                        return still_failing(operation, FailedStage::Submit, err, retry_count);
                    }
                }
            }
        };

        let written = self.write_back(&operation.awb, &target_id, policy).await;
        match written.result {
            Ok(()) => {
                if stage == FailedStage::WriteBack {
                    retry_count += written.attempts;
                }
                info!(record_id = %operation.record_id, zoho_id = %target_id, "Recovered failed operation");
                let outcome = DrainOutcome {
                    record_id: operation.record_id,
                    stage,
                    status: DrainStatus::Recovered,
                    target_id: Some(target_id),
                    last_error: operation.last_error,
                    retry_count,
                    timestamp: Utc::now(),
                };
                (outcome, None)
            }
            Err(err) => {
                warn!(record_id = %operation.record_id, error = %err, "Write-back still failing after drain");
                // A submit that went through starts a fresh write-back count
                let retry_count = match stage {
                    FailedStage::WriteBack => retry_count + written.attempts,
                    _ => written.attempts,
                };
                let operation = FailedOperation {
                    work: PendingWork::WriteBack {
                        target_id: target_id.clone(),
                    },
                    ..operation
                };
                let (mut outcome, requeue) = still_failing(operation, FailedStage::WriteBack, err, retry_count);
                outcome.target_id = Some(target_id);
                (outcome, requeue)
            }
        }
    }

    fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.tuning.submit_attempts, self.tuning.submit_delay)
    }

    fn submit_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.tuning.submit_attempts, self.tuning.submit_delay)
    }

    fn write_back_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.tuning.writeback_attempts, self.tuning.writeback_base_delay)
    }

    fn drain_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.tuning.drain_attempts, self.tuning.drain_delay)
    }
}

fn still_failing(
    operation: FailedOperation,
    stage: FailedStage,
    err: SyncError,
    retry_count: u32,
) -> (DrainOutcome, Option<FailedOperation>) {
    let now = Utc::now();
    let outcome = DrainOutcome {
        record_id: operation.record_id.clone(),
        stage,
        status: DrainStatus::StillFailing,
        target_id: None,
        last_error: err.to_string(),
        retry_count,
        timestamp: now,
    };
    let requeue = FailedOperation {
        last_error: err.to_string(),
        retry_count,
        timestamp: now,
        ..operation
    };
    (outcome, Some(requeue))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic in batch".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pacing::NoopSleeper;
    use crate::engine::testing::{FakeLex, FakeZoho};
    use crate::models::CustomerRecord;
    use serde_json::json;
    use std::time::Duration;

    fn tuning(batch_size: usize) -> SyncTuning {
        SyncTuning {
            batch_size,
            concurrency: batch_size,
            ..SyncTuning::default()
        }
    }

    fn engine(lex: Arc<FakeLex>, zoho: Arc<FakeZoho>, tuning: SyncTuning) -> (ShipmentSync, Arc<NoopSleeper>) {
        let sleeper = Arc::new(NoopSleeper::new());
        let sync = ShipmentSync::new(lex, zoho, tuning).with_sleeper(sleeper.clone());
        (sync, sleeper)
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_success_writes_back() {
        let lex = Arc::new(
            FakeLex::new()
                .with_basic_shipment("AWB100")
                .with_customer(
                    "1021",
                    CustomerRecord {
                        customer_id: Some("1021".to_string()),
                        zoho_deal_id: Some("D1".to_string()),
                        zoho_account_id: None,
                    },
                ),
        );
        let zoho = Arc::new(FakeZoho::new().with_deal("D1", "Acme Deal"));
        let (sync, _) = engine(lex.clone(), zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB100"]), SyncMode::Create).await;

        assert_eq!(report.summary.successful, 1);
        let item = &report.results[0];
        assert!(item.is_success());
        assert_eq!(item.target_id.as_deref(), Some("ZS0001"));
        assert_eq!(lex.write_backs(), vec![("AWB100".to_string(), "ZS0001".to_string())]);

        let stored = zoho.payload("ZS0001").unwrap();
        assert_eq!(stored.booked_date, "2024-03-05");
        assert_eq!(stored.seller_name.unwrap().name, "Acme Deal");
        assert!(stored.cust_id_s.is_none());
    }

    #[tokio::test]
    async fn test_results_keep_input_order_across_batches() {
        let batch = 4;
        let awbs: Vec<String> = (0..3 * batch + 5).map(|i| format!("AWB{i:03}")).collect();
        let lex = awbs
            .iter()
            .fold(FakeLex::new(), |lex, awb| lex.with_basic_shipment(awb));
        let (sync, sleeper) = engine(Arc::new(lex), Arc::new(FakeZoho::new().with_jitter()), tuning(batch));

        let report = sync.process(awbs.clone(), SyncMode::Create).await;

        assert_eq!(report.results.len(), awbs.len());
        for (awb, item) in awbs.iter().zip(&report.results) {
            assert_eq!(&item.id, awb);
            assert!(item.is_success());
        }
        // 5 batches, 4 pauses between them
        assert_eq!(sleeper.requested(), vec![Duration::from_millis(1500); 4]);
    }

    #[tokio::test]
    async fn test_submit_recovers_within_budget() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB1"));
        let zoho = Arc::new(FakeZoho::new().failing_submit("AWB1", 2));
        let (sync, _) = engine(lex, zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        let item = &report.results[0];
        assert!(item.is_success());
        assert_eq!(item.attempts, 3);
        assert!(!item.recovered);
        assert_eq!(report.drain.attempted, 0);
        assert_eq!(zoho.creates(), 3);
    }

    #[tokio::test]
    async fn test_submit_exhausting_budget_is_queued_and_recovered_by_drain() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB1"));
        let zoho = Arc::new(FakeZoho::new().failing_submit("AWB1", 3));
        let (sync, _) = engine(lex.clone(), zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert_eq!(report.drain.attempted, 1);
        assert_eq!(report.drain.recovered, 1);
        assert_eq!(report.drain.outcomes[0].stage, FailedStage::Submit);
        let item = &report.results[0];
        assert!(item.is_success());
        assert!(item.recovered);
        assert_eq!(item.attempts, 4);
        assert_eq!(report.summary.successful, 1);
        assert_eq!(zoho.shipments_named("AWB1"), 1);
        assert_eq!(lex.write_backs().len(), 1);
    }

    #[tokio::test]
    async fn test_permanently_failing_submit_stays_failed() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB100").with_basic_shipment("AWB200"));
        let zoho = Arc::new(FakeZoho::new().failing_submit("AWB200", u32::MAX));
        let (sync, _) = engine(lex, zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB100", "AWB200"]), SyncMode::Create).await;

        assert_eq!(report.summary.successful, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.results[0].status, ItemStatus::Success);
        assert_eq!(report.results[1].status, ItemStatus::Error);
        assert_eq!(report.results[1].stage, Some(FailedStage::Submit));
        assert_eq!(report.drain.still_failing, 1);
        assert_eq!(report.drain.outcomes[0].record_id, "AWB200");
        assert_eq!(report.drain.outcomes[0].retry_count, 6);
        // 3 immediate attempts + 3 drain attempts, no duplicate shipment
        assert_eq!(zoho.creates(), 1 + 6);
        assert_eq!(zoho.shipments_named("AWB200"), 0);
    }

    #[tokio::test]
    async fn test_rejected_submit_not_queued() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB1"));
        let zoho = Arc::new(FakeZoho::new().rejecting("AWB1"));
        let (sync, _) = engine(lex, zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert_eq!(report.results[0].stage, Some(FailedStage::Submit));
        assert_eq!(report.results[0].attempts, 1);
        assert_eq!(report.drain.attempted, 0);
        assert_eq!(zoho.creates(), 1);
    }

    #[tokio::test]
    async fn test_write_back_failure_never_recreates_shipment() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB1").failing_write_back("AWB1", 3));
        let zoho = Arc::new(FakeZoho::new());
        let (sync, sleeper) = engine(lex.clone(), zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert_eq!(zoho.creates(), 1);
        assert_eq!(zoho.shipments_named("AWB1"), 1);
        assert_eq!(report.drain.outcomes[0].stage, FailedStage::WriteBack);
        assert_eq!(report.drain.recovered, 1);
        assert!(report.results[0].recovered);
        assert_eq!(report.results[0].target_id.as_deref(), Some("ZS0001"));
        assert_eq!(lex.write_backs(), vec![("AWB1".to_string(), "ZS0001".to_string())]);
        // exponential write-back delays before the drain kicks in
        let delays = sleeper.requested();
        assert_eq!(&delays[..2], &[Duration::from_millis(1000), Duration::from_millis(2000)]);
    }

    #[tokio::test]
    async fn test_missing_lex_shipment_is_fetch_failure() {
        let (sync, _) = engine(Arc::new(FakeLex::new()), Arc::new(FakeZoho::new()), tuning(80));

        let report = sync.process(ids(&["GHOST"]), SyncMode::Create).await;

        let item = &report.results[0];
        assert_eq!(item.stage, Some(FailedStage::Fetch));
        assert_eq!(item.attempts, 1);
        assert!(item.error.as_deref().unwrap().contains("not found"));
        assert_eq!(report.drain.attempted, 0);
    }

    #[tokio::test]
    async fn test_transient_fetch_retried() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB1").failing_fetch("AWB1", 1));
        let (sync, _) = engine(lex.clone(), Arc::new(FakeZoho::new()), tuning(80));

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert!(report.results[0].is_success());
        assert_eq!(lex.fetches(), 2);
    }

    #[tokio::test]
    async fn test_panic_fails_whole_batch_only() {
        let lex = ["A1", "A2", "B1", "B2"]
            .iter()
            .fold(FakeLex::new(), |lex, awb| lex.with_basic_shipment(awb));
        let zoho = Arc::new(FakeZoho::new().panicking_on("A2"));
        let (sync, _) = engine(Arc::new(lex), zoho, tuning(2));

        let report = sync.process(ids(&["A1", "A2", "B1", "B2"]), SyncMode::Create).await;

        assert_eq!(report.results[0].stage, Some(FailedStage::Batch));
        assert_eq!(report.results[1].stage, Some(FailedStage::Batch));
        assert!(report.results[2].is_success());
        assert!(report.results[3].is_success());
        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.failed, 2);
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let lex = Arc::new(FakeLex::new().with_shipment(
            "AWB1",
            json!({"Name": "AWB1", "Package_Value": "10.6", "Final_Inv_Date": "2024-01-02T08:00:00Z"}),
        ));
        let zoho = Arc::new(FakeZoho::new().with_shipment("ZS9", "AWB1"));
        let (sync, _) = engine(lex.clone(), zoho.clone(), tuning(80));

        let first = sync.process(ids(&["ZS9"]), SyncMode::Update).await;
        let after_first = zoho.payload("ZS9").unwrap();
        let second = sync.process(ids(&["ZS9"]), SyncMode::Update).await;
        let after_second = zoho.payload("ZS9").unwrap();

        assert!(first.results[0].is_success());
        assert!(second.results[0].is_success());
        assert_eq!(after_first, after_second);
        assert_eq!(after_first.package_value, Some(11));
        assert_eq!(zoho.updates(), 2);
        assert_eq!(zoho.creates(), 0);
        assert_eq!(lex.write_backs().last().unwrap(), &("AWB1".to_string(), "ZS9".to_string()));
    }

    #[tokio::test]
    async fn test_update_unknown_zoho_shipment() {
        let (sync, _) = engine(Arc::new(FakeLex::new()), Arc::new(FakeZoho::new()), tuning(80));

        let report = sync.process(ids(&["ZS404"]), SyncMode::Update).await;

        assert_eq!(report.results[0].id, "ZS404");
        assert_eq!(report.results[0].stage, Some(FailedStage::Fetch));
    }

    #[tokio::test]
    async fn test_truncation_reaches_submitted_payload() {
        let lex = Arc::new(FakeLex::new().with_shipment("AWB1", json!({"Name": "AWB1", "Description": "d".repeat(300)})));
        let zoho = Arc::new(FakeZoho::new());
        let (sync, _) = engine(lex, zoho.clone(), tuning(80));

        sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert_eq!(zoho.payload("ZS0001").unwrap().description.chars().count(), 255);
    }

    #[tokio::test]
    async fn test_nameless_lex_record_keeps_awb_link() {
        let lex = Arc::new(FakeLex::new().with_shipment("AWB1", json!({"Customer_ID": "1021"})));
        let zoho = Arc::new(FakeZoho::new());
        let (sync, _) = engine(lex.clone(), zoho.clone(), tuning(80));

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert!(report.results[0].is_success());
        assert_eq!(zoho.payload("ZS0001").unwrap().name, "AWB1");
        assert_eq!(zoho.shipments_named("AWB1"), 1);
        assert_eq!(lex.write_backs(), vec![("AWB1".to_string(), "ZS0001".to_string())]);
    }

    #[tokio::test]
    async fn test_verbose_logging_leaves_pipeline_untouched() {
        let lex = Arc::new(FakeLex::new().with_basic_shipment("AWB1"));
        let zoho = Arc::new(FakeZoho::new());
        let verbose = VerboseLogging::new(true);
        let (sync, _) = engine(lex, zoho.clone(), tuning(80));
        let sync = sync.with_verbose_logging(verbose.clone());

        let report = sync.process(ids(&["AWB1"]), SyncMode::Create).await;

        assert!(verbose.is_enabled());
        assert!(report.results[0].is_success());
        assert_eq!(zoho.payload("ZS0001").unwrap().name, "AWB1");
    }

    #[tokio::test]
    async fn test_run_job_validates_ids() {
        let (sync, _) = engine(Arc::new(FakeLex::new()), Arc::new(FakeZoho::new()), tuning(80));

        assert!(matches!(
            sync.run_job(Vec::new(), SyncMode::Create).await,
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            sync.run_job(ids(&["AWB1", "  "]), SyncMode::Create).await,
            Err(SyncError::Validation(_))
        ));
        assert_eq!(
            ShipmentSync::validate_ids(ids(&[" AWB1 "])).unwrap(),
            vec!["AWB1".to_string()]
        );
    }
}
