//! Cron trigger for the daily reconciliation

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use super::reconcile::Reconciler;
use crate::config::ReconcileConfig;
use crate::{Result, SyncError};

/// Build (but do not start) the scheduler; `None` when scheduling is disabled
///
/// The cron expression has six fields, seconds first, and is evaluated in UTC.
pub async fn build_scheduler(reconciler: Arc<Reconciler>, config: &ReconcileConfig) -> Result<Option<JobScheduler>> {
    if !config.enabled {
        info!("Reconciliation scheduler disabled");
        return Ok(None);
    }

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| SyncError::Config(format!("creating scheduler: {e:?}")))?;

    let job = Job::new_async(config.cron.as_str(), move |_uuid, _lock| {
        let reconciler = Arc::clone(&reconciler);
        Box::pin(async move {
            info!("Scheduled reconciliation triggered");
            reconciler.run_scheduled().await;
        })
    })
    .map_err(|e| SyncError::Config(format!("invalid SYNC_CRON {:?}: {e:?}", config.cron)))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| SyncError::Config(format!("adding reconciliation job: {e:?}")))?;

    info!(cron = %config.cron, "Reconciliation scheduled");
    Ok(Some(scheduler))
}
