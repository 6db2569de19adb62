// Failed-operation queue

//! Request-scoped holding area for operations that ran out of immediate retries.
//!
//! Each batch job creates its own queue and hands it to the pipeline, so two
//! concurrent requests never see each other's failures. The handle is cheap to
//! clone; all clones share the same list.
//!
//! ## Rust Learning Notes:
//!
//! ### `Arc<Mutex<Vec<_>>>` with tokio's mutex
//! Items of a batch run concurrently and may enqueue at the same time. The
//! mutex is `tokio::sync::Mutex` so holding it never blocks a runtime thread.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::models::FailedOperation;

#[derive(Debug, Clone, Default)]
pub struct FailedOperationQueue {
    operations: Arc<Mutex<Vec<FailedOperation>>>,
}

impl FailedOperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append without deduplication
    pub async fn enqueue(&self, operation: FailedOperation) {
        debug!(
            record_id = %operation.record_id,
            stage = ?operation.stage(),
            retry_count = operation.retry_count,
            "Queued failed operation"
        );
        self.operations.lock().await.push(operation);
    }

    pub async fn len(&self) -> usize {
        self.operations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.operations.lock().await.is_empty()
    }

    /// Copy of the live queue
    pub async fn snapshot(&self) -> Vec<FailedOperation> {
        self.operations.lock().await.clone()
    }

    /// Take everything queued so far, leaving the live queue empty
    pub async fn take_all(&self) -> Vec<FailedOperation> {
        std::mem::take(&mut *self.operations.lock().await)
    }
}
