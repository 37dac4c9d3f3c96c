//! Asynchronous deletion pipeline.
//!
//! Callers hand deletion requests to a [`DeletionQueue`] and return as soon
//! as the request is accepted. A single [`DeletionWorker`] drains the queue
//! and applies each request with [`Repository::batch_delete`]. The queue is
//! bounded: once it holds `capacity` requests, `enqueue` waits for space
//! instead of dropping anything.

use crate::error::DeletionError;
use snip_core::{Repository, ShortCode};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Request to soft-delete `short_codes` on behalf of `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub owner_id: String,
    pub short_codes: Vec<ShortCode>,
}

/// Producer side of the deletion queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: mpsc::Sender<DeletionRequest>,
}

/// Consumer side of the deletion queue.
pub struct DeletionWorker<R: ?Sized> {
    repository: Arc<R>,
    receiver: mpsc::Receiver<DeletionRequest>,
}

/// Creates a queue holding at most `capacity` pending requests and the
/// worker that applies them to `repository`.
///
/// A `capacity` of zero is treated as one.
pub fn channel<R>(repository: Arc<R>, capacity: usize) -> (DeletionQueue, DeletionWorker<R>)
where
    R: Repository + ?Sized,
{
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        DeletionQueue { sender },
        DeletionWorker {
            repository,
            receiver,
        },
    )
}

impl DeletionQueue {
    /// Enqueues a deletion request, waiting while the queue is full.
    ///
    /// Returning `Ok` means the request was accepted, not that it has been
    /// applied.
    pub async fn enqueue(
        &self,
        owner_id: impl Into<String>,
        short_codes: Vec<ShortCode>,
    ) -> Result<(), DeletionError> {
        let owner_id = owner_id.into();
        if owner_id.is_empty() {
            return Err(DeletionError::MissingOwner);
        }
        if short_codes.is_empty() {
            return Err(DeletionError::EmptyBatch);
        }

        let count = short_codes.len();
        self.sender
            .send(DeletionRequest {
                owner_id,
                short_codes,
            })
            .await
            .map_err(|_| DeletionError::Closed)?;

        debug!(count, "deletion request accepted");
        Ok(())
    }

    /// Maximum number of pending requests.
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Number of requests that can be enqueued without waiting.
    pub fn available(&self) -> usize {
        self.sender.capacity()
    }
}

impl<R> DeletionWorker<R>
where
    R: Repository + ?Sized,
{
    /// Applies queued requests one at a time until every [`DeletionQueue`]
    /// handle is dropped and the remaining requests are drained.
    pub async fn run(mut self) {
        info!("deletion worker started");

        while let Some(request) = self.receiver.recv().await {
            self.process(request).await;
        }

        info!("deletion worker stopped");
    }

    /// Runs the worker on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn process(&self, request: DeletionRequest) {
        let DeletionRequest {
            owner_id,
            short_codes,
        } = request;

        match self
            .repository
            .batch_delete(&owner_id, &short_codes)
            .await
        {
            Ok(()) => {
                debug!(owner = %owner_id, count = short_codes.len(), "deletion request applied");
            }
            Err(e) => {
                warn!(
                    owner = %owner_id,
                    count = short_codes.len(),
                    error = %e,
                    "failed to apply deletion request"
                );
            }
        }
    }
}
