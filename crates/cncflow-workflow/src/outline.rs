//! Outline request/response channel
//!
//! An outline request runs the host-supplied [`OutlineBackend`] on a tokio
//! task and reports back on the event bus with [`OutlineEvent::Completed`]
//! or [`OutlineEvent::Failed`]. The session tears the task down when it
//! observes that event. Requests are independent; two requests produce two
//! completions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cncflow_core::event_bus::OutlineEvent;
use cncflow_core::{AppEvent, EventBus, OutlineError};
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

/// Input for an outline computation
#[derive(Debug, Clone)]
pub struct OutlineRequest {
    /// Request identifier echoed in the completion event
    pub id: Uuid,
    /// Full program text
    pub program_text: Arc<str>,
    /// Produce a laser-safe outline
    pub laser_mode: bool,
}

/// Background outline computation supplied by the host
#[async_trait]
pub trait OutlineBackend: Send + Sync {
    /// Derive an outline program from `request`
    async fn compute(&self, request: OutlineRequest) -> Result<Arc<str>, OutlineError>;
}

struct PendingOutline {
    worker: AbortHandle,
    watcher: JoinHandle<()>,
}

impl PendingOutline {
    fn abort(&self) {
        self.worker.abort();
        self.watcher.abort();
    }
}

/// Tracks outline computations until their completion is observed
pub struct OutlineChannel {
    backend: Arc<dyn OutlineBackend>,
    bus: EventBus,
    timeout: Option<Duration>,
    pending: HashMap<Uuid, PendingOutline>,
}

impl std::fmt::Debug for OutlineChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlineChannel")
            .field("timeout", &self.timeout)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl OutlineChannel {
    /// Create a channel over `backend`, reporting on `bus`
    pub fn new(backend: Arc<dyn OutlineBackend>, bus: EventBus, timeout: Option<Duration>) -> Self {
        Self {
            backend,
            bus,
            timeout,
            pending: HashMap::new(),
        }
    }

    /// Start an outline computation
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&mut self, program_text: Arc<str>, laser_mode: bool) -> Uuid {
        let id = Uuid::new_v4();
        let request = OutlineRequest {
            id,
            program_text,
            laser_mode,
        };

        let backend = Arc::clone(&self.backend);
        let mut worker = tokio::spawn(async move { backend.compute(request).await });
        let worker_abort = worker.abort_handle();

        let bus = self.bus.clone();
        let timeout = self.timeout;
        let watcher = tokio::spawn(async move {
            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut worker).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        worker.abort();
                        Ok(Err(OutlineError::TimedOut {
                            timeout_ms: limit.as_millis() as u64,
                        }))
                    }
                },
                None => (&mut worker).await,
            };

            let result = joined.unwrap_or_else(|e| {
                Err(OutlineError::WorkerFailed {
                    reason: e.to_string(),
                })
            });

            let event = match result {
                Ok(outline) => OutlineEvent::Completed {
                    request_id: id,
                    outline,
                },
                Err(e) => {
                    tracing::error!("Outline {} failed: {}", id, e);
                    OutlineEvent::Failed {
                        request_id: id,
                        reason: e.to_string(),
                    }
                }
            };
            if let Err(e) = bus.publish(AppEvent::Outline(event)) {
                tracing::warn!("Outline {} result not delivered: {}", id, e);
            }
        });

        self.pending.insert(
            id,
            PendingOutline {
                worker: worker_abort,
                watcher,
            },
        );
        tracing::debug!("Outline {} started ({} pending)", id, self.pending.len());

        if let Err(e) = self
            .bus
            .publish(AppEvent::Outline(OutlineEvent::Requested { request_id: id }))
        {
            tracing::trace!("Outline request event not observed: {}", e);
        }
        id
    }

    /// Release the computation for `id`
    ///
    /// Returns true the first time only.
    pub fn teardown(&mut self, id: Uuid) -> bool {
        match self.pending.remove(&id) {
            Some(pending) => {
                pending.abort();
                tracing::debug!("Outline {} torn down", id);
                true
            }
            None => false,
        }
    }

    /// Number of computations not yet torn down
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether `id` is still pending
    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains_key(&id)
    }

    /// Abort every pending computation
    pub fn abort_all(&mut self) -> usize {
        let count = self.pending.len();
        for (id, pending) in self.pending.drain() {
            pending.abort();
            tracing::debug!("Outline {} aborted", id);
        }
        count
    }
}

impl Drop for OutlineChannel {
    fn drop(&mut self) {
        self.abort_all();
    }
}
