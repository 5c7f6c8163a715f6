//! Per-project ordered write queue for ordering batches.
//!
//! Mutations update the in-memory sequence first and push the resulting
//! ordering patches here without waiting. Each project gets one worker task
//! that applies its batches strictly in enqueue order, so a later batch can
//! never be overtaken by an earlier, staler one. Failures are logged; the
//! caller may keep the returned [`WriteTicket`] to observe the outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storyboard_core::card::OrderPatch;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::persistence::CardPersistence;

/// How long a project's worker waits for new batches before exiting.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

type Workers = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<WriteJob>>>>;

struct WriteJob {
    patches: Vec<OrderPatch>,
    done: oneshot::Sender<Option<u64>>,
}

/// Completion handle for one enqueued batch. Dropping it is fine.
#[derive(Debug)]
pub struct WriteTicket(oneshot::Receiver<Option<u64>>);

impl WriteTicket {
    /// Rows written, or `None` if the batch failed or was never applied.
    pub async fn wait(self) -> Option<u64> {
        self.0.await.ok().flatten()
    }
}

/// Ordered outbound queue, one worker per project.
///
/// A worker exits once it has been idle for the idle timeout; the next
/// batch for that project starts a fresh one.
pub struct WriteQueue {
    persistence: Arc<dyn CardPersistence>,
    workers: Workers,
    tasks: TaskTracker,
    cancel: CancellationToken,
    idle_timeout: Duration,
}

impl WriteQueue {
    pub fn new(persistence: Arc<dyn CardPersistence>, cancel: CancellationToken) -> Self {
        Self {
            persistence,
            workers: Arc::new(Mutex::new(HashMap::new())),
            tasks: TaskTracker::new(),
            cancel,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Queue a batch for `project_id`. Empty batches still pass through the
    /// worker, which makes them a flush barrier.
    pub fn enqueue(&self, project_id: &str, patches: Vec<OrderPatch>) -> WriteTicket {
        let (done, rx) = oneshot::channel();
        let mut job = WriteJob { patches, done };

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = workers.get(project_id) {
            match sender.send(job) {
                Ok(()) => return WriteTicket(rx),
                // Worker exited (shutdown); fall through and respawn.
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let (tx, worker_rx) = mpsc::unbounded_channel();
        // A fresh receiver is alive, so this send cannot fail.
        let _ = tx.send(job);
        workers.insert(project_id.to_string(), tx);
        self.tasks.spawn(run_worker(
            Worker {
                project_id: project_id.to_string(),
                persistence: Arc::clone(&self.persistence),
                workers: Arc::clone(&self.workers),
                idle_timeout: self.idle_timeout,
            },
            worker_rx,
            self.cancel.clone(),
        ));
        WriteTicket(rx)
    }

    /// A ticket that resolves once every batch queued so far for
    /// `project_id` has been applied.
    pub fn flush(&self, project_id: &str) -> WriteTicket {
        self.enqueue(project_id, Vec::new())
    }

    /// Resolves once every worker has exited. After cancellation, workers
    /// exit once their queued batches are applied.
    pub async fn wait_stopped(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Number of projects with a live worker.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether `project_id` has a live worker, i.e. possibly unapplied batches.
    pub fn has_worker(&self, project_id: &str) -> bool {
        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(project_id)
    }
}

struct Worker {
    project_id: String,
    persistence: Arc<dyn CardPersistence>,
    workers: Workers,
    idle_timeout: Duration,
}

impl Worker {
    /// Deregister if nothing arrived meanwhile. Checked under the map lock,
    /// which `enqueue` also sends under, so no batch can slip in between.
    fn retire_or_take(&self, rx: &mut mpsc::UnboundedReceiver<WriteJob>) -> Option<WriteJob> {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        let next = rx.try_recv().ok();
        if next.is_none() {
            workers.remove(&self.project_id);
        }
        next
    }
}

async fn run_worker(
    worker: Worker,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
    cancel: CancellationToken,
) {
    let project_id = worker.project_id.as_str();
    let persistence = worker.persistence.as_ref();
    tracing::debug!(project_id, "Write queue worker started");
    loop {
        tokio::select! {
            biased;
            job = rx.recv() => match job {
                Some(job) => apply(project_id, persistence, job).await,
                None => break,
            },
            _ = cancel.cancelled() => {
                // Drain what is already queued before stopping.
                rx.close();
                while let Some(job) = rx.recv().await {
                    apply(project_id, persistence, job).await;
                }
                break;
            }
            _ = tokio::time::sleep(worker.idle_timeout) => {
                match worker.retire_or_take(&mut rx) {
                    Some(job) => apply(project_id, persistence, job).await,
                    None => break,
                }
            }
        }
    }
    tracing::debug!(project_id, "Write queue worker stopped");
}

async fn apply(project_id: &str, persistence: &dyn CardPersistence, job: WriteJob) {
    let outcome = if job.patches.is_empty() {
        Some(0)
    } else {
        match persistence.apply_order(project_id, &job.patches).await {
            Ok(written) => {
                tracing::debug!(project_id, batch = job.patches.len(), written, "Ordering batch applied");
                Some(written)
            }
            Err(e) => {
                tracing::error!(project_id, batch = job.patches.len(), error = %e, "Ordering batch failed");
                None
            }
        }
    };
    let _ = job.done.send(outcome);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
