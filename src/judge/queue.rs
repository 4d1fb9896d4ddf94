//! Submission queue and worker pool
//!
//! A bounded multi-producer FIFO with a fixed pool of consumer tasks.
//! Shutdown is cooperative: one sentinel message per worker, then the
//! pool is awaited and leftover items are drained. A worker never dies;
//! panics and errors inside submission processing are caught and turned
//! into a best-effort INTERNAL_ERROR write.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{SubmissionStatus, TestCaseResult};

use super::worker::{JudgeContext, process_submission};

enum QueueMessage {
    Judge(Uuid),
    /// Stop sentinel; one per worker on shutdown
    Shutdown,
}

/// Handle to the judging pipeline
#[derive(Clone)]
pub struct JudgeQueue {
    shared: Arc<Shared>,
}

struct Shared {
    tx: mpsc::Sender<QueueMessage>,
    rx: Mutex<mpsc::Receiver<QueueMessage>>,
    ctx: JudgeContext,
    worker_count: usize,
    started: AtomicBool,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl JudgeQueue {
    pub fn new(worker_count: usize, queue_capacity: usize, ctx: JudgeContext) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                tx,
                rx: Mutex::new(rx),
                ctx,
                worker_count: worker_count.max(1),
                started: AtomicBool::new(false),
                handles: std::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append a submission id; non-blocking. Ids enqueued before
    /// `start_workers` are buffered and picked up on the next start.
    pub fn enqueue(&self, submission_id: Uuid) -> AppResult<()> {
        if !self.shared.started.load(Ordering::SeqCst) {
            tracing::warn!(
                submission_id = %submission_id,
                "Workers not running; submission buffered until start"
            );
        }
        self.shared
            .tx
            .try_send(QueueMessage::Judge(submission_id))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => AppError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => {
                    AppError::Internal(anyhow!("Judge queue closed"))
                }
            })
    }

    /// Spawn the worker pool. Idempotent; requires a running runtime.
    pub fn start_workers(&self) {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Judge workers already running");
            return;
        }

        let mut handles = self.shared.handles.lock().expect("worker handle lock");
        for worker_id in 0..self.shared.worker_count {
            let shared = self.shared.clone();
            handles.push(tokio::spawn(worker_loop(shared, worker_id)));
        }
        tracing::info!(workers = self.shared.worker_count, "Judge workers started");
    }

    /// Stop the pool: one sentinel per worker, await them all, then drain
    /// whatever is still queued.
    pub async fn stop_workers(&self) {
        if !self.shared.started.swap(false, Ordering::SeqCst) {
            return;
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.shared.handles.lock().expect("worker handle lock");
            guard.drain(..).collect()
        };

        for _ in 0..handles.len() {
            if self.shared.tx.send(QueueMessage::Shutdown).await.is_err() {
                break;
            }
        }
        join_all(handles).await;

        let mut rx = self.shared.rx.lock().await;
        let mut drained = 0usize;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            tracing::warn!(drained, "Dropped queued items on shutdown");
        }
        tracing::info!("Judge workers stopped");
    }
}

async fn worker_loop(shared: Arc<Shared>, worker_id: usize) {
    tracing::debug!(worker_id, "Judge worker running");
    loop {
        let message = { shared.rx.lock().await.recv().await };
        let submission_id = match message {
            None | Some(QueueMessage::Shutdown) => break,
            Some(QueueMessage::Judge(id)) => id,
        };

        let judged = AssertUnwindSafe(process_submission(&shared.ctx, submission_id))
            .catch_unwind()
            .await;

        match judged {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    worker_id,
                    submission_id = %submission_id,
                    error = %e,
                    "Submission processing failed"
                );
                mark_internal_error(
                    &shared.ctx,
                    submission_id,
                    &format!("Queue worker error: {e}"),
                )
                .await;
            }
            Err(_) => {
                tracing::error!(
                    worker_id,
                    submission_id = %submission_id,
                    "Submission processing panicked"
                );
                mark_internal_error(&shared.ctx, submission_id, "Queue worker error").await;
            }
        }
    }
    tracing::debug!(worker_id, "Judge worker exited");
}

/// Best-effort terminal write after a processing failure. Never
/// overwrites an existing terminal status, and its own failures are
/// logged and swallowed so the worker survives.
async fn mark_internal_error(ctx: &JudgeContext, submission_id: Uuid, message: &str) {
    let message: String = message.chars().take(500).collect();
    let attempt = async {
        if let Some(submission) = ctx.repo.get_submission(submission_id).await? {
            if !submission.status.is_terminal() {
                ctx.repo
                    .update_status_and_results(
                        submission_id,
                        SubmissionStatus::InternalError,
                        vec![TestCaseResult::internal("Processing Failure", message)],
                    )
                    .await?;
            }
        }
        Ok::<(), AppError>(())
    };

    if let Err(e) = attempt.await {
        tracing::error!(
            submission_id = %submission_id,
            error = %e,
            "Failed to record internal error for submission"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        InMemoryRepository, Script, ScriptedEngine, fixture_catalogue, outcome,
        pending_submission,
    };
    use crate::sandbox::SandboxStatus;
    use std::time::Duration;

    async fn wait_for_terminal(repo: &InMemoryRepository, id: Uuid) -> SubmissionStatus {
        for _ in 0..200 {
            if let Some(status) = repo.status_of(id) {
                if status.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("submission {id} did not reach a terminal status");
    }

    fn accepted_run() -> Vec<crate::sandbox::SandboxOutcome> {
        vec![
            outcome(SandboxStatus::Success, 0, Some("5\n"), None),
            outcome(SandboxStatus::Success, 0, Some("300\n"), None),
        ]
    }

    async fn queue_with(
        repo: Arc<InMemoryRepository>,
        engine: ScriptedEngine,
        workers: usize,
        capacity: usize,
    ) -> JudgeQueue {
        let ctx = JudgeContext {
            repo,
            catalogue: fixture_catalogue().await,
            engine: Arc::new(engine),
        };
        JudgeQueue::new(workers, capacity, ctx)
    }

    #[tokio::test]
    async fn ids_enqueued_before_start_are_judged_after_start() {
        let id = Uuid::new_v4();
        let repo = Arc::new(InMemoryRepository::default());
        repo.add_submission(pending_submission(id, "Contest1", "sum", "python"));

        let queue = queue_with(
            repo.clone(),
            ScriptedEngine::with_outcomes(accepted_run()),
            1,
            16,
        )
        .await;

        queue.enqueue(id).unwrap();
        queue.start_workers();

        assert_eq!(
            wait_for_terminal(&repo, id).await,
            SubmissionStatus::Accepted
        );
        assert_eq!(
            repo.transitions_of(id),
            vec![SubmissionStatus::Running, SubmissionStatus::Accepted]
        );

        queue.stop_workers().await;
    }

    #[tokio::test]
    async fn duplicate_enqueue_results_in_one_terminal_transition() {
        let id = Uuid::new_v4();
        let repo = Arc::new(InMemoryRepository::default());
        repo.add_submission(pending_submission(id, "Contest1", "sum", "python"));

        // Exactly enough script for one full judge; a re-judge would see
        // internal errors and extra transitions
        let queue = queue_with(
            repo.clone(),
            ScriptedEngine::with_outcomes(accepted_run()),
            1,
            16,
        )
        .await;

        queue.enqueue(id).unwrap();
        queue.enqueue(id).unwrap();
        queue.start_workers();

        wait_for_terminal(&repo, id).await;
        queue.stop_workers().await;

        assert_eq!(
            repo.transitions_of(id),
            vec![SubmissionStatus::Running, SubmissionStatus::Accepted]
        );
    }

    #[tokio::test]
    async fn worker_survives_a_panicking_judge() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let repo = Arc::new(InMemoryRepository::default());
        repo.add_submission(pending_submission(first, "Contest1", "sum", "python"));
        repo.add_submission(pending_submission(second, "Contest1", "sum", "python"));

        let mut script = vec![Script::Panic];
        script.extend(accepted_run().into_iter().map(Script::Outcome));
        let queue = queue_with(repo.clone(), ScriptedEngine::with_script(script), 1, 16).await;

        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();
        queue.start_workers();

        assert_eq!(
            wait_for_terminal(&repo, first).await,
            SubmissionStatus::InternalError
        );
        assert_eq!(
            wait_for_terminal(&repo, second).await,
            SubmissionStatus::Accepted
        );

        queue.stop_workers().await;
    }

    #[tokio::test]
    async fn enqueue_fails_when_the_bound_is_reached() {
        let repo = Arc::new(InMemoryRepository::default());
        let queue = queue_with(repo, ScriptedEngine::empty(), 1, 1).await;

        queue.enqueue(Uuid::new_v4()).unwrap();
        let err = queue.enqueue(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::QueueFull));
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_then_start_works() {
        let id = Uuid::new_v4();
        let repo = Arc::new(InMemoryRepository::default());
        repo.add_submission(pending_submission(id, "Contest1", "sum", "python"));

        let queue = queue_with(
            repo.clone(),
            ScriptedEngine::with_outcomes(accepted_run()),
            2,
            16,
        )
        .await;

        queue.start_workers();
        queue.start_workers();
        queue.stop_workers().await;
        queue.stop_workers().await;

        queue.start_workers();
        queue.enqueue(id).unwrap();
        wait_for_terminal(&repo, id).await;
        queue.stop_workers().await;
    }
}
