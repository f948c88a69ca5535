//! The run engine: a bounded submission queue served by a pool of
//! worker executors.

use crate::ingress::{build_run_state, SubmitRequest};
use crate::response::{ContextSummary, RunError, RunOutcome, RunResponse};
use crate::supervisor::Supervisor;
use lexgen_core::{
    CancelToken, EngineConfig, LexgenError, LexgenResult, RunId, RunState, RunStatus,
    ValidationError,
};
use lexgen_policy::PolicyStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};

struct Job {
    state: RunState,
    cancel: CancelToken,
    reply: oneshot::Sender<RunOutcome>,
}

/// Handle to one submitted run.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: RunId,
    cancel: CancelToken,
    receiver: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    /// Signal cooperative cancellation to the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the run's terminal outcome.
    ///
    /// If the worker disappears without replying (hard kill) the run is
    /// reported as failed with an `executor-lost` cause; no partial
    /// audit record exists in that case.
    pub async fn outcome(self) -> RunOutcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => RunOutcome {
                response: RunResponse {
                    run_id: self.run_id,
                    status: RunStatus::Failed,
                    final_text: None,
                    document_type: None,
                    context: ContextSummary::default(),
                    external_sources: Vec::new(),
                    duration_ms: 0,
                    iterations: 0,
                    cost: Decimal::ZERO,
                    error: Some(RunError {
                        code: "executor_lost".to_string(),
                        reason: "worker terminated before completing the run".to_string(),
                    }),
                },
                audit: None,
            },
        }
    }
}

/// Multi-tenant run engine. Parallel across runs; each run is itself
/// cooperative and single-writer to its state.
pub struct Engine {
    config: EngineConfig,
    policy_store: Arc<PolicyStore>,
    sender: mpsc::Sender<Job>,
}

impl Engine {
    /// Validate the configuration and start the worker pool. Must be
    /// called from within a tokio runtime.
    pub fn start(
        config: EngineConfig,
        policy_store: Arc<PolicyStore>,
        supervisor: Arc<Supervisor>,
    ) -> LexgenResult<Self> {
        config.validate()?;
        let (sender, receiver) = mpsc::channel::<Job>(config.queue_depth);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker in 0..config.worker_count {
            let receiver = Arc::clone(&receiver);
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else {
                        debug!(worker, "worker shutting down");
                        break;
                    };
                    let run_id = job.state.run_id;
                    debug!(worker, %run_id, "worker picked up run");
                    let outcome = supervisor.run(job.state, job.cancel).await;
                    let _ = job.reply.send(outcome);
                }
            });
        }

        info!(
            workers = config.worker_count,
            queue_depth = config.queue_depth,
            "engine started"
        );
        Ok(Self {
            config,
            policy_store,
            sender,
        })
    }

    /// Validate a request and enqueue it. Rejections here are client
    /// errors: no run id escapes and no audit record is written.
    pub fn submit(&self, request: SubmitRequest) -> LexgenResult<RunHandle> {
        let state = build_run_state(request, &self.config, &self.policy_store)?;
        let run_id = state.run_id;
        let cancel = CancelToken::new();
        let (reply, receiver) = oneshot::channel();

        self.sender
            .try_send(Job {
                state,
                cancel: cancel.clone(),
                reply,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    LexgenError::Validation(ValidationError::QueueFull)
                }
                mpsc::error::TrySendError::Closed(_) => {
                    LexgenError::Validation(ValidationError::InvalidValue {
                        field: "engine".to_string(),
                        reason: "engine is shut down".to_string(),
                    })
                }
            })?;

        Ok(RunHandle {
            run_id,
            cancel,
            receiver,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
